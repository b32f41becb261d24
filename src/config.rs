//! Generator configuration.
//!
//! Values come from an optional YAML file and are then overridden by
//! command-line flags through [`ConfigOverrides`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;

use crate::errors::{ConfigError, ProtoGenError};

/// Configuration options for the proto generator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Configuration
{
    /// Path to the JSON catalog snapshot to read table metadata from
    #[serde(rename = "catalog")]
    pub catalog_path: PathBuf,

    /// Tables to generate, either `table` or `database.table`
    pub tables: Vec<String>,

    /// Database assumed for unqualified table names (default: "default")
    pub database: String,

    /// Output directory for generated files (default: "./proto")
    pub output_dir: PathBuf,

    /// Protobuf package name (default: "clickhouse.v1")
    pub package: String,

    /// Optional `go_package` option written into every file
    pub go_package: String,

    /// Copy table and column comments into the generated files (default: true)
    pub include_comments: bool,

    /// Upper bound advertised for `page_size` (default: 10000)
    pub max_page_size: i32,

    /// Base path for HTTP annotations (default: "/api/v1")
    pub api_base_path: String,

    /// Emit `google.api.http` annotations
    pub enable_api: bool,

    /// Restrict HTTP annotations to tables starting with one of these prefixes
    pub api_table_prefixes: Vec<String>,

    pub conversion: ConversionConfig,
}

impl Default for Configuration
{
    fn default() -> Self
    {
        Self {
            catalog_path: PathBuf::new(),
            tables: Vec::new(),
            database: "default".to_string(),
            output_dir: PathBuf::from("./proto"),
            package: "clickhouse.v1".to_string(),
            go_package: String::new(),
            include_comments: true,
            max_page_size: 10000,
            api_base_path: "/api/v1".to_string(),
            enable_api: false,
            api_table_prefixes: Vec::new(),
            conversion: ConversionConfig::default(),
        }
    }
}

/// Command-line values that take precedence over the config file.
///
/// `None` and empty strings leave the file value untouched.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides
{
    pub catalog_path: Option<PathBuf>,
    pub tables: Option<String>,
    pub database: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub package: Option<String>,
    pub go_package: Option<String>,
    pub include_comments: Option<bool>,
    pub max_page_size: Option<i32>,
    pub enable_api: Option<bool>,
    pub api_base_path: Option<String>,
    pub api_table_prefixes: Option<String>,
    pub bigint_to_string_fields: Option<String>,
}

impl Configuration
{
    /// Loads a configuration from a YAML file, filling unset keys with defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ProtoGenError>
    {
        let path = path.as_ref();
        let file = path.display().to_string();

        let data = std::fs::read_to_string(path).map_err(|e| ProtoGenError::from(e).with_file_context(&file))?;

        let config = if data.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(&data).map_err(|error| ProtoGenError::ConfigParse {
                file: file.clone(),
                error,
            })?
        };

        debug!("Loaded configuration from file {}", file);
        Ok(config)
    }

    /// Applies command-line values on top of this configuration.
    pub fn merge(&mut self, overrides: ConfigOverrides)
    {
        if let Some(path) = overrides.catalog_path.filter(|p| !p.as_os_str().is_empty()) {
            self.catalog_path = path;
        }
        if let Some(tables) = overrides.tables.filter(|s| !s.is_empty()) {
            self.tables = split_list(&tables);
        }
        if let Some(database) = overrides.database.filter(|s| !s.is_empty()) {
            self.database = database;
        }
        if let Some(dir) = overrides.output_dir.filter(|p| !p.as_os_str().is_empty()) {
            self.output_dir = dir;
        }
        if let Some(package) = overrides.package.filter(|s| !s.is_empty()) {
            self.package = package;
        }
        if let Some(go_package) = overrides.go_package.filter(|s| !s.is_empty()) {
            self.go_package = go_package;
        }
        if let Some(include) = overrides.include_comments {
            self.include_comments = include;
        }
        if let Some(size) = overrides.max_page_size.filter(|s| *s > 0) {
            self.max_page_size = size;
        }
        if let Some(enable) = overrides.enable_api {
            self.enable_api = enable;
        }
        if let Some(base) = overrides.api_base_path.filter(|s| !s.is_empty()) {
            self.api_base_path = base;
        }
        if let Some(prefixes) = overrides.api_table_prefixes.filter(|s| !s.is_empty()) {
            self.api_table_prefixes = split_list(&prefixes);
        }
        if let Some(fields) = overrides.bigint_to_string_fields.filter(|s| !s.is_empty()) {
            self.conversion.bigint_to_string_fields = split_list(&fields);
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError>
    {
        if self.catalog_path.as_os_str().is_empty() {
            return Err(ConfigError::CatalogRequired);
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::OutputDirRequired);
        }
        if self.package.is_empty() {
            return Err(ConfigError::PackageRequired);
        }
        if self.tables.is_empty() {
            return Err(ConfigError::TablesRequired);
        }
        Ok(())
    }

    /// Whether HTTP annotations should be emitted for `table`.
    pub fn should_generate_api(&self, table: &str) -> bool
    {
        if !self.enable_api {
            return false;
        }

        self.api_table_prefixes.is_empty() || self.api_table_prefixes.iter().any(|p| table.starts_with(p.as_str()))
    }
}

fn split_list(value: &str) -> Vec<String>
{
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Which 64-bit integer columns are exposed as strings.
///
/// JavaScript clients lose precision above 2^53, so selected Int64/UInt64
/// columns can be carried as text instead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ConversionConfig
{
    /// Table name to exact field names.
    pub bigint_to_string: HashMap<String, Vec<String>>,

    /// Patterns: `table.field`, `*.field`, `table.*`, `*.*` or `field`.
    pub bigint_to_string_fields: Vec<String>,
}

impl ConversionConfig
{
    /// Whether `table.field` is whitelisted for string conversion.
    ///
    /// The table-scoped map is consulted first, then the patterns in
    /// declaration order. Matching is boolean, so a column listed several
    /// times converts exactly as if it was listed once.
    pub fn should_convert_to_string(&self, table: &str, field: &str) -> bool
    {
        let scoped = self
            .bigint_to_string
            .get(table)
            .is_some_and(|fields| fields.iter().any(|f| f == field));

        scoped || self.rules().any(|rule| rule.matches(table, field))
    }

    /// The parsed pattern list. Unparseable patterns are dropped.
    pub fn rules(&self) -> impl Iterator<Item = OverrideRule> + '_
    {
        self.bigint_to_string_fields.iter().filter_map(|p| OverrideRule::parse(p))
    }
}

/// One entry of the big-integer override pattern list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OverrideRule
{
    /// `table.field`
    ExactTableField
    {
        table: String,
        field: String,
    },
    /// `*.field` or a bare `field`
    WildcardField
    {
        field: String,
    },
    /// `table.*`
    WildcardTableField
    {
        table: String,
    },
    /// `*.*`
    WildcardAll,
}

impl OverrideRule
{
    /// Parses a pattern. Empty patterns and patterns with more than one
    /// `.` are rejected.
    pub fn parse(pattern: &str) -> Option<Self>
    {
        let pattern = pattern.trim();
        if pattern.is_empty() {
            return None;
        }

        let parts: Vec<&str> = pattern.split('.').collect();
        match parts.as_slice() {
            [field] => Some(Self::WildcardField {
                field: field.to_string(),
            }),
            ["*", "*"] => Some(Self::WildcardAll),
            ["*", field] => Some(Self::WildcardField {
                field: field.to_string(),
            }),
            [table, "*"] => Some(Self::WildcardTableField {
                table: table.to_string(),
            }),
            [table, field] => Some(Self::ExactTableField {
                table: table.to_string(),
                field: field.to_string(),
            }),
            _ => None,
        }
    }

    pub fn matches(&self, table: &str, field: &str) -> bool
    {
        match self {
            Self::ExactTableField { table: t, field: f } => t == table && f == field,
            Self::WildcardField { field: f } => f == field,
            Self::WildcardTableField { table: t } => t == table,
            Self::WildcardAll => true,
        }
    }
}
