use std::fmt;

/// Errors that can occur while loading inputs or writing generated files.
///
/// The type mapping core never produces these; they only surface at the
/// catalog, configuration and output boundaries.
#[derive(Debug)]
pub enum ProtoGenError
{
    /// The catalog snapshot could not be found at the specified path
    MissingCatalogFile(String),

    /// An IO error occurred while reading or writing files
    IOError
    {
        /// Path to the file where the error occurred
        file: String,
        /// The underlying IO error
        error: std::io::Error,
    },

    /// The catalog snapshot has invalid structure or content
    InvalidCatalog
    {
        /// Context where the invalid entry was found
        context: String,
        /// Details about why the catalog is invalid
        details: String,
    },

    /// The YAML configuration file could not be parsed
    ConfigParse
    {
        /// Path to the configuration file
        file: String,
        /// The underlying YAML error
        error: serde_yaml::Error,
    },

    /// The merged configuration failed validation
    InvalidConfig(ConfigError),

    /// Failed to serialize data to JSON
    SerializationFailed(serde_json::Error),

    /// None of the requested tables could be resolved from the catalog
    NoValidTables,

    /// A query was built without any columns to select
    EmptyColumnList,
}

/// Reasons a [`crate::Configuration`] is rejected by `validate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError
{
    CatalogRequired,
    OutputDirRequired,
    PackageRequired,
    TablesRequired,
}

impl fmt::Display for ConfigError
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::CatalogRequired => write!(f, "catalog path is required"),
            Self::OutputDirRequired => write!(f, "output directory is required"),
            Self::PackageRequired => write!(f, "proto package is required"),
            Self::TablesRequired => write!(f, "tables must be specified"),
        }
    }
}

impl fmt::Display for ProtoGenError
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::MissingCatalogFile(path) => write!(f, "Catalog file not found: {}", path),
            Self::IOError { file, error } => {
                write!(f, "IO error while accessing '{}': {}", file, error)
            }
            Self::InvalidCatalog { context, details } => {
                write!(f, "Invalid catalog at {}: {}", context, details)
            }
            Self::ConfigParse { file, error } => {
                write!(f, "Failed to parse config file '{}': {}", file, error)
            }
            Self::InvalidConfig(err) => write!(f, "Invalid configuration: {}", err),
            Self::SerializationFailed(err) => {
                write!(f, "Failed to serialize: {}", err)
            }
            Self::NoValidTables => write!(f, "No valid tables found to generate proto files"),
            Self::EmptyColumnList => write!(f, "Columns list cannot be empty"),
        }
    }
}

impl From<std::io::Error> for ProtoGenError
{
    fn from(error: std::io::Error) -> Self
    {
        ProtoGenError::IOError {
            file: String::new(),
            error,
        }
    }
}

impl From<ConfigError> for ProtoGenError
{
    fn from(error: ConfigError) -> Self
    {
        ProtoGenError::InvalidConfig(error)
    }
}

impl std::error::Error for ProtoGenError {}

impl ProtoGenError
{
    /// Adds file context to an IO error
    pub fn with_file_context(self, file: impl Into<String>) -> Self
    {
        match self {
            Self::IOError { error, .. } => Self::IOError {
                file: file.into(),
                error,
            },
            other => other,
        }
    }
}
