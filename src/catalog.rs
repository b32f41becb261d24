//! Catalog snapshot loading.
//!
//! A snapshot is a JSON dump of the rows this generator needs from
//! `system.tables`, `system.columns` and `system.projections`. Loading it
//! produces immutable [`Table`] values; `Distributed` proxies are resolved
//! to their physical table here so the compiler never sees the topology.

use std::path::Path;

use log::{debug, warn};
use serde::Deserialize;

use crate::errors::ProtoGenError;
use crate::parser::{distributed_target, parse_sorting_key};
use crate::types::{Column, Projection, ProjectionKind, Table};

const DISTRIBUTED_ENGINE: &str = "Distributed";
const SYSTEM_DATABASES: &[&str] = &["system", "information_schema", "INFORMATION_SCHEMA"];

// ---------------------------------------------------------------------------
// Snapshot rows
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CatalogFile
{
    tables: Vec<TableRow>,
}

#[derive(Debug, Clone, Deserialize)]
struct TableRow
{
    database: String,
    name: String,
    #[serde(default)]
    comment: String,
    #[serde(default)]
    engine: String,
    #[serde(default)]
    engine_full: String,
    #[serde(default)]
    sorting_key: String,
    #[serde(default)]
    columns: Vec<ColumnRow>,
    #[serde(default)]
    projections: Vec<ProjectionRow>,
}

#[derive(Debug, Clone, Deserialize)]
struct ColumnRow
{
    name: String,
    #[serde(rename = "type")]
    type_: String,
    #[serde(default)]
    default_kind: Option<String>,
    #[serde(default)]
    default_expression: Option<String>,
    #[serde(default)]
    comment: String,
    position: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct ProjectionRow
{
    name: String,
    #[serde(default)]
    sorting_key: Vec<String>,
    #[serde(rename = "type", default)]
    kind: String,
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// An in-memory catalog snapshot.
#[derive(Debug)]
pub struct Catalog
{
    tables: Vec<TableRow>,
}

impl Catalog
{
    /// Reads a snapshot from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ProtoGenError>
    {
        let path = path.as_ref();
        let file = path.display().to_string();

        if !path.exists() {
            return Err(ProtoGenError::MissingCatalogFile(file));
        }

        let data = std::fs::read_to_string(path).map_err(|e| ProtoGenError::from(e).with_file_context(&file))?;
        Self::parse(&data, &file)
    }

    /// Parses a snapshot held in memory.
    pub fn from_json(data: &str) -> Result<Self, ProtoGenError>
    {
        Self::parse(data, "<inline>")
    }

    fn parse(data: &str, context: &str) -> Result<Self, ProtoGenError>
    {
        let catalog: CatalogFile = serde_json::from_str(data).map_err(|e| ProtoGenError::InvalidCatalog {
            context: context.to_string(),
            details: e.to_string(),
        })?;

        debug!("Loaded catalog {} with {} tables", context, catalog.tables.len());

        Ok(Self {
            tables: catalog.tables,
        })
    }

    /// All user tables as `database.table`, sorted, system databases excluded.
    pub fn list_tables(&self) -> Vec<String>
    {
        let mut names: Vec<String> = self
            .tables
            .iter()
            .filter(|t| !SYSTEM_DATABASES.contains(&t.database.as_str()))
            .map(|t| format!("{}.{}", t.database, t.name))
            .collect();
        names.sort();
        names
    }

    fn row(&self, database: &str, name: &str) -> Option<&TableRow>
    {
        self.tables.iter().find(|t| t.database == database && t.name == name)
    }

    /// Builds the [`Table`] for `database.name`.
    ///
    /// A `Distributed` table without its own sorting key takes the sorting
    /// key of the table it proxies, and always gains that table's
    /// projections.
    pub fn get_table(&self, database: &str, name: &str) -> Option<Table>
    {
        let row = self.row(database, name)?;

        let mut columns: Vec<Column> = row.columns.iter().map(build_column).collect();
        columns.sort_by_key(|c| c.position);

        let mut projections = build_projections(&row.projections);
        let mut sorting_key = parse_sorting_key(&row.sorting_key);

        if row.engine == DISTRIBUTED_ENGINE {
            match self.underlying(row) {
                Some(underlying) => {
                    debug!(
                        "Resolved distributed table {}.{} to {}.{}",
                        row.database, row.name, underlying.database, underlying.name
                    );
                    if sorting_key.is_empty() {
                        sorting_key = parse_sorting_key(&underlying.sorting_key);
                    }
                    projections.extend(build_projections(&underlying.projections));
                }
                None => warn!(
                    "Could not resolve the table behind distributed table {}.{}",
                    row.database, row.name
                ),
            }
        }

        let mut table = Table::new(&row.database, &row.name)
            .with_comment(&row.comment)
            .with_sorting_key(sorting_key);
        table.columns = columns;
        table.projections = projections;

        debug!("Retrieved table schema {} with {} columns", table.qualified_name(), table.columns.len());
        Some(table)
    }

    fn underlying(&self, row: &TableRow) -> Option<&TableRow>
    {
        let target = distributed_target(&row.engine_full)?;
        self.row(&target.database, &target.table)
    }

    /// Resolves every requested name, skipping the ones not in the catalog.
    ///
    /// Names are either `table`, looked up in `default_database`, or
    /// `database.table`.
    pub fn get_tables(&self, default_database: &str, names: &[String]) -> Vec<Table>
    {
        let mut tables = Vec::with_capacity(names.len());

        for requested in names {
            let (database, name) = split_table_name(requested, default_database);
            match self.get_table(database, name) {
                Some(table) => tables.push(table),
                None => warn!("Failed to get table {}.{}, skipping", database, name),
            }
        }

        tables
    }
}

/// Splits `database.table`; anything else is a table in `default_database`.
pub fn split_table_name<'a>(requested: &'a str, default_database: &'a str) -> (&'a str, &'a str)
{
    let parts: Vec<&str> = requested.split('.').collect();
    match parts.as_slice() {
        [database, table] => (*database, *table),
        _ => (default_database, requested),
    }
}

fn build_column(row: &ColumnRow) -> Column
{
    Column::new(&row.name, &row.type_, row.position)
        .with_comment(&row.comment)
        .with_default(
            row.default_kind.clone().filter(|s| !s.is_empty()),
            row.default_expression.clone().filter(|s| !s.is_empty()),
        )
}

/// Projections sorted by name, as `system.projections` returns them.
fn build_projections(rows: &[ProjectionRow]) -> Vec<Projection>
{
    let mut projections: Vec<Projection> = rows
        .iter()
        .map(|p| Projection::new(&p.name, p.sorting_key.clone()).with_kind(ProjectionKind::from(p.kind.as_str())))
        .collect();
    projections.sort_by(|a, b| a.name.cmp(&b.name));
    projections
}
