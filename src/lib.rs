//! Generate Protocol Buffer schemas from ClickHouse table metadata.
//!
//! This crate reads a snapshot of the ClickHouse system catalog and generates:
//!
//! - **A message per table** with one field per column, numbered from the column position
//! - **List/Get request messages and a service** for every table with a sorting key, using
//!   filter messages that match each column's mapped type
//! - **`common.proto`** with the shared filter, range and list messages
//! - **`clickhouse/annotations.proto`** with the field options used by primary-key groups
//!
//! A [`query`] builder is included for executing the generated List requests
//! as parameterized SQL.
//!
//! # Usage
//!
//! ```rust,no_run
//! use clickhouse_proto_gen::{generate, Configuration};
//!
//! fn main() {
//!     let config = Configuration {
//!         catalog_path: std::path::PathBuf::from("catalog.json"),
//!         tables: vec!["beacon_block".to_string()],
//!         ..Default::default()
//!     };
//!     generate(&config).expect("clickhouse-proto-gen failed");
//! }
//! ```

pub mod catalog;
pub mod codegen;
pub mod config;
pub mod emitter;
pub mod errors;
pub mod expression;
pub mod filter;
pub mod mapper;
pub mod parser;
pub mod primary_key;
pub mod query;
pub mod types;

use log::info;

use catalog::Catalog;
pub use config::{ConfigOverrides, Configuration};
use emitter::{compile_table, TableSchema};
use errors::ProtoGenError;
use types::Table;

/// Compiles every table into its schema descriptor.
pub fn compile_tables(tables: &[Table], config: &Configuration) -> Vec<TableSchema>
{
    tables.iter().map(|table| compile_table(table, config)).collect()
}

/// Generates proto files for the configured tables.
///
/// # Arguments
/// * `config` - Configuration options for the generation process
///
/// # Returns
/// * `Ok(())` if generation succeeds
/// * `Err(ProtoGenError)` if an error occurs during generation
///
/// # Errors
/// This function can fail for several reasons:
/// * Invalid configuration
/// * Catalog file not found or malformed
/// * None of the requested tables exist in the catalog
/// * IO errors when writing files
pub fn generate(config: &Configuration) -> Result<(), ProtoGenError>
{
    config.validate()?;

    let catalog = Catalog::from_file(&config.catalog_path)?;

    let tables = catalog.get_tables(&config.database, &config.tables);
    if tables.is_empty() {
        return Err(ProtoGenError::NoValidTables);
    }

    let schemas = compile_tables(&tables, config);
    codegen::write_outputs(&schemas, config)?;

    let services = schemas.iter().filter(|s| s.has_service()).count();
    info!(
        "Generated {} tables ({} with services) into {}",
        schemas.len(),
        services,
        config.output_dir.display()
    );

    Ok(())
}
