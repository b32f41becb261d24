use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{debug, error, LevelFilter};

use clickhouse_proto_gen::catalog::Catalog;
use clickhouse_proto_gen::errors::ProtoGenError;
use clickhouse_proto_gen::{generate, ConfigOverrides, Configuration};

#[derive(Parser)]
#[command(
    name = "clickhouse-proto-gen",
    about = "Generate Protocol Buffer schemas from a ClickHouse catalog snapshot.",
    version
)]
struct Cli
{
    /// Path to a YAML configuration file. Flags override its values.
    #[arg(short, long, env = "CLICKHOUSE_PROTO_GEN_CONFIG")]
    config: Option<PathBuf>,

    /// JSON snapshot of system.tables, system.columns and system.projections.
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Comma-separated tables to generate (e.g. users,orders or db.users).
    #[arg(long)]
    tables: Option<String>,

    /// Database used for tables given without one.
    #[arg(long)]
    database: Option<String>,

    /// Output directory for generated files.
    #[arg(long = "out")]
    output_dir: Option<PathBuf>,

    /// Protocol Buffer package name.
    #[arg(long)]
    package: Option<String>,

    /// Go package path written as `option go_package`.
    #[arg(long)]
    go_package: Option<String>,

    /// Include table and column comments in generated files.
    #[arg(long)]
    include_comments: Option<bool>,

    /// Maximum page size advertised on List requests.
    #[arg(long)]
    max_page_size: Option<i32>,

    /// Emit google.api.http annotations.
    #[arg(long)]
    enable_api: bool,

    /// Base path for HTTP annotations.
    #[arg(long)]
    api_base_path: Option<String>,

    /// Comma-separated table prefixes to expose over HTTP (e.g. fct_,dim_).
    #[arg(long)]
    api_table_prefixes: Option<String>,

    /// Comma-separated Int64/UInt64 fields carried as strings (e.g. table.field,*.field).
    #[arg(long = "bigint-to-string")]
    bigint_to_string: Option<String>,

    /// Print the tables available in the catalog and exit.
    #[arg(long)]
    list_tables: bool,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug output.
    #[arg(long)]
    debug: bool,
}

impl Cli
{
    fn log_level(&self) -> LevelFilter
    {
        if self.debug {
            LevelFilter::Debug
        } else if self.verbose {
            LevelFilter::Info
        } else {
            LevelFilter::Warn
        }
    }

    fn overrides(&self) -> ConfigOverrides
    {
        ConfigOverrides {
            catalog_path: self.catalog.clone(),
            tables: self.tables.clone(),
            database: self.database.clone(),
            output_dir: self.output_dir.clone(),
            package: self.package.clone(),
            go_package: self.go_package.clone(),
            include_comments: self.include_comments,
            max_page_size: self.max_page_size,
            enable_api: self.enable_api.then_some(true),
            api_base_path: self.api_base_path.clone(),
            api_table_prefixes: self.api_table_prefixes.clone(),
            bigint_to_string_fields: self.bigint_to_string.clone(),
        }
    }
}

fn run(cli: &Cli) -> Result<(), ProtoGenError>
{
    let mut config = match &cli.config {
        Some(path) => Configuration::from_file(path)?,
        None => Configuration::default(),
    };
    config.merge(cli.overrides());
    debug!("Effective configuration: {:?}", config);

    if cli.list_tables {
        let catalog = Catalog::from_file(&config.catalog_path)?;
        for table in catalog.list_tables() {
            println!("{}", table);
        }
        return Ok(());
    }

    generate(&config)
}

fn main() -> ExitCode
{
    let cli = Cli::parse();

    let _r = env_logger::builder()
        .filter_level(cli.log_level())
        .format_target(false)
        .format_timestamp(None)
        .try_init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
