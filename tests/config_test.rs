use std::fs;
use std::path::PathBuf;

use clickhouse_proto_gen::config::{ConversionConfig, OverrideRule};
use clickhouse_proto_gen::errors::{ConfigError, ProtoGenError};
use clickhouse_proto_gen::{generate, ConfigOverrides, Configuration};
use tempdir::TempDir;

fn setup_test_dir() -> TempDir
{
    TempDir::new("proto_gen_config_test").expect("Failed to create temp directory")
}

#[test]
fn test_configuration_default()
{
    let config = Configuration::default();
    assert_eq!(config.catalog_path, PathBuf::new());
    assert_eq!(config.database, "default");
    assert_eq!(config.output_dir, PathBuf::from("./proto"));
    assert_eq!(config.package, "clickhouse.v1");
    assert!(config.include_comments);
    assert_eq!(config.max_page_size, 10000);
    assert_eq!(config.api_base_path, "/api/v1");
    assert!(!config.enable_api);
    assert!(config.tables.is_empty());
}

#[test]
fn test_load_yaml_config()
{
    let temp_dir = setup_test_dir();
    let path = temp_dir.path().join("config.yaml");
    fs::write(
        &path,
        r#"
catalog: catalog.json
tables:
  - beacon_block
  - mainnet.fct_block
output_dir: out
go_package: github.com/acme/gen/clickhousev1
enable_api: true
api_table_prefixes: ["fct_"]
conversion:
  bigint_to_string:
    fct_block: [value]
  bigint_to_string_fields: ["*.balance"]
"#,
    )
    .unwrap();

    let config = Configuration::from_file(&path).unwrap();
    assert_eq!(config.catalog_path, PathBuf::from("catalog.json"));
    assert_eq!(config.tables, vec!["beacon_block", "mainnet.fct_block"]);
    assert_eq!(config.output_dir, PathBuf::from("out"));
    assert_eq!(config.go_package, "github.com/acme/gen/clickhousev1");
    assert!(config.enable_api);

    // unset keys keep their defaults
    assert_eq!(config.package, "clickhouse.v1");
    assert_eq!(config.max_page_size, 10000);

    assert!(config.conversion.should_convert_to_string("fct_block", "value"));
    assert!(config.conversion.should_convert_to_string("anything", "balance"));
    assert!(!config.conversion.should_convert_to_string("other", "value"));
}

#[test]
fn test_empty_config_file_uses_defaults()
{
    let temp_dir = setup_test_dir();
    let path = temp_dir.path().join("config.yaml");
    fs::write(&path, "").unwrap();

    assert_eq!(Configuration::from_file(&path).unwrap(), Configuration::default());
}

#[test]
fn test_invalid_yaml_config()
{
    let temp_dir = setup_test_dir();
    let path = temp_dir.path().join("config.yaml");
    fs::write(&path, "tables: [unclosed").unwrap();

    match Configuration::from_file(&path) {
        Err(ProtoGenError::ConfigParse { file, .. }) => assert!(file.ends_with("config.yaml")),
        other => panic!("Expected ConfigParse error, got {:?}", other),
    }
}

#[test]
fn test_missing_config_file()
{
    let temp_dir = setup_test_dir();
    let path = temp_dir.path().join("missing.yaml");

    match Configuration::from_file(&path) {
        Err(ProtoGenError::IOError { file, .. }) => assert!(file.ends_with("missing.yaml")),
        other => panic!("Expected IOError, got {:?}", other),
    }
}

#[test]
fn test_merge_overrides()
{
    let mut config = Configuration {
        tables: vec!["from_file".to_string()],
        package: "file.v1".to_string(),
        ..Default::default()
    };

    config.merge(ConfigOverrides {
        tables: Some(" users , db.orders ,".to_string()),
        package: Some(String::new()),
        enable_api: Some(true),
        api_table_prefixes: Some("fct_,dim_".to_string()),
        bigint_to_string_fields: Some("t.value, *.balance".to_string()),
        max_page_size: Some(0),
        ..Default::default()
    });

    assert_eq!(config.tables, vec!["users", "db.orders"]);
    // empty strings and non-positive sizes leave the file value in place
    assert_eq!(config.package, "file.v1");
    assert_eq!(config.max_page_size, 10000);
    assert!(config.enable_api);
    assert_eq!(config.api_table_prefixes, vec!["fct_", "dim_"]);
    assert_eq!(config.conversion.bigint_to_string_fields, vec!["t.value", "*.balance"]);
}

#[test]
fn test_validate()
{
    let mut config = Configuration::default();
    assert_eq!(config.validate(), Err(ConfigError::CatalogRequired));

    config.catalog_path = PathBuf::from("catalog.json");
    assert_eq!(config.validate(), Err(ConfigError::TablesRequired));

    config.tables = vec!["users".to_string()];
    assert_eq!(config.validate(), Ok(()));

    config.package = String::new();
    assert_eq!(config.validate(), Err(ConfigError::PackageRequired));
}

#[test]
fn test_generate_rejects_invalid_config()
{
    match generate(&Configuration::default()) {
        Err(ProtoGenError::InvalidConfig(ConfigError::CatalogRequired)) => (),
        other => panic!("Expected InvalidConfig error, got {:?}", other),
    }
}

#[test]
fn test_missing_catalog_file()
{
    let temp_dir = setup_test_dir();
    let config = Configuration {
        catalog_path: temp_dir.path().join("nonexistent.json"),
        tables: vec!["users".to_string()],
        output_dir: temp_dir.path().join("out"),
        ..Default::default()
    };

    match generate(&config) {
        Err(ProtoGenError::MissingCatalogFile(path)) => assert!(path.ends_with("nonexistent.json")),
        other => panic!("Expected MissingCatalogFile error, got {:?}", other),
    }
}

#[test]
fn test_should_generate_api()
{
    let mut config = Configuration::default();
    assert!(!config.should_generate_api("fct_block"));

    config.enable_api = true;
    assert!(config.should_generate_api("fct_block"));
    assert!(config.should_generate_api("int_block"));

    config.api_table_prefixes = vec!["fct_".to_string(), "dim_".to_string()];
    assert!(config.should_generate_api("fct_block"));
    assert!(config.should_generate_api("dim_node"));
    assert!(!config.should_generate_api("int_block"));
}

#[test]
fn test_override_rule_parsing()
{
    assert_eq!(
        OverrideRule::parse("fct_block.value"),
        Some(OverrideRule::ExactTableField {
            table: "fct_block".to_string(),
            field: "value".to_string(),
        })
    );
    assert_eq!(
        OverrideRule::parse("*.value"),
        Some(OverrideRule::WildcardField {
            field: "value".to_string(),
        })
    );
    assert_eq!(
        OverrideRule::parse("value"),
        Some(OverrideRule::WildcardField {
            field: "value".to_string(),
        })
    );
    assert_eq!(
        OverrideRule::parse("fct_block.*"),
        Some(OverrideRule::WildcardTableField {
            table: "fct_block".to_string(),
        })
    );
    assert_eq!(OverrideRule::parse("*.*"), Some(OverrideRule::WildcardAll));
    assert_eq!(OverrideRule::parse(""), None);
    assert_eq!(OverrideRule::parse("  "), None);
    assert_eq!(OverrideRule::parse("a.b.c"), None);
}

#[test]
fn test_override_rule_matching()
{
    let conversion = ConversionConfig {
        bigint_to_string_fields: vec!["fct_block.value".to_string(), "dim_*.ignored".to_string(), "bad.a.b".to_string()],
        ..Default::default()
    };

    assert!(conversion.should_convert_to_string("fct_block", "value"));
    assert!(!conversion.should_convert_to_string("fct_block", "other"));
    assert!(!conversion.should_convert_to_string("fct_other", "value"));
    // no glob matching inside names
    assert!(!conversion.should_convert_to_string("dim_node", "ignored"));
    assert_eq!(conversion.rules().count(), 2);
}
