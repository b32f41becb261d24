use std::fs;
use std::path::PathBuf;

use clickhouse_proto_gen::codegen::{render_annotations_proto, render_common_proto, table_file_name};
use clickhouse_proto_gen::errors::ProtoGenError;
use clickhouse_proto_gen::{generate, Configuration};
use tempdir::TempDir;

const CATALOG: &str = r#"
{
  "tables": [
    {
      "database": "default",
      "name": "beacon_block",
      "comment": "Blocks seen by the beacon node",
      "engine": "ReplacingMergeTree",
      "sorting_key": "slot, block_root",
      "columns": [
        { "name": "slot", "type": "UInt32", "position": 1, "comment": "Slot number" },
        { "name": "block_root", "type": "String", "position": 2 },
        { "name": "meta_client_name", "type": "LowCardinality(String)", "position": 3 },
        { "name": "slot_start_date_time", "type": "DateTime", "position": 4 },
        { "name": "gas_used", "type": "Nullable(UInt64)", "position": 5 },
        { "name": "labels", "type": "Map(String, String)", "position": 6 },
        { "name": "reward", "type": "Float64", "position": 7 }
      ],
      "projections": [
        { "name": "p_by_client", "sorting_key": ["meta_client_name"] }
      ]
    },
    {
      "database": "default",
      "name": "fct_head",
      "sorting_key": "slot",
      "columns": [
        { "name": "slot", "type": "UInt32", "position": 1 },
        { "name": "value", "type": "UInt64", "position": 2 }
      ]
    },
    {
      "database": "default",
      "name": "raw_log",
      "columns": [
        { "name": "line", "type": "String", "position": 1 },
        { "name": "message", "type": "Nullable(String)", "position": 2 }
      ]
    }
  ]
}
"#;

/// Set up a test environment with a catalog snapshot.
///
/// Returns the temp dir (keep alive), catalog path and output directory.
fn setup_test_env() -> (TempDir, PathBuf, PathBuf)
{
    let temp_dir = TempDir::new("proto_gen_codegen_test").expect("Failed to create temp directory");
    let catalog_path = temp_dir.path().join("catalog.json");
    let output_dir = temp_dir.path().join("proto");

    fs::write(&catalog_path, CATALOG).expect("Failed to write test catalog");

    (temp_dir, catalog_path, output_dir)
}

/// Generate files for `table` and return the table's proto source.
fn generate_and_read(table: &str, customize: impl FnOnce(&mut Configuration)) -> String
{
    let (_temp_dir, catalog_path, output_dir) = setup_test_env();
    let mut config = Configuration {
        catalog_path,
        output_dir: output_dir.clone(),
        tables: vec![table.to_string()],
        ..Default::default()
    };
    customize(&mut config);

    generate(&config).expect("Proto generation failed");
    fs::read_to_string(output_dir.join(table_file_name(table))).expect("Failed to read generated proto")
}

// =============================================================================
// Output layout
// =============================================================================

#[test]
fn test_generated_files() -> anyhow::Result<()>
{
    let (_temp_dir, catalog_path, output_dir) = setup_test_env();
    let config = Configuration {
        catalog_path,
        output_dir: output_dir.clone(),
        tables: vec!["beacon_block".to_string(), "raw_log".to_string(), "missing".to_string()],
        ..Default::default()
    };

    generate(&config)?;

    assert!(output_dir.join("common.proto").exists(), "missing common.proto");
    assert!(output_dir.join("clickhouse/annotations.proto").exists(), "missing annotations.proto");
    assert!(output_dir.join("beacon_block.proto").exists(), "missing beacon_block.proto");
    assert!(output_dir.join("raw_log.proto").exists(), "missing raw_log.proto");
    assert!(!output_dir.join("missing.proto").exists(), "unexpected missing.proto");

    let json = fs::read_to_string(output_dir.join("beacon_block.schema.json"))?;
    let schema: serde_json::Value = serde_json::from_str(&json)?;
    assert_eq!(schema["message_name"], "BeaconBlock");
    assert_eq!(schema["fields"][0]["proto_type"], "uint32");
    assert_eq!(
        schema["fields"][3]["select_expression"],
        "toUnixTimestamp(`slot_start_date_time`) AS `slot_start_date_time`"
    );

    let first = &schema["service"]["list_fields"][0];
    assert_eq!(first["request_type"], "UInt32Filter");
    assert_eq!(first["role"]["kind"], "primary_key");
    assert_eq!(first["requirement"], "one_of_group");

    Ok(())
}

#[test]
fn test_no_valid_tables()
{
    let (_temp_dir, catalog_path, output_dir) = setup_test_env();
    let config = Configuration {
        catalog_path,
        output_dir,
        tables: vec!["missing".to_string()],
        ..Default::default()
    };

    match generate(&config) {
        Err(ProtoGenError::NoValidTables) => (),
        other => panic!("Expected NoValidTables error, got {:?}", other),
    }
}

// =============================================================================
// Table messages
// =============================================================================

#[test]
fn test_table_message()
{
    let code = generate_and_read("beacon_block", |_| {});

    assert!(code.starts_with("syntax = \"proto3\";\n\npackage clickhouse.v1;\n"), "bad header:\n{}", code);
    assert!(code.contains("// Blocks seen by the beacon node\nmessage BeaconBlock {"), "missing table comment");
    assert!(code.contains("  // Slot number\n  uint32 slot = 11;"), "missing slot field");
    assert!(code.contains("  string block_root = 12;"), "missing block_root field");
    assert!(code.contains("  string meta_client_name = 13;"), "missing meta_client_name field");
    assert!(code.contains("  uint32 slot_start_date_time = 14;"), "missing datetime field");
    assert!(code.contains("  google.protobuf.UInt64Value gas_used = 15;"), "missing nullable field");
    assert!(code.contains("  map<string, string> labels = 16;"), "missing map field");
    assert!(code.contains("  double reward = 17;"), "missing float field");
}

#[test]
fn test_table_without_service()
{
    let code = generate_and_read("raw_log", |config| config.go_package = "github.com/acme/gen".to_string());

    assert!(code.contains("message RawLog {"), "missing RawLog message");
    assert!(code.contains("  google.protobuf.StringValue message_field = 12;"), "reserved word not sanitized");
    assert!(code.contains("import \"google/protobuf/wrappers.proto\";"), "missing wrappers import");
    assert!(code.contains("option go_package = \"github.com/acme/gen\";"), "missing go_package");
    assert!(!code.contains("common.proto"), "unexpected common.proto import");
    assert!(!code.contains("service "), "unexpected service");
}

// =============================================================================
// Services
// =============================================================================

#[test]
fn test_or_group_list_request()
{
    let code = generate_and_read("beacon_block", |_| {});

    assert!(code.contains("import \"common.proto\";"), "missing common import");
    assert!(code.contains("import \"clickhouse/annotations.proto\";"), "missing annotations import");
    assert!(
        code.contains("// Validation: at least one of meta_client_name, slot is required\nmessage ListBeaconBlockRequest {"),
        "missing validation comment"
    );
    assert!(
        code.contains("  UInt32Filter slot = 1 [(clickhouse.v1.required_group) = \"primary_key\"];"),
        "missing slot filter:\n{}",
        code
    );
    assert!(
        code.contains(
            "  StringFilter meta_client_name = 2 [(clickhouse.v1.required_group) = \"primary_key\", \
             (clickhouse.v1.projection_alternative_for) = \"slot\", (clickhouse.v1.projection_name) = \"p_by_client\"];"
        ),
        "missing projection alternative:\n{}",
        code
    );
    assert!(code.contains("  // Filter by block_root (ORDER BY column 2 - optional)\n  StringFilter block_root = 3;"));
    assert!(code.contains("  UInt32Filter slot_start_date_time = 4;"), "missing datetime filter");
    assert!(code.contains("  NullableUInt64Filter gas_used = 5;"), "missing nullable filter");
    assert!(code.contains("  MapStringStringFilter labels = 6;"), "missing map filter");
    assert!(code.contains("  google.protobuf.DoubleValue reward = 7;"), "missing optional float");
    assert!(code.contains("  int32 page_size = 8;"), "missing page_size");
    assert!(code.contains("  string page_token = 9;"), "missing page_token");
    assert!(code.contains("  string order_by = 10;"), "missing order_by");
    assert!(code.contains("  // The maximum value is 10000; values above 10000 will be coerced to 10000."));
}

#[test]
fn test_get_request_and_service()
{
    let code = generate_and_read("beacon_block", |_| {});

    assert!(code.contains("message ListBeaconBlockResponse {\n  // The list of beacon_block.\n  repeated BeaconBlock beacon_block = 1;"));
    assert!(code.contains("message GetBeaconBlockRequest {\n  // Slot number\n  uint32 slot = 1; // Primary key (required)\n}"));
    assert!(code.contains("message GetBeaconBlockResponse {\n  BeaconBlock item = 1;\n}"));
    assert!(code.contains("service BeaconBlockService {"), "missing service");
    assert!(code.contains("  rpc List(ListBeaconBlockRequest) returns (ListBeaconBlockResponse);"));
    assert!(code.contains("  rpc Get(GetBeaconBlockRequest) returns (GetBeaconBlockResponse);"));
    assert!(!code.contains("google.api"), "unexpected HTTP annotations");
}

#[test]
fn test_single_key_is_required()
{
    let code = generate_and_read("fct_head", |_| {});

    assert!(code.contains("  // Filter by slot (PRIMARY KEY - required)\n  UInt32Filter slot = 1;"));
    assert!(code.contains("  // Filter by value (optional)\n  UInt64Filter value = 2;"));
    assert!(!code.contains("Validation:"), "unexpected validation comment");
    assert!(!code.contains("clickhouse/annotations.proto"), "unexpected annotations import");
}

#[test]
fn test_http_annotations()
{
    let code = generate_and_read("fct_head", |config| {
        config.enable_api = true;
        config.api_base_path = "/api/v2".to_string();
    });

    assert!(code.contains("import \"google/api/annotations.proto\";"));
    assert!(code.contains("import \"google/api/field_behavior.proto\";"));
    assert!(code.contains("  UInt32Filter slot = 1 [(google.api.field_behavior) = REQUIRED];"));
    assert!(code.contains("  UInt64Filter value = 2 [(google.api.field_behavior) = OPTIONAL];"));
    assert!(code.contains("  int32 page_size = 3 [(google.api.field_behavior) = OPTIONAL];"));
    assert!(code.contains("      get: \"/api/v2/fct_head\""));
    assert!(code.contains("      get: \"/api/v2/fct_head/{slot}\""));
}

#[test]
fn test_bigint_override_in_generated_proto()
{
    let code = generate_and_read("fct_head", |config| {
        config.conversion.bigint_to_string_fields = vec!["fct_head.value".to_string()];
    });

    assert!(code.contains("  string value = 12;"), "override not applied to message");
    assert!(code.contains("  StringFilter value = 2;"), "override not applied to filter");
}

#[test]
fn test_comments_can_be_disabled()
{
    let code = generate_and_read("beacon_block", |config| config.include_comments = false);

    assert!(!code.contains("Blocks seen by the beacon node"), "table comment kept");
    assert!(code.contains("message BeaconBlock {\n  uint32 slot = 11;"), "column comment kept");
}

// =============================================================================
// Shared files
// =============================================================================

#[test]
fn test_common_proto()
{
    let code = render_common_proto(&Configuration::default());

    assert!(code.contains("import \"google/protobuf/wrappers.proto\";"));
    assert!(code.contains("import \"google/protobuf/empty.proto\";"));
    assert!(code.contains("message UInt64Filter {"), "missing UInt64Filter");
    assert!(code.contains("message NullableUInt64Filter {"), "missing NullableUInt64Filter");
    assert!(code.contains("    UInt64Range between = 7;"), "missing range operation");
    assert!(code.contains("    google.protobuf.Empty is_null = 10;"), "missing is_null");
    assert!(code.contains("message UInt64Range {\n  uint64 min = 1;\n  google.protobuf.UInt64Value max = 2;"));
    assert!(code.contains("message StringList {\n  repeated string values = 1;\n}"));
    assert!(code.contains("    string starts_with = 4;"), "missing starts_with");
    assert!(code.contains("    StringList not_in = 9;"), "missing string not_in");
    assert!(!code.contains("message StringRange"), "strings have no range");
    assert!(!code.contains("message BoolList"), "bools have no list");
    assert!(code.contains("message MapKeyValueStringUInt64 {\n  string key = 1;\n  UInt64Filter value_filter = 2;\n}"));
    assert!(code.contains("message MapStringInt64Filter {"), "missing map filter");
    assert!(code.contains("enum SortOrder {\n  ASC = 0;\n  DESC = 1;\n}"));

    for (name, scalar) in [
        ("UInt32", "uint32"),
        ("UInt64", "uint64"),
        ("Int32", "int32"),
        ("Int64", "int64"),
        ("String", "string"),
    ] {
        assert!(code.contains(&format!("message Array{}Filter {{", name)), "missing Array{}Filter", name);
        assert!(code.contains(&format!("    {} has = 1;", scalar)));
        assert!(code.contains(&format!("    {}List has_all = 2;", name)));
        assert!(code.contains(&format!("    {}List has_any = 3;", name)));
    }
    assert!(code.contains("    uint32 length_lte = 8;"), "missing length bound");
    assert!(code.contains("    google.protobuf.Empty is_not_empty = 10;"), "missing is_not_empty");
    assert!(!code.contains("message ArrayBoolFilter"), "bool arrays have no filter");
    assert!(
        code.find("message ArrayStringFilter").unwrap() < code.find("enum SortOrder").unwrap(),
        "array filters precede SortOrder"
    );

    for name in ["Int32", "Int64", "UInt32", "UInt64", "String", "Bool"] {
        assert!(code.contains(&format!("message {}Filter {{", name)), "missing {}Filter", name);
        assert!(code.contains(&format!("message Nullable{}Filter {{", name)), "missing Nullable{}Filter", name);
    }
}

#[test]
fn test_annotations_proto()
{
    let config = Configuration {
        package: "custom.v2".to_string(),
        go_package: "github.com/acme/gen/".to_string(),
        ..Default::default()
    };
    let code = render_annotations_proto(&config);

    assert!(code.contains("package clickhouse.v1;"), "annotations package must be fixed");
    assert!(code.contains("option go_package = \"github.com/acme/gen/clickhouse\";"));
    assert!(code.contains("  string projection_alternative_for = 50001;"));
    assert!(code.contains("  string projection_name = 50002;"));
    assert!(code.contains("  string required_group = 50003;"));
}
