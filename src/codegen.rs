//! Renders compiled table schemas into `.proto` files.

use std::fs;
use std::path::Path;

use log::info;

use crate::config::Configuration;
use crate::emitter::{FieldRole, RequestField, Requirement, ServiceDescriptor, TableSchema};
use crate::errors::ProtoGenError;
use crate::filter::{all_filter_tags, array_filter_name, FilterKind, FilterTag, ARRAY_ELEMENT_KINDS};
use crate::primary_key::REQUIRED_GROUP;

/// Package of `clickhouse/annotations.proto`, fixed so generated files can
/// always refer to `(clickhouse.v1.<option>)`.
const ANNOTATIONS_PACKAGE: &str = "clickhouse.v1";
const ANNOTATIONS_DIR: &str = "clickhouse";
const ANNOTATIONS_FILE: &str = "annotations.proto";
const COMMON_FILE: &str = "common.proto";

/// Line-oriented text buffer for protobuf sources.
#[derive(Default)]
struct ProtoWriter
{
    out: String,
}

impl ProtoWriter
{
    fn line(&mut self, text: impl AsRef<str>)
    {
        self.out.push_str(text.as_ref());
        self.out.push('\n');
    }

    fn blank(&mut self)
    {
        self.out.push('\n');
    }

    /// Writes a possibly multi-line comment, dropping blank lines.
    fn comment(&mut self, indent: &str, text: &str)
    {
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            self.line(format!("{}// {}", indent, line));
        }
    }

    fn finish(self) -> String
    {
        self.out
    }
}

fn write_header(w: &mut ProtoWriter, package: &str)
{
    w.line("syntax = \"proto3\";");
    w.blank();
    if !package.is_empty() {
        w.line(format!("package {};", package));
    }
}

fn write_go_package(w: &mut ProtoWriter, go_package: &str)
{
    if !go_package.is_empty() {
        w.blank();
        w.line(format!("option go_package = \"{}\";", go_package));
    }
}

// ---------------------------------------------------------------------------
// common.proto
// ---------------------------------------------------------------------------

/// Renders the shared filter, range, list and enum definitions.
pub fn render_common_proto(config: &Configuration) -> String
{
    let mut w = ProtoWriter::default();

    write_header(&mut w, &config.package);
    w.blank();
    w.line("import \"google/protobuf/wrappers.proto\";");
    w.line("import \"google/protobuf/empty.proto\";");
    write_go_package(&mut w, &config.go_package);
    w.blank();
    w.line("// Common types used across all generated services");
    w.blank();

    for tag in all_filter_tags() {
        match tag {
            FilterTag::Scalar { kind, nullable } => {
                write_scalar_filter(&mut w, kind, nullable);
                if nullable {
                    write_range_and_list(&mut w, kind);
                }
            }
            FilterTag::Map { value } => write_map_filter(&mut w, value),
        }
    }

    for element in ARRAY_ELEMENT_KINDS {
        write_array_filter(&mut w, element);
    }

    w.line("// SortOrder defines the order of results");
    w.line("enum SortOrder {");
    w.line("  ASC = 0;");
    w.line("  DESC = 1;");
    w.line("}");

    w.finish()
}

/// `(type, name)` pairs of a scalar filter's `oneof`, without the null checks.
fn filter_operations(kind: FilterKind) -> Vec<(String, &'static str)>
{
    let scalar = kind.scalar().as_str().to_string();
    let label = kind.label();

    match kind {
        FilterKind::Bool => vec![(scalar.clone(), "eq"), (scalar, "ne")],
        FilterKind::String => {
            let names = ["eq", "ne", "contains", "starts_with", "ends_with", "like", "not_like"];
            let mut ops: Vec<(String, &'static str)> = names.into_iter().map(|op| (scalar.clone(), op)).collect();
            ops.push((format!("{}List", label), "in"));
            ops.push((format!("{}List", label), "not_in"));
            ops
        }
        _ => {
            let mut ops: Vec<(String, &'static str)> = ["eq", "ne", "lt", "lte", "gt", "gte"]
                .into_iter()
                .map(|op| (scalar.clone(), op))
                .collect();
            ops.push((format!("{}Range", label), "between"));
            ops.push((format!("{}List", label), "in"));
            ops.push((format!("{}List", label), "not_in"));
            ops
        }
    }
}

fn write_scalar_filter(w: &mut ProtoWriter, kind: FilterKind, nullable: bool)
{
    let tag = FilterTag::Scalar { kind, nullable };
    let scalar = kind.scalar().as_str();

    w.line(format!(
        "// {} represents filtering options for {} {} values",
        tag,
        if nullable { "nullable" } else { "non-nullable" },
        scalar
    ));
    w.line(format!("message {} {{", tag));
    w.line("  oneof filter {");

    let mut number = 1;
    for (type_, name) in filter_operations(kind) {
        w.line(format!("    {} {} = {};", type_, name, number));
        number += 1;
    }
    if nullable {
        w.line(format!("    google.protobuf.Empty is_null = {};", number));
        w.line(format!("    google.protobuf.Empty is_not_null = {};", number + 1));
    }

    w.line("  }");
    w.line("}");
    w.blank();
}

fn write_range_and_list(w: &mut ProtoWriter, kind: FilterKind)
{
    let scalar = kind.scalar();
    let label = kind.label();

    if !matches!(kind, FilterKind::String | FilterKind::Bool) {
        w.line(format!("// {}Range represents a range of {} values", label, scalar));
        w.line(format!("message {}Range {{", label));
        w.line(format!("  {} min = 1;", scalar));
        w.line(format!("  {} max = 2; // If not set, matches exact value (min)", scalar.wrapper()));
        w.line("}");
        w.blank();
    }

    if kind != FilterKind::Bool {
        w.line(format!("// {}List represents a list of {} values", label, scalar));
        w.line(format!("message {}List {{", label));
        w.line(format!("  repeated {} values = 1;", scalar));
        w.line("}");
        w.blank();
    }
}

fn write_map_filter(w: &mut ProtoWriter, value: FilterKind)
{
    let tag = FilterTag::Map { value };
    let label = value.label();
    let pair = format!("MapKeyValueString{}", label);

    w.line(format!("// {} represents a key-value pair filter for Map(String, {})", pair, label));
    w.line(format!("message {} {{", pair));
    w.line("  string key = 1;");
    w.line(format!("  {}Filter value_filter = 2;", label));
    w.line("}");
    w.blank();

    w.line(format!("// {} represents filtering options for Map(String, {}) values", tag, label));
    w.line(format!("message {} {{", tag));
    w.line("  oneof filter {");
    w.line(format!("    {} key_value = 1; // mapColumn['key'] op value", pair));
    w.line("    string has_key = 2; // mapContains(mapColumn, 'key')");
    w.line("    string not_has_key = 3; // NOT mapContains(mapColumn, 'key')");
    w.line("    StringList has_any_key = 4; // mapContainsAny(mapColumn, ['k1', 'k2'])");
    w.line("    StringList has_all_keys = 5; // mapContainsAll(mapColumn, ['k1', 'k2'])");
    w.line("  }");
    w.line("}");
    w.blank();
}

fn write_array_filter(w: &mut ProtoWriter, element: FilterKind)
{
    let name = array_filter_name(element);
    let scalar = element.scalar();
    let label = element.label();

    w.line(format!("// {} represents filtering options for Array({}) columns", name, label));
    w.line(format!("message {} {{", name));
    w.line("  oneof filter {");
    w.line(format!("    {} has = 1; // has(arr, value)", scalar));
    w.line(format!("    {}List has_all = 2; // hasAll(arr, [v1, v2])", label));
    w.line(format!("    {}List has_any = 3; // hasAny(arr, [v1, v2])", label));
    w.line("    uint32 length_eq = 4; // length(arr) = n");
    w.line("    uint32 length_gt = 5; // length(arr) > n");
    w.line("    uint32 length_gte = 6; // length(arr) >= n");
    w.line("    uint32 length_lt = 7; // length(arr) < n");
    w.line("    uint32 length_lte = 8; // length(arr) <= n");
    w.line("    google.protobuf.Empty is_empty = 9; // empty(arr)");
    w.line("    google.protobuf.Empty is_not_empty = 10; // notEmpty(arr)");
    w.line("  }");
    w.line("}");
    w.blank();
}

// ---------------------------------------------------------------------------
// clickhouse/annotations.proto
// ---------------------------------------------------------------------------

/// Renders the custom field options used by OR-group primary keys.
pub fn render_annotations_proto(config: &Configuration) -> String
{
    let mut w = ProtoWriter::default();

    write_header(&mut w, ANNOTATIONS_PACKAGE);
    w.blank();
    w.line("import \"google/protobuf/descriptor.proto\";");
    if !config.go_package.is_empty() {
        let go_package = format!("{}/{}", config.go_package.trim_end_matches('/'), ANNOTATIONS_DIR);
        write_go_package(&mut w, &go_package);
    }
    w.blank();

    w.line("extend google.protobuf.FieldOptions {");
    w.line("  // Field name this field can substitute for, typically a primary key.");
    w.line("  string projection_alternative_for = 50001;");
    w.blank();
    w.line("  // Name of the ClickHouse projection that enables this alternative key.");
    w.line("  string projection_name = 50002;");
    w.blank();
    w.line("  // Fields sharing a required_group value form an \"at least one required\" constraint.");
    w.line("  string required_group = 50003;");
    w.line("}");

    w.finish()
}

// ---------------------------------------------------------------------------
// <table>.proto
// ---------------------------------------------------------------------------

/// Renders the message and, when the table has a sorting key, the service
/// for one table.
pub fn render_table_proto(schema: &TableSchema, config: &Configuration) -> String
{
    let mut w = ProtoWriter::default();

    write_header(&mut w, &config.package);

    let service = schema.service.as_ref();
    let mut imports = Vec::new();
    if service.is_some() {
        imports.push(COMMON_FILE.to_string());
    }
    if schema.needs_wrappers() {
        imports.push("google/protobuf/wrappers.proto".to_string());
    }
    if service.is_some_and(|s| s.validation_message.is_some()) {
        imports.push(format!("{}/{}", ANNOTATIONS_DIR, ANNOTATIONS_FILE));
    }
    if service.is_some_and(|s| s.api) {
        imports.push("google/api/annotations.proto".to_string());
        imports.push("google/api/field_behavior.proto".to_string());
    }
    if !imports.is_empty() {
        w.blank();
        for import in imports {
            w.line(format!("import \"{}\";", import));
        }
    }
    write_go_package(&mut w, &config.go_package);

    w.blank();
    w.comment("", &schema.comment);
    w.line(format!("message {} {{", schema.message_name));
    for field in &schema.fields {
        w.comment("  ", &field.comment);
        w.line(format!("  {} {} = {};", field.proto_type, field.name, field.number));
    }
    w.line("}");

    if let Some(service) = service {
        write_service(&mut w, schema, service, config);
    }

    w.finish()
}

fn request_field_comment(field: &RequestField) -> String
{
    let description = if field.comment.is_empty() {
        String::new()
    } else {
        format!(" - {}", field.comment.lines().next().unwrap_or_default().trim())
    };

    let suffix = match (field.role, field.requirement, &field.projection) {
        (_, _, Some(alt)) => format!(
            "PROJECTION: {} - alternative to {}",
            alt.projection_name, alt.alternative_for
        ),
        (FieldRole::PrimaryKey, Requirement::Required, None) => "PRIMARY KEY - required".to_string(),
        (FieldRole::PrimaryKey, _, None) => "PRIMARY KEY - required unless an alternative is set".to_string(),
        (FieldRole::SortingKey(position), _, None) => format!("ORDER BY column {} - optional", position),
        (FieldRole::Column, _, None) => "optional".to_string(),
    };

    format!("Filter by {}{} ({})", field.column, description, suffix)
}

fn request_field_options(field: &RequestField, api: bool) -> Vec<String>
{
    let mut options = Vec::new();

    if field.requirement == Requirement::OneOfGroup {
        options.push(format!("({}.required_group) = \"{}\"", ANNOTATIONS_PACKAGE, REQUIRED_GROUP));
    }
    if let Some(alt) = &field.projection {
        options.push(format!(
            "({}.projection_alternative_for) = \"{}\"",
            ANNOTATIONS_PACKAGE, alt.alternative_for
        ));
        options.push(format!("({}.projection_name) = \"{}\"", ANNOTATIONS_PACKAGE, alt.projection_name));
    }
    if api {
        let behavior = if field.requirement == Requirement::Required { "REQUIRED" } else { "OPTIONAL" };
        options.push(format!("(google.api.field_behavior) = {}", behavior));
    }

    options
}

fn field_line(type_: impl std::fmt::Display, name: &str, number: i32, options: &[String]) -> String
{
    if options.is_empty() {
        format!("  {} {} = {};", type_, name, number)
    } else {
        format!("  {} {} = {} [{}];", type_, name, number, options.join(", "))
    }
}

fn write_service(w: &mut ProtoWriter, schema: &TableSchema, service: &ServiceDescriptor, config: &Configuration)
{
    let message = &schema.message_name;
    let table = &schema.table;
    let optional = if service.api {
        vec!["(google.api.field_behavior) = OPTIONAL".to_string()]
    } else {
        Vec::new()
    };

    w.blank();
    w.line(format!("// Request for listing {} records", table));
    if let Some(message) = &service.validation_message {
        w.line(format!("// Validation: {}", message));
    }
    w.line(format!("message List{}Request {{", message));
    for field in &service.list_fields {
        w.line(format!("  // {}", request_field_comment(field)));
        let options = request_field_options(field, service.api);
        w.line(field_line(field.request_type, &field.name, field.number, &options));
        if field.role != FieldRole::Column {
            w.blank();
        }
    }

    let mut number = service.next_field_number();
    w.blank();
    w.line(format!("  // The maximum number of {} to return.", table));
    w.line("  // If unspecified, at most 100 items will be returned.");
    w.line(format!(
        "  // The maximum value is {0}; values above {0} will be coerced to {0}.",
        config.max_page_size
    ));
    w.line(field_line("int32", "page_size", number, &optional));
    number += 1;
    w.line(format!("  // A page token, received from a previous `List{}` call.", message));
    w.line("  // Provide this to retrieve the subsequent page.");
    w.line(field_line("string", "page_token", number, &optional));
    number += 1;
    w.line("  // The order of results. Format: comma-separated list of fields.");
    w.line("  // Example: \"foo,bar\" or \"foo desc,bar\" for descending order on foo.");
    w.line("  // If unspecified, results will be returned in the default order.");
    w.line(field_line("string", "order_by", number, &optional));
    w.line("}");
    w.blank();

    w.line(format!("// Response for listing {} records", table));
    w.line(format!("message List{}Response {{", message));
    w.line(format!("  // The list of {}.", table));
    w.line(format!("  repeated {} {} = 1;", message, table.to_lowercase()));
    w.line("  // A token, which can be sent as `page_token` to retrieve the next page.");
    w.line("  // If this field is omitted, there are no subsequent pages.");
    w.line("  string next_page_token = 2;");
    w.line("}");
    w.blank();

    w.line(format!("// Request for getting a single {} record by primary key", table));
    w.line(format!("message Get{}Request {{", message));
    if let Some(key) = &service.get_key {
        w.comment("  ", &key.comment);
        w.line(format!("  {} {} = 1; // Primary key (required)", key.proto_type, key.name));
    }
    w.line("}");
    w.blank();

    w.line(format!("// Response for getting a single {} record", table));
    w.line(format!("message Get{}Response {{", message));
    w.line(format!("  {} item = 1;", message));
    w.line("}");
    w.blank();

    w.line(format!("// Query {} data", table));
    w.line(format!("service {}Service {{", message));
    w.line("  // List records | Retrieve paginated results with optional filtering");
    if service.api {
        w.line(format!("  rpc List(List{0}Request) returns (List{0}Response) {{", message));
        w.line("    option (google.api.http) = {");
        w.line(format!("      get: \"{}/{}\"", config.api_base_path, table));
        w.line("    };");
        w.line("  }");
    } else {
        w.line(format!("  rpc List(List{0}Request) returns (List{0}Response);", message));
    }

    match (&service.get_key, service.api) {
        (Some(key), true) => {
            w.line(format!("  // Get record | Retrieve a single record by {}", key.column));
            w.line(format!("  rpc Get(Get{0}Request) returns (Get{0}Response) {{", message));
            w.line("    option (google.api.http) = {");
            w.line(format!("      get: \"{}/{}/{{{}}}\"", config.api_base_path, table, key.name));
            w.line("    };");
            w.line("  }");
        }
        _ => {
            w.line("  // Get record | Retrieve a single record by primary key");
            w.line(format!("  rpc Get(Get{0}Request) returns (Get{0}Response);", message));
        }
    }
    w.line("}");
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

fn write_file(path: &Path, content: &str) -> Result<(), ProtoGenError>
{
    let file = path.display().to_string();
    fs::write(path, content).map_err(|e| ProtoGenError::from(e).with_file_context(&file))?;
    info!("Generated {}", file);
    Ok(())
}

fn create_dir(path: &Path) -> Result<(), ProtoGenError>
{
    fs::create_dir_all(path).map_err(|e| ProtoGenError::from(e).with_file_context(path.display().to_string()))
}

/// The file name a table's proto is written to.
pub fn table_file_name(table: &str) -> String
{
    format!("{}.proto", table.to_lowercase())
}

/// Writes all shared and per-table files into `config.output_dir`.
pub fn write_outputs(schemas: &[TableSchema], config: &Configuration) -> Result<(), ProtoGenError>
{
    let output_dir = config.output_dir.as_path();
    let annotations_dir = output_dir.join(ANNOTATIONS_DIR);
    create_dir(output_dir)?;
    create_dir(&annotations_dir)?;

    write_file(&output_dir.join(COMMON_FILE), &render_common_proto(config))?;
    write_file(&annotations_dir.join(ANNOTATIONS_FILE), &render_annotations_proto(config))?;

    for schema in schemas {
        write_file(&output_dir.join(table_file_name(&schema.table)), &render_table_proto(schema, config))?;

        let json = serde_json::to_string_pretty(schema).map_err(ProtoGenError::SerializationFailed)?;
        write_file(&output_dir.join(format!("{}.schema.json", schema.table)), &json)?;
    }

    Ok(())
}
