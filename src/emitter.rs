//! Assembles per-table schema descriptors.
//!
//! [`compile_table`] runs the mapper, filter selector, primary-key
//! reconciler and expression rewriter over one table and collects the
//! results into a [`TableSchema`]. Rendering the descriptor into text is
//! left to [`crate::codegen`].

use std::fmt;

use log::debug;
use serde::{Serialize, Serializer};

use crate::config::Configuration;
use crate::expression::select_expression;
use crate::filter::{filter_for, FilterTag};
use crate::mapper::{is_known_base_type, map_type, optional_type, ProtoType};
use crate::primary_key::{reconcile, PrimaryKeyMode, PrimaryKeySet};
use crate::types::{Column, Table};

/// Offset added to a column position so low field numbers stay free.
const FIELD_NUMBER_OFFSET: u64 = 10;

const RESERVED_WORDS: &[&str] = &[
    "syntax",
    "package",
    "import",
    "public",
    "option",
    "message",
    "enum",
    "service",
    "rpc",
    "returns",
    "stream",
    "repeated",
    "optional",
    "required",
    "reserved",
    "extensions",
    "extend",
    "oneof",
    "map",
    "bool",
    "string",
    "bytes",
    "float",
    "double",
    "int32",
    "int64",
    "uint32",
    "uint64",
    "sint32",
    "sint64",
    "fixed32",
    "fixed64",
    "sfixed32",
    "sfixed64",
];

/// Field number for a column at the given 1-based catalog position.
///
/// The result is always a valid protobuf field number in `1..=i32::MAX`.
pub fn field_number(position: u64) -> i32
{
    let number = position.saturating_add(FIELD_NUMBER_OFFSET);
    i32::try_from(number).unwrap_or(i32::MAX).max(1)
}

/// Whether `word` is a protobuf keyword or scalar type name (case-insensitive).
pub fn is_reserved_word(word: &str) -> bool
{
    RESERVED_WORDS.iter().any(|w| w.eq_ignore_ascii_case(word))
}

/// Turns a column name into a valid protobuf identifier.
pub fn sanitize_name(name: &str) -> String
{
    let mut result = String::with_capacity(name.len());

    for (idx, ch) in name.chars().enumerate() {
        if ch.is_ascii_alphabetic() || ch == '_' {
            result.push(ch);
        } else if ch.is_ascii_digit() {
            if idx == 0 {
                result.push_str("f_");
            }
            result.push(ch);
        } else {
            result.push('_');
        }
    }

    if is_reserved_word(&result) {
        result.push_str("_field");
    }

    result
}

/// `beacon_block` -> `BeaconBlock`. Each `_`-separated part is capitalised
/// and the rest of it lowercased.
pub fn to_pascal_case(name: &str) -> String
{
    name.split('_')
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.as_str().to_lowercase().chars()).collect(),
                None => String::new(),
            }
        })
        .collect()
}

/// One field of the table's main message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldDescriptor
{
    /// Original ClickHouse column name.
    pub column: String,
    /// Sanitized protobuf field name.
    pub name: String,
    pub proto_type: ProtoType,
    pub number: i32,
    pub comment: String,
    pub filter: Option<FilterTag>,
    pub select_expression: String,
}

/// How a List request field must be supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement
{
    Required,
    /// Optional on its own, but the primary-key group needs one member.
    OneOfGroup,
    Optional,
}

/// Why a column appears where it does in the List request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "position", rename_all = "snake_case")]
pub enum FieldRole
{
    PrimaryKey,
    /// A non-leading `ORDER BY` column and its 1-based position.
    SortingKey(usize),
    Column,
}

/// The type of a request field: a filter message or a plain protobuf type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType
{
    Filter(FilterTag),
    Value(ProtoType),
}

impl RequestType
{
    pub fn filter(&self) -> Option<FilterTag>
    {
        match self {
            Self::Filter(tag) => Some(*tag),
            Self::Value(_) => None,
        }
    }

    fn is_wrapper(&self) -> bool
    {
        matches!(self, Self::Value(t) if t.is_wrapper())
    }
}

impl fmt::Display for RequestType
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::Filter(tag) => write!(f, "{}", tag),
            Self::Value(proto_type) => write!(f, "{}", proto_type),
        }
    }
}

impl Serialize for RequestType
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error>
    {
        serializer.collect_str(self)
    }
}

/// Marks a key that a projection contributes as an alternative lookup path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectionAlternative
{
    /// The canonical key column this one substitutes for.
    pub alternative_for: String,
    pub projection_name: String,
}

/// One filter field of the List request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequestField
{
    pub column: String,
    pub name: String,
    pub request_type: RequestType,
    pub number: i32,
    pub requirement: Requirement,
    pub role: FieldRole,
    pub comment: String,
    /// Handlers must check for presence before reading the filter.
    pub nil_guarded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projection: Option<ProjectionAlternative>,
}

/// The canonical key used by the Get request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GetKey
{
    pub column: String,
    pub name: String,
    pub proto_type: ProtoType,
    pub comment: String,
}

/// List/Get request contract for a table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDescriptor
{
    pub list_fields: Vec<RequestField>,
    pub get_key: Option<GetKey>,
    /// Emit `google.api.http` and `field_behavior` annotations.
    pub api: bool,
    pub validation_message: Option<String>,
}

impl ServiceDescriptor
{
    /// First free field number after the filter fields.
    pub fn next_field_number(&self) -> i32
    {
        self.list_fields.last().map(|f| f.number + 1).unwrap_or(1)
    }
}

/// Everything the writers need to render one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSchema
{
    pub database: String,
    pub table: String,
    pub message_name: String,
    pub comment: String,
    pub fields: Vec<FieldDescriptor>,
    pub primary_key: Option<PrimaryKeySet>,
    pub service: Option<ServiceDescriptor>,
}

impl TableSchema
{
    /// The SELECT list for this table, one expression per column.
    pub fn select_list(&self) -> Vec<String>
    {
        self.fields.iter().map(|f| f.select_expression.clone()).collect()
    }

    pub fn field(&self, column: &str) -> Option<&FieldDescriptor>
    {
        self.fields.iter().find(|f| f.column == column)
    }

    /// Whether any generated message refers to a `google.protobuf` wrapper.
    pub fn needs_wrappers(&self) -> bool
    {
        if self.fields.iter().any(|f| f.proto_type.is_wrapper()) {
            return true;
        }

        match &self.service {
            Some(service) => {
                service.list_fields.iter().any(|f| f.request_type.is_wrapper())
                    || service.get_key.as_ref().is_some_and(|k| k.proto_type.is_wrapper())
            }
            None => false,
        }
    }

    pub fn has_service(&self) -> bool
    {
        self.service.is_some()
    }
}

/// Compiles one table into its schema descriptor.
pub fn compile_table(table: &Table, config: &Configuration) -> TableSchema
{
    let conversion = &config.conversion;
    let comment_of = |text: &str| if config.include_comments { text.to_string() } else { String::new() };

    let fields = table
        .columns
        .iter()
        .map(|column| {
            if !is_known_base_type(column.base_type()) {
                debug!(
                    "Column {}.{} has unrecognised type {}, mapping to string",
                    table.name, column.name, column.type_
                );
            }

            FieldDescriptor {
                column: column.name.clone(),
                name: sanitize_name(&column.name),
                proto_type: map_type(column, &table.name, conversion),
                number: field_number(column.position),
                comment: comment_of(&column.comment),
                filter: filter_for(column, &table.name, conversion),
                select_expression: select_expression(column, &table.name, conversion),
            }
        })
        .collect();

    // Keys led by an expression rather than a column cannot be requested.
    let primary_key = reconcile(table).and_then(|keys| {
        keys.retain(|key| {
            let present = table.column(&key.column).is_some();
            if !present {
                debug!("Primary key {} of {} is not a column, dropping", key.column, table.name);
            }
            present
        })
    });

    let service = match &primary_key {
        Some(keys) if !table.sorting_key.is_empty() => Some(compile_service(table, keys, config)),
        _ => None,
    };

    TableSchema {
        database: table.database.clone(),
        table: table.name.clone(),
        message_name: to_pascal_case(&table.name),
        comment: comment_of(&table.comment),
        fields,
        primary_key,
        service,
    }
}

fn compile_service(table: &Table, keys: &PrimaryKeySet, config: &Configuration) -> ServiceDescriptor
{
    let conversion = &config.conversion;
    let comment_of = |column: &Column| {
        if config.include_comments {
            column.comment.clone()
        } else {
            String::new()
        }
    };

    let canonical = keys.canonical().map(|k| k.column.as_str()).unwrap_or_default();
    let mut list_fields: Vec<RequestField> = Vec::new();
    let mut number = 1;

    let mut push = |fields: &mut Vec<RequestField>,
                    column: &Column,
                    requirement: Requirement,
                    role: FieldRole,
                    projection: Option<ProjectionAlternative>| {
        let request_type = match filter_for(column, &table.name, conversion) {
            Some(tag) => RequestType::Filter(tag),
            None if requirement == Requirement::Required => RequestType::Value(map_type(column, &table.name, conversion)),
            None => RequestType::Value(optional_type(column, &table.name, conversion)),
        };

        fields.push(RequestField {
            column: column.name.clone(),
            name: sanitize_name(&column.name),
            request_type,
            number,
            requirement,
            role,
            comment: comment_of(column),
            nil_guarded: requirement != Requirement::Required,
            projection,
        });
        number += 1;
    };

    for key in &keys.keys {
        let Some(column) = table.column(&key.column) else {
            continue;
        };

        let requirement = match keys.mode {
            PrimaryKeyMode::Required => Requirement::Required,
            PrimaryKeyMode::OrGroup => Requirement::OneOfGroup,
        };
        let projection = key.projection().map(|name| ProjectionAlternative {
            alternative_for: canonical.to_string(),
            projection_name: name.to_string(),
        });

        push(&mut list_fields, column, requirement, FieldRole::PrimaryKey, projection);
    }

    for (idx, sort_column) in table.sorting_key.iter().enumerate() {
        if keys.contains(sort_column) || list_fields.iter().any(|f| &f.column == sort_column) {
            continue;
        }
        let Some(column) = table.column(sort_column) else {
            continue;
        };
        push(&mut list_fields, column, Requirement::Optional, FieldRole::SortingKey(idx + 1), None);
    }

    for column in &table.columns {
        if list_fields.iter().any(|f| f.column == column.name) {
            continue;
        }
        push(&mut list_fields, column, Requirement::Optional, FieldRole::Column, None);
    }

    let get_key = table.column(canonical).map(|column| GetKey {
        column: column.name.clone(),
        name: sanitize_name(&column.name),
        proto_type: map_type(column, &table.name, conversion),
        comment: comment_of(column),
    });

    ServiceDescriptor {
        list_fields,
        get_key,
        api: config.should_generate_api(&table.name),
        validation_message: keys.validation_message(),
    }
}
