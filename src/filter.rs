//! Filter selection for request fields.
//!
//! A filter tag names a message in `common.proto`. The tag is derived from
//! the mapped protobuf type, never from the native ClickHouse type, so an
//! overridden `UInt64` column gets the string filter.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::config::ConversionConfig;
use crate::mapper::{element_type, uses_string_override, ElementType, ProtoScalar};
use crate::parser::{inner_type, parse_map_type, strip_nullable, type_name};
use crate::types::Column;

/// The scalar family a filter compares against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind
{
    Int32,
    Int64,
    UInt32,
    UInt64,
    String,
    Bool,
}

impl FilterKind
{
    pub const ALL: [FilterKind; 6] = [
        FilterKind::Int32,
        FilterKind::Int64,
        FilterKind::UInt32,
        FilterKind::UInt64,
        FilterKind::String,
        FilterKind::Bool,
    ];

    /// Floats and bytes have no filter.
    pub fn from_scalar(scalar: ProtoScalar) -> Option<Self>
    {
        match scalar {
            ProtoScalar::Int32 => Some(Self::Int32),
            ProtoScalar::Int64 => Some(Self::Int64),
            ProtoScalar::UInt32 => Some(Self::UInt32),
            ProtoScalar::UInt64 => Some(Self::UInt64),
            ProtoScalar::String => Some(Self::String),
            ProtoScalar::Bool => Some(Self::Bool),
            ProtoScalar::Float | ProtoScalar::Double | ProtoScalar::Bytes => None,
        }
    }

    pub fn scalar(self) -> ProtoScalar
    {
        match self {
            Self::Int32 => ProtoScalar::Int32,
            Self::Int64 => ProtoScalar::Int64,
            Self::UInt32 => ProtoScalar::UInt32,
            Self::UInt64 => ProtoScalar::UInt64,
            Self::String => ProtoScalar::String,
            Self::Bool => ProtoScalar::Bool,
        }
    }

    /// Name fragment used in message names, e.g. `UInt64`.
    pub fn label(self) -> &'static str
    {
        match self {
            Self::Int32 => "Int32",
            Self::Int64 => "Int64",
            Self::UInt32 => "UInt32",
            Self::UInt64 => "UInt64",
            Self::String => "String",
            Self::Bool => "Bool",
        }
    }
}

/// Identifies the filter message exposed for a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterTag
{
    /// `Int32Filter`, `NullableStringFilter`, ...
    Scalar
    {
        kind: FilterKind,
        nullable: bool,
    },
    /// `MapStringXFilter`: string keys, `kind` values.
    Map
    {
        value: FilterKind,
    },
}

impl FilterTag
{
    /// Value kinds supported by map filters. Bool maps have no filter.
    pub const MAP_VALUE_KINDS: [FilterKind; 5] = [
        FilterKind::String,
        FilterKind::UInt32,
        FilterKind::UInt64,
        FilterKind::Int32,
        FilterKind::Int64,
    ];

    pub fn name(&self) -> String
    {
        match self {
            Self::Scalar { kind, nullable: true } => format!("Nullable{}Filter", kind.label()),
            Self::Scalar { kind, nullable: false } => format!("{}Filter", kind.label()),
            Self::Map { value } => format!("MapString{}Filter", value.label()),
        }
    }

    /// The scalar the filter compares; for map filters, the value scalar.
    pub fn scalar(&self) -> ProtoScalar
    {
        match self {
            Self::Scalar { kind, .. } => kind.scalar(),
            Self::Map { value } => value.scalar(),
        }
    }

    pub fn is_nullable(&self) -> bool
    {
        matches!(self, Self::Scalar { nullable: true, .. })
    }

    pub fn is_map(&self) -> bool
    {
        matches!(self, Self::Map { .. })
    }
}

impl fmt::Display for FilterTag
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(&self.name())
    }
}

impl Serialize for FilterTag
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error>
    {
        serializer.collect_str(self)
    }
}

/// Selects the filter for a column, or `None` when it cannot be filtered.
pub fn filter_for(column: &Column, table: &str, conversion: &ConversionConfig) -> Option<FilterTag>
{
    if column.is_array() {
        return None;
    }

    if uses_string_override(column, table, conversion) {
        return Some(FilterTag::Scalar {
            kind: FilterKind::String,
            nullable: column.is_nullable(),
        });
    }

    match element_type(column, table, conversion) {
        ElementType::Scalar(scalar) => {
            if is_text_composite(column.unwrapped_type()) {
                return None;
            }
            let kind = FilterKind::from_scalar(scalar)?;
            Some(FilterTag::Scalar {
                kind,
                nullable: column.is_nullable(),
            })
        }
        ElementType::Map { .. } => map_filter(column.unwrapped_type()),
    }
}

/// Structured types that are carried as text but cannot be compared as
/// text: tuples, geo shapes and maps whose key degraded the whole column.
fn is_text_composite(type_str: &str) -> bool
{
    let base = match type_name(type_str) {
        "LowCardinality" => type_name(strip_nullable(inner_type(type_str))),
        base => base,
    };

    matches!(
        base,
        "Tuple" | "Nested" | "Map" | "Point" | "Ring" | "Polygon" | "MultiPolygon"
    )
}

/// Map filters compare a native `String` key against one of the integer or
/// `String` value types. Keys or values that only degrade to text do not
/// qualify.
fn map_filter(type_str: &str) -> Option<FilterTag>
{
    let (key, value) = parse_map_type(type_str)?;

    if native_scalar(&key) != "String" {
        return None;
    }

    let value = map_value_kind(native_scalar(&value))?;
    Some(FilterTag::Map { value })
}

/// Removes a `LowCardinality` wrapper and the `Nullable` layer inside it.
fn native_scalar(type_str: &str) -> &str
{
    let type_str = type_str.trim();
    match type_name(type_str) {
        "LowCardinality" => strip_nullable(inner_type(type_str)).trim(),
        _ => type_str,
    }
}

fn map_value_kind(native: &str) -> Option<FilterKind>
{
    match native {
        "String" => Some(FilterKind::String),
        "UInt8" | "UInt16" | "UInt32" => Some(FilterKind::UInt32),
        "UInt64" => Some(FilterKind::UInt64),
        "Int8" | "Int16" | "Int32" => Some(FilterKind::Int32),
        "Int64" => Some(FilterKind::Int64),
        _ => None,
    }
}

/// Element kinds that get an `Array<Kind>Filter` message.
pub const ARRAY_ELEMENT_KINDS: [FilterKind; 5] = [
    FilterKind::UInt32,
    FilterKind::UInt64,
    FilterKind::Int32,
    FilterKind::Int64,
    FilterKind::String,
];

/// Name of the array filter message for an element kind.
pub fn array_filter_name(element: FilterKind) -> String
{
    format!("Array{}Filter", element.label())
}

/// Every filter message `common.proto` must define, in declaration order.
pub fn all_filter_tags() -> Vec<FilterTag>
{
    let mut tags = Vec::new();
    for kind in FilterKind::ALL {
        tags.push(FilterTag::Scalar { kind, nullable: false });
        tags.push(FilterTag::Scalar { kind, nullable: true });
    }
    for value in FilterTag::MAP_VALUE_KINDS {
        tags.push(FilterTag::Map { value });
    }
    tags
}
