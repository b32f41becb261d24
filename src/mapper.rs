//! ClickHouse to protobuf type mapping.
//!
//! Mapping is total: a type that is not recognised degrades to `string`
//! rather than failing, so an exotic column never stops generation.

use std::fmt;

use serde::{Serialize, Serializer};

use crate::config::ConversionConfig;
use crate::parser::{inner_type, parse_map_type, strip_nullable, type_name};
use crate::types::Column;

/// A protobuf scalar type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtoScalar
{
    Int32,
    Int64,
    UInt32,
    UInt64,
    Float,
    Double,
    Bool,
    String,
    Bytes,
}

impl ProtoScalar
{
    pub fn as_str(self) -> &'static str
    {
        match self {
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::UInt32 => "uint32",
            Self::UInt64 => "uint64",
            Self::Float => "float",
            Self::Double => "double",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Bytes => "bytes",
        }
    }

    /// The `google.protobuf` wrapper message used for nullable fields.
    pub fn wrapper(self) -> &'static str
    {
        match self {
            Self::Int32 => "google.protobuf.Int32Value",
            Self::Int64 => "google.protobuf.Int64Value",
            Self::UInt32 => "google.protobuf.UInt32Value",
            Self::UInt64 => "google.protobuf.UInt64Value",
            Self::Float => "google.protobuf.FloatValue",
            Self::Double => "google.protobuf.DoubleValue",
            Self::Bool => "google.protobuf.BoolValue",
            Self::String => "google.protobuf.StringValue",
            Self::Bytes => "google.protobuf.BytesValue",
        }
    }

    /// Protobuf only accepts integral, bool and string map keys.
    pub fn is_valid_map_key(self) -> bool
    {
        matches!(
            self,
            Self::Int32 | Self::Int64 | Self::UInt32 | Self::UInt64 | Self::Bool | Self::String
        )
    }
}

impl fmt::Display for ProtoScalar
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(self.as_str())
    }
}

/// A column's mapped type before the nullable/array layers are applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType
{
    Scalar(ProtoScalar),
    Map
    {
        key: ProtoScalar,
        value: ProtoScalar,
    },
}

/// The protobuf type of a generated field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtoType
{
    Scalar(ProtoScalar),
    /// `google.protobuf.*Value`, for nullable scalars.
    Wrapper(ProtoScalar),
    Repeated(ProtoScalar),
    Map
    {
        key: ProtoScalar,
        value: ProtoScalar,
    },
}

impl ProtoType
{
    /// The scalar carried by this type, ignoring wrapper and repetition.
    /// `None` for maps.
    pub fn scalar(&self) -> Option<ProtoScalar>
    {
        match self {
            Self::Scalar(s) | Self::Wrapper(s) | Self::Repeated(s) => Some(*s),
            Self::Map { .. } => None,
        }
    }

    pub fn is_wrapper(&self) -> bool
    {
        matches!(self, Self::Wrapper(_))
    }
}

impl fmt::Display for ProtoType
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        match self {
            Self::Scalar(s) => write!(f, "{}", s),
            Self::Wrapper(s) => f.write_str(s.wrapper()),
            Self::Repeated(s) => write!(f, "repeated {}", s),
            Self::Map { key, value } => write!(f, "map<{}, {}>", key, value),
        }
    }
}

impl Serialize for ProtoType
{
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error>
    {
        serializer.collect_str(self)
    }
}

/// Whether a base type is one of the 64-bit integers eligible for the
/// string override.
pub fn is_bigint(base_type: &str) -> bool
{
    matches!(base_type, "Int64" | "UInt64")
}

/// Whether the big-integer-to-string override applies to this column.
pub fn uses_string_override(column: &Column, table: &str, conversion: &ConversionConfig) -> bool
{
    is_bigint(column.base_type()) && conversion.should_convert_to_string(table, &column.name)
}

/// Maps a column to its protobuf field type.
pub fn map_type(column: &Column, table: &str, conversion: &ConversionConfig) -> ProtoType
{
    let element = element_type(column, table, conversion);
    apply_modifiers(element, column.is_nullable(), column.is_array())
}

/// The type used for an optional request field when no filter exists:
/// arrays stay repeated, scalars are always wrapped so absence is visible.
pub fn optional_type(column: &Column, table: &str, conversion: &ConversionConfig) -> ProtoType
{
    let element = element_type(column, table, conversion);
    apply_modifiers(element, true, column.is_array())
}

/// The mapped type of the column's innermost element, honouring the
/// big-integer override.
pub fn element_type(column: &Column, table: &str, conversion: &ConversionConfig) -> ElementType
{
    if uses_string_override(column, table, conversion) {
        return ElementType::Scalar(ProtoScalar::String);
    }

    map_unwrapped(column.unwrapped_type())
}

fn apply_modifiers(element: ElementType, nullable: bool, array: bool) -> ProtoType
{
    match element {
        ElementType::Scalar(s) if array => ProtoType::Repeated(s),
        ElementType::Scalar(s) if nullable => ProtoType::Wrapper(s),
        ElementType::Scalar(s) => ProtoType::Scalar(s),
        // protobuf has no repeated maps
        ElementType::Map { .. } if array => ProtoType::Repeated(ProtoScalar::String),
        ElementType::Map { key, value } => ProtoType::Map { key, value },
    }
}

/// Maps a type with its Nullable/Array layers already removed, parameters
/// included (e.g. `DateTime64(3)`, `LowCardinality(String)`).
pub fn map_unwrapped(type_str: &str) -> ElementType
{
    let type_str = type_str.trim();
    let base = type_name(type_str);

    match base {
        "LowCardinality" => {
            let inner = inner_type(type_str);
            if inner == type_str {
                return ElementType::Scalar(ProtoScalar::String);
            }
            map_unwrapped(strip_nullable(inner))
        }
        "Map" => map_map_type(type_str),
        _ => ElementType::Scalar(map_base_type(base)),
    }
}

fn map_map_type(type_str: &str) -> ElementType
{
    let Some((key, value)) = parse_map_type(type_str) else {
        return ElementType::Scalar(ProtoScalar::String);
    };

    let key = match map_unwrapped(&key) {
        ElementType::Scalar(s) if s.is_valid_map_key() => s,
        _ => return ElementType::Scalar(ProtoScalar::String),
    };

    let value = match map_unwrapped(&value) {
        ElementType::Scalar(s) => s,
        ElementType::Map { .. } => ProtoScalar::String,
    };

    ElementType::Map { key, value }
}

/// The fixed scalar table. Unknown names map to `string`.
pub fn map_base_type(base: &str) -> ProtoScalar
{
    match base {
        "Int8" | "Int16" | "Int32" => ProtoScalar::Int32,
        "Int64" => ProtoScalar::Int64,
        "UInt8" | "UInt16" | "UInt32" => ProtoScalar::UInt32,
        "UInt64" => ProtoScalar::UInt64,
        "Float32" => ProtoScalar::Float,
        "Float64" => ProtoScalar::Double,
        "Bool" => ProtoScalar::Bool,

        // Unix seconds
        "DateTime" => ProtoScalar::UInt32,
        // microseconds, whatever the declared precision
        "DateTime64" => ProtoScalar::Int64,

        "Binary" => ProtoScalar::Bytes,

        "Int128" | "Int256" | "UInt128" | "UInt256" => ProtoScalar::String,
        "Decimal" | "Decimal32" | "Decimal64" | "Decimal128" | "Decimal256" => ProtoScalar::String,
        "String" | "FixedString" | "Date" | "Date32" | "UUID" | "IPv4" | "IPv6" | "JSON" | "Enum8" | "Enum16" => {
            ProtoScalar::String
        }
        "Point" | "Ring" | "Polygon" | "MultiPolygon" | "Tuple" => ProtoScalar::String,

        _ => ProtoScalar::String,
    }
}

/// Whether the scalar table recognises `base` on its own, as opposed to
/// falling back to text.
pub fn is_known_base_type(base: &str) -> bool
{
    matches!(
        base,
        "Int8"
            | "Int16"
            | "Int32"
            | "Int64"
            | "UInt8"
            | "UInt16"
            | "UInt32"
            | "UInt64"
            | "Float32"
            | "Float64"
            | "Bool"
            | "DateTime"
            | "DateTime64"
            | "Binary"
            | "Int128"
            | "Int256"
            | "UInt128"
            | "UInt256"
            | "Decimal"
            | "Decimal32"
            | "Decimal64"
            | "Decimal128"
            | "Decimal256"
            | "String"
            | "FixedString"
            | "Date"
            | "Date32"
            | "UUID"
            | "IPv4"
            | "IPv6"
            | "JSON"
            | "Enum8"
            | "Enum16"
            | "Point"
            | "Ring"
            | "Polygon"
            | "MultiPolygon"
            | "Tuple"
            | "LowCardinality"
            | "Map"
    )
}
