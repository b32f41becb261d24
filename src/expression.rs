//! SELECT expressions that make column values safe to transport.
//!
//! ClickHouse returns some types in shapes protobuf cannot carry directly
//! (calendar dates, narrow integers, 128/256-bit integers, timestamps). The
//! rewritten expression converts them on the server and aliases the result
//! back to the column name.

use crate::config::ConversionConfig;
use crate::mapper::uses_string_override;
use crate::parser::{inner_type, split_top_level, strip_nullable, type_name};
use crate::types::Column;

/// Precision assumed when a `DateTime64` declares none.
const DEFAULT_DATETIME64_PRECISION: &str = "3";

/// A scalar conversion applied to a column value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conversion
{
    /// `DateTime` to Unix seconds.
    UnixTimestamp,
    /// `DateTime64` to Unix microseconds.
    UnixTimestamp64Micro,
    /// Calendar dates, wide integers and overridden 64-bit integers.
    ToString,
    /// `UInt8` / `UInt16` widened for protobuf.
    ToUInt32,
}

impl Conversion
{
    pub fn function(self) -> &'static str
    {
        match self {
            Self::UnixTimestamp => "toUnixTimestamp",
            Self::UnixTimestamp64Micro => "toUnixTimestamp64Micro",
            Self::ToString => "toString",
            Self::ToUInt32 => "toUInt32",
        }
    }
}

/// Whether the base type is a 128/256-bit integer, which protobuf carries as text.
pub fn needs_string_conversion(base_type: &str) -> bool
{
    matches!(base_type, "Int128" | "Int256" | "UInt128" | "UInt256")
}

/// The conversion the column needs, or `None` to select it unchanged.
pub fn conversion_for(column: &Column, table: &str, conversion: &ConversionConfig) -> Option<Conversion>
{
    if uses_string_override(column, table, conversion) {
        return Some(Conversion::ToString);
    }

    match element_base(column) {
        "DateTime" => Some(Conversion::UnixTimestamp),
        "DateTime64" => Some(Conversion::UnixTimestamp64Micro),
        "Date" | "Date32" => Some(Conversion::ToString),
        "UInt8" | "UInt16" => Some(Conversion::ToUInt32),
        base if needs_string_conversion(base) => Some(Conversion::ToString),
        _ => None,
    }
}

/// Base type name with a `LowCardinality` wrapper looked through, so
/// `LowCardinality(UInt8)` converts like `UInt8`.
fn element_base(column: &Column) -> &str
{
    match column.base_type() {
        "LowCardinality" => type_name(strip_nullable(inner_type(column.unwrapped_type()))),
        base => base,
    }
}

/// Builds the SELECT expression for a column.
///
/// Columns without a conversion are returned as their bare name. Arrays are
/// converted element-wise, and arrays of nullable elements substitute a
/// typed zero for NULL first, since the conversion functions reject NULL.
pub fn select_expression(column: &Column, table: &str, conversion: &ConversionConfig) -> String
{
    let Some(conv) = conversion_for(column, table, conversion) else {
        return column.name.clone();
    };

    let function = conv.function();
    let name = &column.name;

    if !column.is_array() {
        return format!("{}(`{}`) AS `{}`", function, name, name);
    }

    if column.is_nullable() {
        let default = null_default(column);
        format!("arrayMap(x -> {}(coalesce(x, {})), `{}`) AS `{}`", function, default, name, name)
    } else {
        format!("arrayMap(x -> {}(x), `{}`) AS `{}`", function, name, name)
    }
}

/// A value of the element type that stands in for NULL before conversion.
fn null_default(column: &Column) -> String
{
    match element_base(column) {
        "Date" => "toDate(0)".to_string(),
        "Date32" => "toDate32(0)".to_string(),
        "DateTime" => "toDateTime(0)".to_string(),
        "DateTime64" => {
            let args = split_top_level(inner_type(column.unwrapped_type()));
            let precision = args
                .first()
                .map(|p| p.trim())
                .filter(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
                .unwrap_or(DEFAULT_DATETIME64_PRECISION);
            format!("toDateTime64(0, {})", precision)
        }
        _ => "0".to_string(),
    }
}
