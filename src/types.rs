//! Shared type definitions for ClickHouse tables, columns and projections.
//!
//! These types are the stable interface between the catalog layer (which
//! produces them) and the compiler (which only reads them).

use serde::{Deserialize, Serialize};

use crate::parser::{parse_type, TypeShape};

/// A column's `DEFAULT` / `MATERIALIZED` / `ALIAS` descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultValue
{
    pub kind: Option<String>,
    pub expression: Option<String>,
}

/// A column in a ClickHouse table.
///
/// The wrapper flags and base type are derived from the declared type once,
/// in [`Column::new`], and cannot drift from it afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column
{
    /// The name of the column.
    pub name: String,
    /// The declared ClickHouse type, e.g. `Nullable(Array(UInt64))`.
    pub type_: String,
    /// 1-based position in `system.columns`.
    pub position: u64,
    pub comment: String,
    pub default: Option<DefaultValue>,
    shape: TypeShape,
}

impl Column
{
    pub fn new(name: impl Into<String>, type_: impl Into<String>, position: u64) -> Self
    {
        let type_ = type_.into();
        let shape = parse_type(&type_);

        Self {
            name: name.into(),
            type_,
            position,
            comment: String::new(),
            default: None,
            shape,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self
    {
        self.comment = comment.into();
        self
    }

    pub fn with_default(mut self, kind: Option<String>, expression: Option<String>) -> Self
    {
        if kind.is_some() || expression.is_some() {
            self.default = Some(DefaultValue { kind, expression });
        }
        self
    }

    /// Innermost type name, e.g. `UInt64` for `Nullable(Array(UInt64))`.
    pub fn base_type(&self) -> &str
    {
        &self.shape.base
    }

    /// Declared type with the Nullable/Array layers removed.
    pub fn unwrapped_type(&self) -> &str
    {
        &self.shape.unwrapped
    }

    pub fn is_nullable(&self) -> bool
    {
        self.shape.nullable
    }

    pub fn is_array(&self) -> bool
    {
        self.shape.array
    }

    pub fn shape(&self) -> &TypeShape
    {
        &self.shape
    }
}

/// Kind of a projection as reported by `system.projections`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectionKind
{
    Normal,
    Aggregate,
    Other(String),
}

impl From<&str> for ProjectionKind
{
    fn from(value: &str) -> Self
    {
        match value.to_ascii_lowercase().as_str() {
            "" | "normal" => ProjectionKind::Normal,
            "aggregate" => ProjectionKind::Aggregate,
            _ => ProjectionKind::Other(value.to_string()),
        }
    }
}

/// A projection: a secondary ordering of a table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection
{
    pub name: String,
    /// Already resolved column names, no ASC/DESC markers.
    pub order_by_key: Vec<String>,
    pub kind: ProjectionKind,
}

impl Projection
{
    pub fn new(name: impl Into<String>, order_by_key: Vec<String>) -> Self
    {
        Self {
            name: name.into(),
            order_by_key,
            kind: ProjectionKind::Normal,
        }
    }

    pub fn with_kind(mut self, kind: ProjectionKind) -> Self
    {
        self.kind = kind;
        self
    }

    /// The column this projection is ordered by first, if any.
    pub fn leading_column(&self) -> Option<&str>
    {
        self.order_by_key.first().map(String::as_str)
    }
}

/// A ClickHouse table snapshot, identified by `(database, name)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table
{
    pub database: String,
    pub name: String,
    pub comment: String,
    /// Columns in declared position order.
    pub columns: Vec<Column>,
    /// `ORDER BY` columns with ASC/DESC and parentheses stripped.
    pub sorting_key: Vec<String>,
    pub projections: Vec<Projection>,
}

impl Table
{
    pub fn new(database: impl Into<String>, name: impl Into<String>) -> Self
    {
        Self {
            database: database.into(),
            name: name.into(),
            comment: String::new(),
            columns: Vec::new(),
            sorting_key: Vec::new(),
            projections: Vec::new(),
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self
    {
        self.comment = comment.into();
        self
    }

    pub fn with_column(mut self, column: Column) -> Self
    {
        self.columns.push(column);
        self
    }

    pub fn with_sorting_key<S: Into<String>>(mut self, key: impl IntoIterator<Item = S>) -> Self
    {
        self.sorting_key = key.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_projection(mut self, projection: Projection) -> Self
    {
        self.projections.push(projection);
        self
    }

    pub fn column(&self, name: &str) -> Option<&Column>
    {
        self.columns.iter().find(|c| c.name == name)
    }

    /// The table's own first `ORDER BY` column.
    pub fn leading_column(&self) -> Option<&str>
    {
        self.sorting_key.first().map(String::as_str)
    }

    pub fn qualified_name(&self) -> String
    {
        format!("{}.{}", self.database, self.name)
    }
}
