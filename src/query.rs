//! Parameterized query construction.
//!
//! [`QueryBuilder`] collects `WHERE` conditions with positional `?`
//! arguments; [`build_parameterized_query`] combines them with a column
//! list, ordering and paging into a single [`SqlQuery`]. Values are never
//! interpolated into the SQL text.

use std::fmt;

use crate::errors::ProtoGenError;

/// A bound query argument.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryValue
{
    Int(i64),
    UInt(u64),
    Float(f64),
    Bool(bool),
    String(String),
    /// Unix seconds, bound through `fromUnixTimestamp(?)`.
    DateTime(u32),
    /// Unix microseconds, bound through `fromUnixTimestamp64Micro(?)`.
    DateTime64(i64),
}

impl QueryValue
{
    /// The SQL placeholder for this value.
    pub fn placeholder(&self) -> &'static str
    {
        match self {
            Self::DateTime(_) => "fromUnixTimestamp(?)",
            Self::DateTime64(_) => "fromUnixTimestamp64Micro(?)",
            _ => "?",
        }
    }
}

impl From<i32> for QueryValue
{
    fn from(value: i32) -> Self
    {
        Self::Int(value.into())
    }
}

impl From<i64> for QueryValue
{
    fn from(value: i64) -> Self
    {
        Self::Int(value)
    }
}

impl From<u32> for QueryValue
{
    fn from(value: u32) -> Self
    {
        Self::UInt(value.into())
    }
}

impl From<u64> for QueryValue
{
    fn from(value: u64) -> Self
    {
        Self::UInt(value)
    }
}

impl From<f64> for QueryValue
{
    fn from(value: f64) -> Self
    {
        Self::Float(value)
    }
}

impl From<bool> for QueryValue
{
    fn from(value: bool) -> Self
    {
        Self::Bool(value)
    }
}

impl From<&str> for QueryValue
{
    fn from(value: &str) -> Self
    {
        Self::String(value.to_string())
    }
}

impl From<String> for QueryValue
{
    fn from(value: String) -> Self
    {
        Self::String(value)
    }
}

/// A binary comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison
{
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

impl fmt::Display for Comparison
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result
    {
        f.write_str(match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Gt => ">",
            Self::Gte => ">=",
        })
    }
}

/// Quotes an identifier with backticks, escaping embedded backticks.
pub fn quote_identifier(name: &str) -> String
{
    format!("`{}`", name.replace('`', "\\`"))
}

/// Escapes `LIKE` metacharacters so the value matches literally.
fn escape_like(value: &str) -> String
{
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

/// Accumulates `WHERE` conditions joined with `AND`.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder
{
    conditions: Vec<String>,
    args: Vec<QueryValue>,
}

impl QueryBuilder
{
    pub fn new() -> Self
    {
        Self::default()
    }

    fn push(&mut self, condition: String, args: impl IntoIterator<Item = QueryValue>)
    {
        self.conditions.push(condition);
        self.args.extend(args);
    }

    fn placeholders(values: &[QueryValue]) -> String
    {
        values.iter().map(QueryValue::placeholder).collect::<Vec<_>>().join(", ")
    }

    /// `column op ?`
    pub fn add_condition(&mut self, column: &str, op: Comparison, value: impl Into<QueryValue>)
    {
        let value = value.into();
        let condition = format!("{} {} {}", quote_identifier(column), op, value.placeholder());
        self.push(condition, [value]);
    }

    /// `column BETWEEN ? AND ?`, or equality with `min` when there is no upper bound.
    pub fn add_between(&mut self, column: &str, min: impl Into<QueryValue>, max: Option<QueryValue>)
    {
        let min = min.into();
        match max {
            Some(max) => {
                let condition = format!(
                    "{} BETWEEN {} AND {}",
                    quote_identifier(column),
                    min.placeholder(),
                    max.placeholder()
                );
                self.push(condition, [min, max]);
            }
            None => self.add_condition(column, Comparison::Eq, min),
        }
    }

    /// `column IN (?, ...)`. An empty list matches nothing.
    pub fn add_in(&mut self, column: &str, values: Vec<QueryValue>)
    {
        if values.is_empty() {
            self.conditions.push("1 = 0".to_string());
            return;
        }
        let condition = format!("{} IN ({})", quote_identifier(column), Self::placeholders(&values));
        self.push(condition, values);
    }

    /// `column NOT IN (?, ...)`. An empty list adds no condition.
    pub fn add_not_in(&mut self, column: &str, values: Vec<QueryValue>)
    {
        if values.is_empty() {
            return;
        }
        let condition = format!("{} NOT IN ({})", quote_identifier(column), Self::placeholders(&values));
        self.push(condition, values);
    }

    /// `column LIKE ?` with a caller-supplied pattern.
    pub fn add_like(&mut self, column: &str, pattern: &str)
    {
        self.push(format!("{} LIKE ?", quote_identifier(column)), [QueryValue::from(pattern)]);
    }

    pub fn add_not_like(&mut self, column: &str, pattern: &str)
    {
        self.push(format!("{} NOT LIKE ?", quote_identifier(column)), [QueryValue::from(pattern)]);
    }

    pub fn add_contains(&mut self, column: &str, value: &str)
    {
        self.add_like(column, &format!("%{}%", escape_like(value)));
    }

    pub fn add_starts_with(&mut self, column: &str, value: &str)
    {
        self.add_like(column, &format!("{}%", escape_like(value)));
    }

    pub fn add_ends_with(&mut self, column: &str, value: &str)
    {
        self.add_like(column, &format!("%{}", escape_like(value)));
    }

    pub fn add_is_null(&mut self, column: &str)
    {
        self.conditions.push(format!("{} IS NULL", quote_identifier(column)));
    }

    pub fn add_is_not_null(&mut self, column: &str)
    {
        self.conditions.push(format!("{} IS NOT NULL", quote_identifier(column)));
    }

    /// `column[?] op ?` for map columns.
    pub fn add_map_key_condition(&mut self, column: &str, key: &str, op: Comparison, value: impl Into<QueryValue>)
    {
        let value = value.into();
        let condition = format!("{}[?] {} {}", quote_identifier(column), op, value.placeholder());
        self.push(condition, [QueryValue::from(key), value]);
    }

    pub fn add_map_contains(&mut self, column: &str, key: &str)
    {
        self.push(format!("mapContains({}, ?)", quote_identifier(column)), [QueryValue::from(key)]);
    }

    pub fn add_map_not_contains(&mut self, column: &str, key: &str)
    {
        self.push(format!("NOT mapContains({}, ?)", quote_identifier(column)), [QueryValue::from(key)]);
    }

    /// Matches maps holding at least one of `keys`.
    pub fn add_map_contains_any(&mut self, column: &str, keys: &[String])
    {
        let values: Vec<QueryValue> = keys.iter().map(|k| QueryValue::from(k.as_str())).collect();
        let condition = format!("hasAny(mapKeys({}), [{}])", quote_identifier(column), Self::placeholders(&values));
        self.push(condition, values);
    }

    /// Matches maps holding every one of `keys`.
    pub fn add_map_contains_all(&mut self, column: &str, keys: &[String])
    {
        let values: Vec<QueryValue> = keys.iter().map(|k| QueryValue::from(k.as_str())).collect();
        let condition = format!("hasAll(mapKeys({}), [{}])", quote_identifier(column), Self::placeholders(&values));
        self.push(condition, values);
    }

    pub fn add_array_has(&mut self, column: &str, value: impl Into<QueryValue>)
    {
        let value = value.into();
        let condition = format!("has({}, {})", quote_identifier(column), value.placeholder());
        self.push(condition, [value]);
    }

    pub fn add_array_has_all(&mut self, column: &str, values: Vec<QueryValue>)
    {
        let condition = format!("hasAll({}, [{}])", quote_identifier(column), Self::placeholders(&values));
        self.push(condition, values);
    }

    pub fn add_array_has_any(&mut self, column: &str, values: Vec<QueryValue>)
    {
        let condition = format!("hasAny({}, [{}])", quote_identifier(column), Self::placeholders(&values));
        self.push(condition, values);
    }

    /// `length(column) op ?`
    pub fn add_array_length(&mut self, column: &str, op: Comparison, length: u32)
    {
        let condition = format!("length({}) {} ?", quote_identifier(column), op);
        self.push(condition, [QueryValue::from(length)]);
    }

    pub fn add_array_is_empty(&mut self, column: &str)
    {
        self.conditions.push(format!("empty({})", quote_identifier(column)));
    }

    pub fn add_array_is_not_empty(&mut self, column: &str)
    {
        self.conditions.push(format!("notEmpty({})", quote_identifier(column)));
    }

    /// ` WHERE a AND b`, or an empty string without conditions.
    pub fn where_clause(&self) -> String
    {
        if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        }
    }

    pub fn args(&self) -> &[QueryValue]
    {
        &self.args
    }

    pub fn is_empty(&self) -> bool
    {
        self.conditions.is_empty()
    }
}

/// Options applied to the `FROM` clause.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions
{
    /// Qualifies the table as `` `database`.table ``.
    pub database: Option<String>,
    /// Appends `FINAL` to collapse unmerged parts.
    pub add_final: bool,
}

impl QueryOptions
{
    pub fn with_database(mut self, database: impl Into<String>) -> Self
    {
        self.database = Some(database.into());
        self
    }

    pub fn with_final(mut self) -> Self
    {
        self.add_final = true;
        self
    }
}

/// A query ready to execute: SQL text plus its positional arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery
{
    pub query: String,
    pub args: Vec<QueryValue>,
}

/// Plain identifiers are quoted; select expressions such as
/// ``toString(`x`) AS `x` `` are passed through.
fn select_item(column: &str) -> String
{
    if !column.is_empty() && column.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        quote_identifier(column)
    } else {
        column.to_string()
    }
}

/// Renders ``SELECT <columns> FROM [`db`.]table [FINAL][ WHERE ...][ ORDER BY ...][ LIMIT n[ OFFSET m]]``.
///
/// `order_by` is the body of the `ORDER BY` clause and is omitted when
/// empty. `OFFSET` is only rendered together with a non-zero `limit`.
pub fn build_parameterized_query<S: AsRef<str>>(
    table: &str,
    columns: &[S],
    qb: &QueryBuilder,
    order_by: &str,
    limit: u32,
    offset: u32,
    options: &QueryOptions,
) -> Result<SqlQuery, ProtoGenError>
{
    if columns.is_empty() {
        return Err(ProtoGenError::EmptyColumnList);
    }

    let mut from = match options.database.as_deref().filter(|d| !d.is_empty()) {
        Some(database) => format!("{}.{}", quote_identifier(database), table),
        None => table.to_string(),
    };
    if options.add_final {
        from.push_str(" FINAL");
    }

    let column_list = columns.iter().map(|c| select_item(c.as_ref())).collect::<Vec<_>>().join(", ");

    let mut query = format!("SELECT {} FROM {}", column_list, from);
    query.push_str(&qb.where_clause());

    let order_by = order_by.trim();
    if !order_by.is_empty() {
        query.push_str(" ORDER BY ");
        query.push_str(order_by);
    }

    if limit > 0 {
        query.push_str(&format!(" LIMIT {}", limit));
        if offset > 0 {
            query.push_str(&format!(" OFFSET {}", offset));
        }
    }

    Ok(SqlQuery {
        query,
        args: qb.args().to_vec(),
    })
}
