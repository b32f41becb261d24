//! String-level parsing of ClickHouse catalog metadata.
//!
//! Everything here works on trusted catalog output, so malformed input fails
//! soft: a missing closing parenthesis leaves the partially trimmed string in
//! place instead of producing an error.

const NULLABLE_PREFIX: &str = "Nullable(";
const ARRAY_PREFIX: &str = "Array(";
const MAP_PREFIX: &str = "Map(";
const DISTRIBUTED_PREFIX: &str = "Distributed(";

/// The wrapper layers and innermost type of a declared column type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeShape
{
    /// Type name without parameters, e.g. `DateTime64` for `DateTime64(3)`.
    pub base: String,
    /// The type string left after removing the Nullable and Array layers,
    /// parameters included, e.g. `Map(String, UInt64)`.
    pub unwrapped: String,
    pub nullable: bool,
    pub array: bool,
}

/// Decomposes a declared type into its wrapper flags and base type.
///
/// One `Nullable(...)` layer is removed, then one `Array(...)` layer. A
/// `Nullable(...)` directly inside the array counts as the nullable layer
/// when the outer type was not already nullable, so `Array(Nullable(T))`
/// and `Nullable(Array(T))` yield the same shape.
pub fn parse_type(declared: &str) -> TypeShape
{
    let mut rest = declared.trim();
    let mut nullable = false;
    let mut array = false;

    if let Some(inner) = strip_wrapper(rest, NULLABLE_PREFIX) {
        nullable = true;
        rest = inner;
    }

    if let Some(inner) = strip_wrapper(rest, ARRAY_PREFIX) {
        array = true;
        rest = inner;

        if !nullable {
            if let Some(inner) = strip_wrapper(rest, NULLABLE_PREFIX) {
                nullable = true;
                rest = inner;
            }
        }
    }

    TypeShape {
        base: type_name(rest).to_string(),
        unwrapped: rest.to_string(),
        nullable,
        array,
    }
}

/// Returns the innermost type name of a declared type.
pub fn parse_base_type(declared: &str) -> String
{
    parse_type(declared).base
}

/// Strips `prefix` and, when present, the trailing `)`.
fn strip_wrapper<'a>(value: &'a str, prefix: &str) -> Option<&'a str>
{
    let inner = value.strip_prefix(prefix)?;
    Some(inner.strip_suffix(')').unwrap_or(inner).trim())
}

/// The part of a type before its parameter list.
pub fn type_name(value: &str) -> &str
{
    match value.find('(') {
        Some(idx) if idx > 0 => value[..idx].trim(),
        _ => value,
    }
}

/// Removes one `Nullable(...)` layer, if present.
pub fn strip_nullable(value: &str) -> &str
{
    strip_wrapper(value.trim(), NULLABLE_PREFIX).unwrap_or(value)
}

/// Extracts the argument of a single-parameter wrapper such as
/// `LowCardinality(String)`. Returns the input unchanged when it has no
/// well-formed parameter list.
pub fn inner_type(wrapped: &str) -> &str
{
    let start = wrapped.find('(');
    let end = wrapped.rfind(')');

    match (start, end) {
        (Some(start), Some(end)) if start > 0 && end > start => wrapped[start + 1..end].trim(),
        _ => wrapped,
    }
}

/// Splits `Map(K, V)` into its key and value types.
///
/// One `Nullable(...)` layer is removed from the value, since protobuf map
/// values cannot carry their own null marker. Returns `None` for anything
/// that is not a map or lacks a top-level comma.
pub fn parse_map_type(map_type: &str) -> Option<(String, String)>
{
    let inner = map_type.trim().strip_prefix(MAP_PREFIX)?.strip_suffix(')')?;

    let mut depth = 0i32;
    let mut comma = None;
    for (idx, ch) in inner.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                comma = Some(idx);
                break;
            }
            _ => {}
        }
    }

    let comma = comma?;
    let key = inner[..comma].trim();
    let mut value = inner[comma + 1..].trim();

    if let Some(stripped) = value.strip_prefix(NULLABLE_PREFIX).and_then(|v| v.strip_suffix(')')) {
        value = stripped.trim();
    }

    if key.is_empty() || value.is_empty() {
        return None;
    }

    Some((key.to_string(), value.to_string()))
}

/// Parses a table's `sorting_key` expression into bare column names.
///
/// Handles `a, b`, `(a, b)`, `a ASC, b DESC` and parenthesized entries;
/// commas nested inside function calls do not split.
pub fn parse_sorting_key(sorting_key: &str) -> Vec<String>
{
    let mut expr = sorting_key.trim();
    if let Some(inner) = strip_enclosing_parens(expr) {
        expr = inner;
    }

    split_top_level(expr)
        .into_iter()
        .filter_map(|part| {
            let part = part.trim();
            let part = part
                .strip_suffix(" ASC")
                .or_else(|| part.strip_suffix(" DESC"))
                .unwrap_or(part)
                .trim();
            let part = strip_enclosing_parens(part).unwrap_or(part).trim();

            if part.is_empty() {
                None
            } else {
                Some(part.to_string())
            }
        })
        .collect()
}

/// Removes one pair of parentheses when the first one closes at the very end.
fn strip_enclosing_parens(value: &str) -> Option<&str>
{
    if !value.starts_with('(') || !value.ends_with(')') {
        return None;
    }

    let mut depth = 0i32;
    for (idx, ch) in value.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 && idx != value.len() - 1 {
                    return None;
                }
            }
            _ => {}
        }
    }

    Some(value[1..value.len() - 1].trim())
}

/// Splits on commas that sit outside parentheses and quoted literals.
///
/// Parts are returned untrimmed. Both `'` and `"` open a literal which is
/// only closed by the same quote character.
pub fn split_top_level(args: &str) -> Vec<String>
{
    let mut result = Vec::new();
    let mut current = String::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;

    for ch in args.chars() {
        match ch {
            '\'' | '"' => {
                match quote {
                    None => quote = Some(ch),
                    Some(open) if open == ch => quote = None,
                    Some(_) => {}
                }
                current.push(ch);
            }
            '(' if quote.is_none() => {
                depth += 1;
                current.push(ch);
            }
            ')' if quote.is_none() => {
                depth -= 1;
                current.push(ch);
            }
            ',' if quote.is_none() && depth == 0 => {
                result.push(std::mem::take(&mut current));
            }
            _ => current.push(ch),
        }
    }

    if !current.is_empty() {
        result.push(current);
    }

    result
}

/// The physical table behind a `Distributed` proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributedTarget
{
    pub database: String,
    pub table: String,
}

/// Parses `Distributed(cluster, database, table[, sharding_key])` from a
/// table's `engine_full`.
pub fn distributed_target(engine_full: &str) -> Option<DistributedTarget>
{
    let content = engine_full.trim().strip_prefix(DISTRIBUTED_PREFIX)?;
    let content = content.strip_suffix(')').unwrap_or(content);

    let parts = split_top_level(content);
    if parts.len() < 3 {
        return None;
    }

    let unquote = |s: &str| s.trim_matches(|c| c == ' ' || c == '\'' || c == '"').to_string();

    Some(DistributedTarget {
        database: unquote(&parts[1]),
        table: unquote(&parts[2]),
    })
}
