//! Primary-key reconciliation across a table and its projections.
//!
//! Every leading `ORDER BY` column is a cheap exact-match lookup path. The
//! table's own leading column comes first, followed by each projection's
//! leading column that has not been seen yet.

use serde::Serialize;

use crate::types::Table;

/// Name of the required group shared by all keys of an OR-group.
pub const REQUIRED_GROUP: &str = "primary_key";

/// How lookup requests must supply the key set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum PrimaryKeyMode
{
    /// A single key that must always be present.
    Required,
    /// Each key is optional, but at least one must be present.
    OrGroup,
}

/// Where a key was discovered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum KeySource
{
    Table,
    Projection(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrimaryKey
{
    pub column: String,
    pub source: KeySource,
}

impl PrimaryKey
{
    /// The projection that contributed this key, if any.
    pub fn projection(&self) -> Option<&str>
    {
        match &self.source {
            KeySource::Projection(name) => Some(name),
            KeySource::Table => None,
        }
    }
}

/// The reconciled lookup keys of a table, in discovery order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrimaryKeySet
{
    pub keys: Vec<PrimaryKey>,
    pub mode: PrimaryKeyMode,
}

impl PrimaryKeySet
{
    /// The canonical key: the table's own leading column when present,
    /// otherwise the first projection key.
    pub fn canonical(&self) -> Option<&PrimaryKey>
    {
        self.keys.first()
    }

    pub fn columns(&self) -> impl Iterator<Item = &str>
    {
        self.keys.iter().map(|k| k.column.as_str())
    }

    pub fn contains(&self, column: &str) -> bool
    {
        self.keys.iter().any(|k| k.column == column)
    }

    pub fn get(&self, column: &str) -> Option<&PrimaryKey>
    {
        self.keys.iter().find(|k| k.column == column)
    }

    pub fn len(&self) -> usize
    {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool
    {
        self.keys.is_empty()
    }

    /// Whether request handlers must check each key for presence before use.
    pub fn is_nil_guarded(&self) -> bool
    {
        self.mode == PrimaryKeyMode::OrGroup
    }

    /// Keeps the keys accepted by `keep` and recomputes the mode. Returns
    /// `None` when no key remains.
    pub fn retain(mut self, keep: impl Fn(&PrimaryKey) -> bool) -> Option<Self>
    {
        self.keys.retain(|key| keep(key));
        self.mode = mode_for(self.keys.len())?;
        Some(self)
    }

    /// The validation text for an OR-group, names sorted lexicographically.
    /// `None` in `Required` mode.
    pub fn validation_message(&self) -> Option<String>
    {
        if self.mode != PrimaryKeyMode::OrGroup {
            return None;
        }

        let mut names: Vec<&str> = self.columns().collect();
        names.sort_unstable();
        Some(format!("at least one of {} is required", names.join(", ")))
    }
}

/// Collects the lookup keys of `table`. Returns `None` when neither the
/// table nor any projection has an ordering key.
pub fn reconcile(table: &Table) -> Option<PrimaryKeySet>
{
    let mut keys: Vec<PrimaryKey> = Vec::new();

    if let Some(column) = table.leading_column() {
        keys.push(PrimaryKey {
            column: column.to_string(),
            source: KeySource::Table,
        });
    }

    for projection in &table.projections {
        let Some(column) = projection.leading_column() else {
            continue;
        };
        if keys.iter().any(|k| k.column == column) {
            continue;
        }
        keys.push(PrimaryKey {
            column: column.to_string(),
            source: KeySource::Projection(projection.name.clone()),
        });
    }

    let mode = mode_for(keys.len())?;
    Some(PrimaryKeySet { keys, mode })
}

fn mode_for(count: usize) -> Option<PrimaryKeyMode>
{
    match count {
        0 => None,
        1 => Some(PrimaryKeyMode::Required),
        _ => Some(PrimaryKeyMode::OrGroup),
    }
}
