//! Schema introspection module.
//!
//! Column metadata comes from `INFORMATION_SCHEMA` and is cached per
//! wrapper, keyed by table and ignore set.
//!
//! # Architecture
//!
//! SQL templates live in the `queries` submodule. [`SchemaInspector`] fills
//! them in with escaped values; [`SchemaCache`] holds the decoded results.

use crate::db::escape::format;
use crate::models::{Row, SqlValue};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// Which piece of column metadata a cache entry holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SchemaKind {
    Columns,
    DefaultValues,
    DataTypes,
}

impl std::fmt::Display for SchemaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Columns => "columns",
            Self::DefaultValues => "default-values",
            Self::DataTypes => "data-types",
        };
        f.write_str(name)
    }
}

/// Cache key: metadata kind, table and the sorted, de-duplicated ignore set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub kind: SchemaKind,
    pub table: String,
    pub ignore: Vec<String>,
}

impl CacheKey {
    pub fn new(kind: SchemaKind, table: &str, ignore: &[&str]) -> Self {
        let mut ignore: Vec<String> = ignore.iter().map(|c| c.to_string()).collect();
        ignore.sort();
        ignore.dedup();
        Self {
            kind,
            table: table.to_string(),
            ignore,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CachedSchema {
    Columns(Vec<String>),
    Map(Row),
}

/// Per-wrapper metadata cache.
#[derive(Debug, Default)]
pub struct SchemaCache {
    entries: RwLock<HashMap<CacheKey, CachedSchema>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, key: &CacheKey) -> Option<CachedSchema> {
        let entries = self.entries.read().await;
        let hit = entries.get(key).cloned();
        debug!(
            kind = %key.kind,
            table = %key.table,
            hit = hit.is_some(),
            "Schema cache lookup"
        );
        hit
    }

    pub async fn insert(&self, key: CacheKey, value: CachedSchema) {
        self.entries.write().await.insert(key, value);
    }

    /// Drop every entry for `table`, whatever its kind or ignore set.
    /// Returns the number of entries removed.
    pub async fn clear_table(&self, table: &str) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| key.table != table);
        before - entries.len()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Builds the introspection statements.
pub struct SchemaInspector;

impl SchemaInspector {
    /// Count of base tables or views named `table` in `database`.
    pub fn table_exists_sql(database: &str, table: &str) -> String {
        format(queries::TABLE_EXISTS, &[database.into(), table.into()])
    }

    /// Column names in ordinal order.
    pub fn columns_sql(database: &str, table: &str, ignore: &[&str]) -> String {
        Self::build(queries::COLUMNS, database, table, ignore, queries::ORDER_BY_POSITION)
    }

    /// `COLUMN_NAME` / `COLUMN_DEFAULT` pairs.
    pub fn default_values_sql(database: &str, table: &str, ignore: &[&str]) -> String {
        Self::build(queries::DEFAULT_VALUES, database, table, ignore, queries::ORDER_BY_NAME)
    }

    /// `COLUMN_NAME` / `COLUMN_TYPE` pairs.
    pub fn data_types_sql(database: &str, table: &str, ignore: &[&str]) -> String {
        Self::build(queries::DATA_TYPES, database, table, ignore, queries::ORDER_BY_NAME)
    }

    fn build(select: &str, database: &str, table: &str, ignore: &[&str], order: &str) -> String {
        let mut sql = format(select, &[database.into(), table.into()]);
        if !ignore.is_empty() {
            let list = SqlValue::List(ignore.iter().map(|c| SqlValue::from(*c)).collect());
            sql.push_str(&format(queries::IGNORE_COLUMNS, &[list]));
        }
        sql.push_str(order);
        sql
    }
}

mod queries {
    pub const TABLE_EXISTS: &str = "SELECT COUNT(*) AS count FROM INFORMATION_SCHEMA.TABLES \
        WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?";

    pub const COLUMNS: &str = "SELECT COLUMN_NAME FROM INFORMATION_SCHEMA.COLUMNS \
        WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?";

    pub const DEFAULT_VALUES: &str = "SELECT COLUMN_NAME, COLUMN_TYPE, IS_NULLABLE, \
        COLUMN_DEFAULT, COLUMN_KEY, EXTRA FROM INFORMATION_SCHEMA.COLUMNS \
        WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?";

    pub const DATA_TYPES: &str = "SELECT COLUMN_NAME, COLUMN_TYPE FROM INFORMATION_SCHEMA.COLUMNS \
        WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?";

    pub const IGNORE_COLUMNS: &str = " AND COLUMN_NAME NOT IN (?)";

    pub const ORDER_BY_POSITION: &str = " ORDER BY ORDINAL_POSITION ASC";

    pub const ORDER_BY_NAME: &str = " ORDER BY COLUMN_NAME ASC";
}
