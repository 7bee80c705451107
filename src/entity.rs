//! Table-scoped facades over [`Database`].
//!
//! An [`Entity`] forwards every CRUD helper to its wrapper with the table name
//! already filled in. Tables known at compile time get a tag type:
//!
//! ```ignore
//! struct Users;
//! impl EntityKind for Users {
//!     const TABLE: &'static str = "users";
//! }
//!
//! let users = db.entity::<Users>();
//! let alice = users.find_one(&Criteria::new().eq("name", "alice")).await?;
//! ```

use crate::db::{Database, Driver, MySqlDriver};
use crate::error::{DbError, DbResult};
use crate::models::{Criteria, Fields, Row, SqlValue, WriteResult};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use tracing::debug;

/// Compile-time tag naming the table an entity type maps to.
pub trait EntityKind {
    const TABLE: &'static str;
}

/// CRUD helpers bound to one table.
#[derive(Debug)]
pub struct Entity<'db, D: Driver = MySqlDriver> {
    table: String,
    db: &'db Database<D>,
    cache: HashMap<String, JsonValue>,
}

impl<'db, D: Driver> Entity<'db, D> {
    pub fn new(db: &'db Database<D>, table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            db,
            cache: HashMap::new(),
        }
    }

    pub fn table_name(&self) -> &str {
        &self.table
    }

    pub fn database(&self) -> &'db Database<D> {
        self.db
    }

    pub async fn get(&self, id: impl Into<SqlValue>) -> DbResult<Option<Row>> {
        self.db.get(&self.table, id).await
    }

    pub async fn get_all(&self, order_by: Option<&str>) -> DbResult<Vec<Row>> {
        self.db.get_all(&self.table, order_by).await
    }

    pub async fn get_all_count(&self) -> DbResult<i64> {
        self.db.get_all_count(&self.table).await
    }

    pub async fn find(
        &self,
        criteria: &Criteria,
        limit: Option<u64>,
        order_by: Option<&str>,
    ) -> DbResult<Vec<Row>> {
        self.db.get_by(&self.table, criteria, limit, order_by).await
    }

    pub async fn find_one(&self, criteria: &Criteria) -> DbResult<Option<Row>> {
        let mut rows = self.find(criteria, Some(1), None).await?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.swap_remove(0))
        })
    }

    /// One column of the first matching row.
    pub async fn find_column(&self, criteria: &Criteria, column: &str) -> DbResult<JsonValue> {
        let mut row = self
            .find_one(criteria)
            .await?
            .ok_or_else(|| DbError::row_not_found(&self.table))?;
        row.remove(column).ok_or_else(|| {
            DbError::schema(
                format!("Column '{}' not present in '{}'", column, self.table),
                column,
            )
        })
    }

    pub async fn create(&self, rows: &[Fields]) -> DbResult<WriteResult> {
        self.db.insert(&self.table, rows).await
    }

    pub async fn update(&self, id: impl Into<SqlValue>, values: &Fields) -> DbResult<WriteResult> {
        self.db.update(&self.table, id, values).await
    }

    pub async fn update_by(&self, criteria: &Criteria, values: &Fields) -> DbResult<WriteResult> {
        self.db.update_by(&self.table, criteria, values).await
    }

    pub async fn delete(&self, id: impl Into<SqlValue>) -> DbResult<WriteResult> {
        self.db.delete(&self.table, id).await
    }

    pub async fn delete_by(&self, criteria: &Criteria) -> DbResult<WriteResult> {
        self.db.delete_by(&self.table, criteria).await
    }

    pub async fn exists(&self, id: impl Into<SqlValue>) -> DbResult<bool> {
        self.db.exists(&self.table, id).await
    }

    pub async fn exists_by(
        &self,
        criteria: &Criteria,
        exclude_id: Option<SqlValue>,
    ) -> DbResult<bool> {
        self.db.exists_by(&self.table, criteria, exclude_id).await
    }

    /// Set the `position` column of each `(id, position)` pair, one UPDATE
    /// per pair, in order. Stops at the first failure.
    ///
    /// Returns the number of pairs applied.
    pub async fn update_position_column_by_id<I, K, P>(&self, positions: I) -> DbResult<usize>
    where
        I: IntoIterator<Item = (K, P)>,
        K: Into<SqlValue>,
        P: Into<SqlValue>,
    {
        let mut updated = 0usize;
        for (id, position) in positions {
            let values = Fields::new().with("position", position.into());
            self.db.update(&self.table, id, &values).await?;
            updated += 1;
        }
        debug!(table = %self.table, updated, "Positions updated");
        Ok(updated)
    }

    pub fn save_cache(&mut self, key: impl Into<String>, value: JsonValue) {
        self.cache.insert(key.into(), value);
    }

    pub fn get_cache(&self, key: &str) -> Option<&JsonValue> {
        self.cache.get(key)
    }

    pub fn clear_cache(&mut self, key: &str) -> Option<JsonValue> {
        self.cache.remove(key)
    }

    pub fn escape_value(&self, value: impl Into<SqlValue>) -> String {
        self.db.escape_value(value)
    }

    pub fn escape_identifier(&self, name: &str) -> String {
        self.db.escape_identifier(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConnectionConfig;
    use serde_json::json;

    struct Users;

    impl EntityKind for Users {
        const TABLE: &'static str = "users";
    }

    fn db() -> Database {
        Database::new(ConnectionConfig::new("localhost", "u", "p", "app"))
    }

    #[test]
    fn test_entity_kind_table() {
        let db = db();
        assert_eq!(db.entity::<Users>().table_name(), "users");
        assert_eq!(db.table("orders").table_name(), "orders");
    }

    #[test]
    fn test_entity_cache() {
        let db = db();
        let mut users = db.entity::<Users>();
        assert!(users.get_cache("k").is_none());

        users.save_cache("k", json!({"a": 1}));
        assert_eq!(users.get_cache("k"), Some(&json!({"a": 1})));

        users.save_cache("k", json!(2));
        assert_eq!(users.clear_cache("k"), Some(json!(2)));
        assert!(users.get_cache("k").is_none());
    }

    #[test]
    fn test_entity_escaping() {
        let db = db();
        let users = db.entity::<Users>();
        assert_eq!(users.escape_value("value"), "'value'");
        assert_eq!(users.escape_identifier("value"), "`value`");
    }
}
