//! The connection wrapper.
//!
//! [`Database`] owns one driver session and layers SQL building, result
//! shaping, transactions and a schema-metadata cache on top of it. Every call
//! returns its own result; nothing is kept between calls except the session
//! and the cache.

use crate::db::driver::{Driver, DriverOutput};
use crate::db::escape;
use crate::db::mysql::MySqlDriver;
use crate::db::scalar::{interpret_bool, interpret_decimal, interpret_integer};
use crate::db::schema::{CacheKey, CachedSchema, SchemaCache, SchemaInspector, SchemaKind};
use crate::db::statement;
use crate::entity::{Entity, EntityKind};
use crate::error::{DbError, DbResult};
use crate::models::{
    ConnectionConfig, Criteria, Fields, QueryResult, Row, SqlValue, TransactionOutcome,
    WriteResult,
};
use serde_json::Value as JsonValue;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// A MySQL connection wrapper.
///
/// All methods take `&self`; calls on one wrapper are serialized on the
/// session lock.
pub struct Database<D = MySqlDriver> {
    config: ConnectionConfig,
    session: Mutex<Option<D>>,
    cache: SchemaCache,
}

impl<D> std::fmt::Debug for Database<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("target", &self.config.display_target())
            .finish_non_exhaustive()
    }
}

impl<D: Driver> Database<D> {
    /// Create a wrapper. No connection is made until [`connect`](Self::connect).
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            session: Mutex::new(None),
            cache: SchemaCache::new(),
        }
    }

    /// Create a wrapper around an already opened session.
    pub fn with_driver(config: ConnectionConfig, driver: D) -> Self {
        Self {
            config,
            session: Mutex::new(Some(driver)),
            cache: SchemaCache::new(),
        }
    }

    /// Create a wrapper and connect it.
    pub async fn open(config: ConnectionConfig) -> DbResult<Self> {
        let db = Self::new(config);
        db.connect().await?;
        Ok(db)
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Open the session. A no-op when already connected.
    pub async fn connect(&self) -> DbResult<()> {
        let mut session = self.session.lock().await;
        if session.is_some() {
            debug!(addr = %self.config.display_target(), "Already connected, reusing session");
            return Ok(());
        }
        *session = Some(D::open(&self.config).await?);
        Ok(())
    }

    /// End the session and drop cached schema metadata. A no-op when closed.
    pub async fn close(&self) -> DbResult<()> {
        let driver = self.session.lock().await.take();
        self.cache.clear().await;

        let Some(driver) = driver else {
            return Ok(());
        };
        driver.close().await?;
        info!(addr = %self.config.display_target(), "Connection closed");
        Ok(())
    }

    pub async fn is_connected(&self) -> bool {
        self.session.lock().await.is_some()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    pub fn user(&self) -> &str {
        &self.config.user
    }

    pub fn database_name(&self) -> &str {
        &self.config.database
    }

    // =========================================================================
    // Escaping
    // =========================================================================

    pub fn escape_value(&self, value: impl Into<SqlValue>) -> String {
        escape::escape_value(&value.into())
    }

    pub fn escape_identifier(&self, name: &str) -> String {
        escape::escape_identifier(name)
    }

    /// Substitute `??` and `?` placeholders client-side.
    pub fn format(&self, sql: &str, values: &[SqlValue]) -> String {
        escape::format(sql, values)
    }

    // =========================================================================
    // Raw execution
    // =========================================================================

    /// Format `sql` with `values` and run it over the text protocol.
    /// Multi-statement batches are allowed.
    pub async fn query(&self, sql: &str, values: &[SqlValue]) -> DbResult<QueryResult> {
        self.run(escape::format(sql, values)).await
    }

    /// Run one statement with `values` bound server-side.
    ///
    /// `??` identifier placeholders and list values are only supported by
    /// [`query`](Self::query). Placeholders are matched the way
    /// [`format`](Self::format) matches them, so `???` runs are ignored.
    pub async fn execute(&self, sql: &str, values: &[SqlValue]) -> DbResult<QueryResult> {
        if escape::has_identifier_placeholder(sql, values.len()) {
            return Err(DbError::invalid_input(
                "Identifier placeholders (??) require query(), not execute()",
            ));
        }
        if values.iter().any(|v| matches!(v, SqlValue::List(_))) {
            return Err(DbError::invalid_input(
                "List values require query(), not execute()",
            ));
        }

        let formatted = escape::format(sql, values);
        let mut session = self.session.lock().await;
        let driver = session.as_mut().ok_or(DbError::NotConnected)?;

        debug!(sql = %formatted, params = values.len(), "Executing prepared statement");
        match driver.execute(sql, values).await {
            Ok(output) => Ok(into_result(formatted, output)),
            Err(e) => {
                self.log_failure(&formatted, &e);
                Err(e)
            }
        }
    }

    async fn run(&self, sql: String) -> DbResult<QueryResult> {
        let mut session = self.session.lock().await;
        let driver = session.as_mut().ok_or(DbError::NotConnected)?;
        self.run_on(driver, sql).await
    }

    async fn run_on(&self, driver: &mut D, sql: String) -> DbResult<QueryResult> {
        debug!(sql = %sql, "Executing statement");
        match driver.query(&sql).await {
            Ok(output) => Ok(into_result(sql, output)),
            Err(e) => {
                self.log_failure(&sql, &e);
                Err(e)
            }
        }
    }

    fn log_failure(&self, sql: &str, err: &DbError) {
        if self.config.log_errors {
            error!(sql = %sql, error = %err, "Statement failed");
        }
    }

    // =========================================================================
    // CRUD helpers
    // =========================================================================

    /// Rows of `table` matching every criteria pair.
    pub async fn get_by(
        &self,
        table: &str,
        criteria: &Criteria,
        limit: Option<u64>,
        order_by: Option<&str>,
    ) -> DbResult<Vec<Row>> {
        let sql = statement::select(table, criteria, limit, order_by);
        Ok(self.run(sql).await?.rows)
    }

    /// The row with the given `id`.
    pub async fn get(&self, table: &str, id: impl Into<SqlValue>) -> DbResult<Option<Row>> {
        let criteria = id_criteria(id);
        let mut rows = self.get_by(table, &criteria, Some(1), None).await?;
        Ok(if rows.is_empty() { None } else { Some(rows.swap_remove(0)) })
    }

    pub async fn get_all(&self, table: &str, order_by: Option<&str>) -> DbResult<Vec<Row>> {
        self.get_by(table, &Criteria::new(), None, order_by).await
    }

    /// Number of rows in `table`.
    pub async fn get_all_count(&self, table: &str) -> DbResult<i64> {
        Ok(self.integer(&statement::count_all(table)).await?.unwrap_or(0))
    }

    /// Insert one or more rows as a single batch.
    pub async fn insert(&self, table: &str, rows: &[Fields]) -> DbResult<WriteResult> {
        let sql = statement::insert(table, rows)?;
        Ok(self.run(sql).await?.into_write_result())
    }

    pub async fn insert_one(&self, table: &str, row: &Fields) -> DbResult<WriteResult> {
        self.insert(table, std::slice::from_ref(row)).await
    }

    pub async fn update(
        &self,
        table: &str,
        id: impl Into<SqlValue>,
        values: &Fields,
    ) -> DbResult<WriteResult> {
        self.update_by(table, &id_criteria(id), values).await
    }

    pub async fn update_by(
        &self,
        table: &str,
        criteria: &Criteria,
        values: &Fields,
    ) -> DbResult<WriteResult> {
        let sql = statement::update(table, criteria, values)?;
        Ok(self.run(sql).await?.into_write_result())
    }

    pub async fn delete(&self, table: &str, id: impl Into<SqlValue>) -> DbResult<WriteResult> {
        self.delete_by(table, &id_criteria(id)).await
    }

    pub async fn delete_by(&self, table: &str, criteria: &Criteria) -> DbResult<WriteResult> {
        let sql = statement::delete(table, criteria)?;
        Ok(self.run(sql).await?.into_write_result())
    }

    pub async fn exists(&self, table: &str, id: impl Into<SqlValue>) -> DbResult<bool> {
        self.exists_by(table, &id_criteria(id), None).await
    }

    /// True when a row matches `criteria`, ignoring the row whose id is
    /// `exclude_id`.
    pub async fn exists_by(
        &self,
        table: &str,
        criteria: &Criteria,
        exclude_id: Option<SqlValue>,
    ) -> DbResult<bool> {
        let sql = statement::exists(table, criteria, exclude_id.as_ref())?;
        Ok(self.integer(&sql).await?.unwrap_or(0) > 0)
    }

    // =========================================================================
    // Result shaping
    // =========================================================================

    /// One column of every row; the first column when `column` is `None`.
    pub async fn array(&self, sql: &str, column: Option<&str>) -> DbResult<Vec<JsonValue>> {
        let result = self.run(sql.to_string()).await?;
        let Some(column) = column else {
            return Ok(result
                .rows
                .into_iter()
                .filter_map(|row| row.into_iter().next().map(|(_, v)| v))
                .collect());
        };

        if !result.rows.is_empty() && !result.columns.iter().any(|c| c == column) {
            return Err(DbError::schema(
                format!("Column '{}' not present in result", column),
                column,
            ));
        }

        Ok(result
            .rows
            .into_iter()
            .map(|mut row| row.remove(column).unwrap_or(JsonValue::Null))
            .collect())
    }

    /// Map of `key` column to `value` column. Later duplicates overwrite
    /// earlier ones.
    pub async fn kv_object(&self, sql: &str, key: &str, value: &str) -> DbResult<Row> {
        let result = self.run(sql.to_string()).await?;
        let mut out = Row::new();
        for mut row in result.rows {
            let k = row
                .remove(key)
                .ok_or_else(|| DbError::schema(format!("Column '{}' not present in result", key), key))?;
            let v = row.remove(value).ok_or_else(|| {
                DbError::schema(format!("Column '{}' not present in result", value), value)
            })?;
            out.insert(json_key(k), v);
        }
        Ok(out)
    }

    /// First row, if any.
    pub async fn row(&self, sql: &str) -> DbResult<Option<Row>> {
        let mut result = self.run(sql.to_string()).await?;
        Ok(if result.rows.is_empty() {
            None
        } else {
            Some(result.rows.swap_remove(0))
        })
    }

    /// First column of the first row. SQL NULL is `None`.
    pub async fn scalar(&self, sql: &str) -> DbResult<Option<JsonValue>> {
        let result = self.run(sql.to_string()).await?;
        Ok(result.first_value().filter(|v| !v.is_null()).cloned())
    }

    pub async fn bool(&self, sql: &str) -> DbResult<Option<bool>> {
        Ok(self.scalar(sql).await?.as_ref().and_then(interpret_bool))
    }

    pub async fn integer(&self, sql: &str) -> DbResult<Option<i64>> {
        match self.scalar(sql).await? {
            Some(v) => interpret_integer(&v),
            None => Ok(None),
        }
    }

    pub async fn decimal(&self, sql: &str, places: u32) -> DbResult<Option<f64>> {
        match self.scalar(sql).await? {
            Some(v) => interpret_decimal(&v, places),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Transactions and DDL
    // =========================================================================

    /// Run `statements` inside one transaction.
    ///
    /// A failing statement rolls the batch back and is reported as
    /// [`TransactionOutcome::RolledBack`]. Failures of `START TRANSACTION` or
    /// `COMMIT` are returned as errors.
    pub async fn transaction<S: AsRef<str>>(
        &self,
        statements: &[S],
    ) -> DbResult<TransactionOutcome> {
        let mut session = self.session.lock().await;
        let driver = session.as_mut().ok_or(DbError::NotConnected)?;

        self.run_on(driver, "START TRANSACTION".to_string()).await?;

        for (idx, stmt) in statements.iter().enumerate() {
            if let Err(error) = self.run_on(driver, stmt.as_ref().to_string()).await {
                rollback(driver).await;
                return Ok(TransactionOutcome::RolledBack {
                    failed_at: idx,
                    error,
                });
            }
        }

        if let Err(e) = self.run_on(driver, "COMMIT".to_string()).await {
            rollback(driver).await;
            return Err(e);
        }

        debug!(statements = statements.len(), "Transaction committed");
        Ok(TransactionOutcome::Committed {
            statements: statements.len(),
        })
    }

    /// Create `to` with the structure and rows of `from`.
    pub async fn duplicate_table(&self, from: &str, to: &str) -> DbResult<bool> {
        self.run(statement::duplicate_table(from, to)).await?;
        Ok(true)
    }

    pub async fn truncate(&self, table: &str) -> DbResult<bool> {
        self.run(statement::truncate(table)).await?;
        Ok(true)
    }

    pub async fn drop(&self, table: &str) -> DbResult<bool> {
        self.run(statement::drop(table)).await?;
        self.cache.clear_table(table).await;
        Ok(true)
    }

    // =========================================================================
    // Session variables
    // =========================================================================

    pub async fn set_env_var(&self, name: &str, value: impl Into<SqlValue>) -> DbResult<bool> {
        self.run(statement::set_env_var(name, &value.into())?).await?;
        Ok(true)
    }

    pub async fn get_env_var(&self, name: &str) -> DbResult<Option<JsonValue>> {
        self.scalar(&statement::get_env_var(name)?).await
    }

    // =========================================================================
    // Schema metadata
    // =========================================================================

    /// True when `table` exists in the configured database.
    pub async fn table_exists(&self, table: &str) -> DbResult<bool> {
        let sql = SchemaInspector::table_exists_sql(&self.config.database, table);
        Ok(self.integer(&sql).await?.unwrap_or(0) > 0)
    }

    /// Column names of `table` in ordinal order, minus `ignore`.
    pub async fn get_table_columns(&self, table: &str, ignore: &[&str]) -> DbResult<Vec<String>> {
        let key = CacheKey::new(SchemaKind::Columns, table, ignore);
        if let Some(CachedSchema::Columns(columns)) = self.cache.get(&key).await {
            return Ok(columns);
        }

        let sql = SchemaInspector::columns_sql(&self.config.database, table, ignore);
        let columns: Vec<String> = self
            .array(&sql, Some("COLUMN_NAME"))
            .await?
            .into_iter()
            .map(json_key)
            .collect();

        self.cache
            .insert(key, CachedSchema::Columns(columns.clone()))
            .await;
        Ok(columns)
    }

    /// `COLUMN_NAME` to `COLUMN_DEFAULT`, ordered by column name.
    pub async fn get_table_column_default_values(
        &self,
        table: &str,
        ignore: &[&str],
    ) -> DbResult<Row> {
        let sql = SchemaInspector::default_values_sql(&self.config.database, table, ignore);
        self.cached_map(SchemaKind::DefaultValues, table, ignore, &sql, "COLUMN_DEFAULT")
            .await
    }

    /// `COLUMN_NAME` to `COLUMN_TYPE` (e.g. `int(11) unsigned`), ordered by
    /// column name.
    pub async fn get_table_column_data_types(&self, table: &str, ignore: &[&str]) -> DbResult<Row> {
        let sql = SchemaInspector::data_types_sql(&self.config.database, table, ignore);
        self.cached_map(SchemaKind::DataTypes, table, ignore, &sql, "COLUMN_TYPE")
            .await
    }

    async fn cached_map(
        &self,
        kind: SchemaKind,
        table: &str,
        ignore: &[&str],
        sql: &str,
        value_column: &str,
    ) -> DbResult<Row> {
        let key = CacheKey::new(kind, table, ignore);
        if let Some(CachedSchema::Map(map)) = self.cache.get(&key).await {
            return Ok(map);
        }

        let map = self.kv_object(sql, "COLUMN_NAME", value_column).await?;
        self.cache.insert(key, CachedSchema::Map(map.clone())).await;
        Ok(map)
    }

    /// Drop cached metadata for `table`. Returns the number of entries removed.
    pub async fn clear_cache(&self, table: &str) -> usize {
        let removed = self.cache.clear_table(table).await;
        debug!(table = %table, removed, "Schema cache cleared");
        removed
    }

    pub async fn clear_all_cache(&self) {
        self.cache.clear().await;
    }

    /// Number of cached metadata entries.
    pub async fn cached_entries(&self) -> usize {
        self.cache.len().await
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Facade for the table tagged by `K`.
    pub fn entity<K: EntityKind>(&self) -> Entity<'_, D> {
        Entity::new(self, K::TABLE)
    }

    /// Facade for an arbitrary table.
    pub fn table(&self, name: impl Into<String>) -> Entity<'_, D> {
        Entity::new(self, name)
    }
}

fn into_result(sql: String, output: DriverOutput) -> QueryResult {
    QueryResult {
        sql,
        columns: output.columns,
        rows: output.rows,
        rows_affected: output.rows_affected,
        last_insert_id: output.last_insert_id,
    }
}

fn id_criteria(id: impl Into<SqlValue>) -> Criteria {
    Criteria::new().eq("id", id.into())
}

/// Map keys are strings; other JSON values use their JSON text.
fn json_key(value: JsonValue) -> String {
    match value {
        JsonValue::String(s) => s,
        other => other.to_string(),
    }
}

async fn rollback<D: Driver>(driver: &mut D) {
    debug!("Rolling back transaction");
    if let Err(e) = driver.query("ROLLBACK").await {
        warn!(error = %e, "Rollback failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_key() {
        assert_eq!(json_key(json!("id")), "id");
        assert_eq!(json_key(json!(7)), "7");
        assert_eq!(json_key(JsonValue::Null), "null");
    }

    #[test]
    fn test_into_result_keeps_sql() {
        let output = DriverOutput::from_write(2, Some(9));
        let result = into_result("DELETE FROM `t`".to_string(), output);
        assert_eq!(result.sql, "DELETE FROM `t`");
        assert_eq!(result.rows_affected, 2);
        assert_eq!(result.last_insert_id, Some(9));
    }

    #[tokio::test]
    async fn test_calls_before_connect_fail() {
        let db: Database = Database::new(ConnectionConfig::new("localhost", "u", "p", "d"));
        assert!(!db.is_connected().await);
        assert!(matches!(
            db.query("SELECT 1", &[]).await,
            Err(DbError::NotConnected)
        ));
        assert!(db.close().await.is_ok());
        assert_eq!(db.database_name(), "d");
        assert_eq!(db.port(), 3306);
    }
}
