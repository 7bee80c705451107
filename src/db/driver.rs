//! The driver boundary.
//!
//! [`Database`](crate::db::Database) never talks to the network itself; it
//! hands finished SQL to a [`Driver`] session and gets plain rows back.
//! [`MySqlDriver`](crate::db::MySqlDriver) is the production implementation.

use crate::error::DbResult;
use crate::models::{ConnectionConfig, Row, SqlValue};
use async_trait::async_trait;

/// What a driver reports back for one SQL submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverOutput {
    /// Column names of the first result set with rows.
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    pub rows_affected: u64,
    pub last_insert_id: Option<u64>,
}

impl DriverOutput {
    /// A result with rows and no write counters.
    pub fn from_rows(rows: Vec<Row>) -> Self {
        let columns = rows
            .first()
            .map(|row| row.keys().cloned().collect())
            .unwrap_or_default();
        Self {
            columns,
            rows,
            ..Default::default()
        }
    }

    /// A write result without rows.
    pub fn from_write(rows_affected: u64, last_insert_id: Option<u64>) -> Self {
        Self {
            rows_affected,
            last_insert_id,
            ..Default::default()
        }
    }
}

/// One open database session.
#[async_trait]
pub trait Driver: Send + Sized + 'static {
    /// Establish a session for `config`.
    async fn open(config: &ConnectionConfig) -> DbResult<Self>;

    /// Run SQL text over the text protocol. Multi-statement batches are allowed.
    async fn query(&mut self, sql: &str) -> DbResult<DriverOutput>;

    /// Run one statement over the prepared-statement path, binding `params`
    /// to its `?` placeholders.
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<DriverOutput>;

    /// End the session.
    async fn close(self) -> DbResult<()>;
}
