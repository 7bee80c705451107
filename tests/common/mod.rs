//! Shared helpers for integration tests: a scripted driver that records every
//! statement it receives and answers from a closure.

#![allow(dead_code)]

use async_trait::async_trait;
use db_record::db::{Driver, DriverOutput};
use db_record::{ConnectionConfig, Database, DbResult, Row, SqlValue};
use serde_json::Value as JsonValue;
use std::sync::{Arc, Mutex};

/// One statement seen by the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub sql: String,
    /// `Some` for the prepared-statement path.
    pub params: Option<Vec<SqlValue>>,
}

/// Shared view of the statements a [`MockDriver`] received.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<Call>>>);

impl CallLog {
    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().unwrap().clone()
    }

    pub fn sql(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.sql).collect()
    }

    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn last(&self) -> Option<String> {
        self.sql().pop()
    }

    pub fn closed(&self) -> bool {
        self.sql().iter().any(|s| s == CLOSE_MARKER)
    }

    fn push(&self, sql: &str, params: Option<Vec<SqlValue>>) {
        self.0.lock().unwrap().push(Call {
            sql: sql.to_string(),
            params,
        });
    }
}

const CLOSE_MARKER: &str = "<close>";

type Responder = Box<dyn Fn(&str) -> DbResult<DriverOutput> + Send>;

pub struct MockDriver {
    log: CallLog,
    responder: Responder,
}

impl MockDriver {
    pub fn new<F>(responder: F) -> (Self, CallLog)
    where
        F: Fn(&str) -> DbResult<DriverOutput> + Send + 'static,
    {
        let log = CallLog::default();
        let driver = Self {
            log: log.clone(),
            responder: Box::new(responder),
        };
        (driver, log)
    }

    /// A driver answering every statement with an empty result.
    pub fn empty() -> (Self, CallLog) {
        Self::new(|_| Ok(DriverOutput::default()))
    }
}

#[async_trait]
impl Driver for MockDriver {
    async fn open(_config: &ConnectionConfig) -> DbResult<Self> {
        Ok(Self::empty().0)
    }

    async fn query(&mut self, sql: &str) -> DbResult<DriverOutput> {
        self.log.push(sql, None);
        (self.responder)(sql)
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<DriverOutput> {
        self.log.push(sql, Some(params.to_vec()));
        (self.responder)(sql)
    }

    async fn close(self) -> DbResult<()> {
        self.log.push(CLOSE_MARKER, None);
        Ok(())
    }
}

pub fn config() -> ConnectionConfig {
    ConnectionConfig::new("localhost", "tester", "secret", "app_test").with_log_errors(false)
}

/// A connected wrapper around a scripted driver.
pub fn database<F>(responder: F) -> (Database<MockDriver>, CallLog)
where
    F: Fn(&str) -> DbResult<DriverOutput> + Send + 'static,
{
    let (driver, log) = MockDriver::new(responder);
    (Database::with_driver(config(), driver), log)
}

/// Rows from a JSON array of objects.
pub fn rows(value: JsonValue) -> DriverOutput {
    let rows: Vec<Row> = value
        .as_array()
        .expect("rows() takes a JSON array")
        .iter()
        .map(|row| row.as_object().expect("rows must be objects").clone())
        .collect();
    DriverOutput::from_rows(rows)
}

/// A single-row, single-column result.
pub fn scalar(column: &str, value: JsonValue) -> DriverOutput {
    let mut row = Row::new();
    row.insert(column.to_string(), value);
    DriverOutput::from_rows(vec![row])
}
