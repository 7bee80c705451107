//! Query-related data models.
//!
//! This module defines the values bound into SQL and the shapes returned from
//! every statement.

use crate::error::DbError;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use serde_json::Value as JsonValue;

/// A plain result row: column name to JSON value, in column order.
pub type Row = serde_json::Map<String, JsonValue>;

/// A value substituted into SQL text or bound to a prepared statement.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    /// NULL value
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    String(String),
    /// Binary data, rendered as a hex literal
    Bytes(Vec<u8>),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    /// Comma-separated list, e.g. for `IN (?)`
    List(Vec<SqlValue>),
}

impl SqlValue {
    /// Check if this value is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Unquoted text form, used when a value names an identifier.
    pub fn to_plain_string(&self) -> String {
        match self {
            Self::Null => "NULL".to_string(),
            Self::Bool(v) => v.to_string(),
            Self::Int(v) => v.to_string(),
            Self::UInt(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::String(v) => v.clone(),
            Self::Bytes(v) => String::from_utf8_lossy(v).into_owned(),
            Self::DateTime(v) => v.format("%Y-%m-%d %H:%M:%S").to_string(),
            Self::Date(v) => v.format("%Y-%m-%d").to_string(),
            Self::List(items) => items
                .iter()
                .map(Self::to_plain_string)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }
}

macro_rules! impl_from_int {
    ($variant:ident, $target:ty, $($t:ty),+) => {
        $(
            impl From<$t> for SqlValue {
                fn from(v: $t) -> Self {
                    SqlValue::$variant(v as $target)
                }
            }
        )+
    };
}

impl_from_int!(Int, i64, i8, i16, i32, i64);
impl_from_int!(UInt, u64, u8, u16, u32, u64, usize);

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<f32> for SqlValue {
    fn from(v: f32) -> Self {
        SqlValue::Float(v as f64)
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::String(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::String(v)
    }
}

impl From<&String> for SqlValue {
    fn from(v: &String) -> Self {
        SqlValue::String(v.clone())
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(v: Vec<u8>) -> Self {
        SqlValue::Bytes(v)
    }
}

impl From<NaiveDateTime> for SqlValue {
    fn from(v: NaiveDateTime) -> Self {
        SqlValue::DateTime(v)
    }
}

impl From<NaiveDate> for SqlValue {
    fn from(v: NaiveDate) -> Self {
        SqlValue::Date(v)
    }
}

impl From<Vec<SqlValue>> for SqlValue {
    fn from(v: Vec<SqlValue>) -> Self {
        SqlValue::List(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// JSON values map onto the closest SQL value. Objects are stored as JSON text.
impl From<JsonValue> for SqlValue {
    fn from(v: JsonValue) -> Self {
        match v {
            JsonValue::Null => SqlValue::Null,
            JsonValue::Bool(b) => SqlValue::Bool(b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    SqlValue::Int(i)
                } else if let Some(u) = n.as_u64() {
                    SqlValue::UInt(u)
                } else {
                    SqlValue::Float(n.as_f64().unwrap_or_default())
                }
            }
            JsonValue::String(s) => SqlValue::String(s),
            JsonValue::Array(items) => SqlValue::List(items.into_iter().map(Into::into).collect()),
            obj @ JsonValue::Object(_) => SqlValue::String(obj.to_string()),
        }
    }
}

impl From<&JsonValue> for SqlValue {
    fn from(v: &JsonValue) -> Self {
        v.clone().into()
    }
}

/// Result of one `query`/`execute` call.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryResult {
    /// The exact SQL text sent to the server (after placeholder substitution).
    pub sql: String,
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    /// Summed over every statement of a multi-statement batch.
    pub rows_affected: u64,
    /// Last non-zero auto-increment id reported by the batch.
    pub last_insert_id: Option<u64>,
}

impl QueryResult {
    /// First column of the first row.
    pub fn first_value(&self) -> Option<&JsonValue> {
        self.rows.first().and_then(|row| row.values().next())
    }

    pub fn into_write_result(self) -> WriteResult {
        WriteResult {
            sql: self.sql,
            rows_affected: self.rows_affected,
            last_insert_id: self.last_insert_id,
        }
    }
}

/// Result of an INSERT/UPDATE/DELETE helper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteResult {
    pub sql: String,
    pub rows_affected: u64,
    pub last_insert_id: Option<u64>,
}

/// How a `transaction()` call ended.
#[derive(Debug)]
pub enum TransactionOutcome {
    /// Every statement ran and COMMIT succeeded.
    Committed { statements: usize },
    /// A statement failed; the batch was rolled back.
    RolledBack {
        /// Index of the failing statement.
        failed_at: usize,
        error: DbError,
    },
}

impl TransactionOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, Self::Committed { .. })
    }

    /// The statement error that triggered the rollback, if any.
    pub fn error(&self) -> Option<&DbError> {
        match self {
            Self::Committed { .. } => None,
            Self::RolledBack { error, .. } => Some(error),
        }
    }
}
