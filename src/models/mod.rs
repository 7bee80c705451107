//! Data models for db-record.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod criteria;
pub mod query;

// Re-export commonly used types
pub use connection::{
    ConnectionConfig, ConnectionConfigError, DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_PORT,
    TlsMaterial, TlsPreset,
};
pub use criteria::{Criteria, Fields, Operand};
pub use query::{QueryResult, Row, SqlValue, TransactionOutcome, WriteResult};
