//! db-record library
//!
//! A lightweight MySQL access layer: a connection wrapper that turns simple
//! CRUD intents into SQL, runs them over a single driver session and shapes
//! the results into plain JSON rows, plus table-scoped entities built on top.

pub mod config;
pub mod db;
pub mod entity;
pub mod error;
pub mod models;

pub use db::{Database, Driver, MySqlDriver};
pub use entity::{Entity, EntityKind};
pub use error::{DbError, DbResult};
pub use models::{ConnectionConfig, Criteria, Fields, Operand, QueryResult, Row, SqlValue};
