//! Database access layer.
//!
//! This module provides:
//! - The connection wrapper ([`Database`])
//! - The driver boundary and its MySQL implementation
//! - MySQL quoting and placeholder formatting
//! - SQL builders for the CRUD helpers
//! - Schema introspection and its cache
//! - Row decoding and scalar interpretation

pub mod database;
pub mod driver;
pub mod escape;
pub mod mysql;
pub mod scalar;
pub mod schema;
pub mod statement;
pub mod types;

pub use database::Database;
pub use driver::{Driver, DriverOutput};
pub use escape::{escape_identifier, escape_value, format};
pub use mysql::MySqlDriver;
pub use schema::{CacheKey, SchemaInspector, SchemaKind};
