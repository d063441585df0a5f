//! PostgreSQL persistence module.
//!
//! Provides connection pooling and embedded migrations for the audit log.

pub mod pool;

pub use pool::{PostgresPool, PostgresPoolError};
