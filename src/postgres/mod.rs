//! PostgreSQL persistence: connection pooling and health tracking.

pub mod pool;

pub use pool::{PostgresPool, PostgresPoolError};
