//! Database module: connection ownership, schema bootstrap and credential storage.
//!
//! Layout:
//! - `connection.rs`: `ConnectionManager` and the `ConnectionHandle` it hands out
//! - `models.rs`: Rust structs mirroring DB rows
//! - `schema.rs`: SQL DDL plus the self-healing `SchemaBootstrapper` (SQLite-first)
//! - `sqlite.rs`: queries against the `users` table

pub mod connection;
pub mod models;
pub mod schema;
pub mod sqlite;

pub use connection::{ConnectionHandle, ConnectionManager};
pub use models::{ColumnInfo, Credential};
pub use schema::{SchemaBootstrapper, SchemaState, UsersTableOutcome};
pub use sqlite::{SqlitePool, UsersStorage};

use crate::error::StoreFailure;
use std::future::Future;
use std::time::Duration;

/// Run one store round trip under a deadline.
pub(crate) async fn bounded<T, F>(limit: Duration, fut: F) -> Result<T, StoreFailure>
where
    F: Future<Output = Result<T, sqlx::Error>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(res) => res.map_err(StoreFailure::from),
        Err(_) => Err(StoreFailure::Timeout(limit)),
    }
}
