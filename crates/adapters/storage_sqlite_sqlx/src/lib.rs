//! # autoflow-adapter-storage-sqlite-sqlx
//!
//! `SQLite` persistence adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Implement the repository port traits defined in `autoflow-app::ports`
//! - Manage `SQLite` connection pool lifecycle
//! - Run database migrations (using sqlx embedded migrations)
//! - Map between domain types and database rows
//!
//! Workflow graphs are stored as their editor JSON definition and compiled
//! again when read, so a row that no longer validates fails to decode.
//!
//! ## Dependency rule
//! Depends on `autoflow-app` (for port traits) and `autoflow-domain` (for domain types).
//! The `app` and `domain` crates must never reference this adapter.

pub mod error;
pub mod geofence_repo;
pub mod pool;
pub mod workflow_repo;

pub use geofence_repo::SqliteGeofenceRepository;
pub use pool::{Config, DEFAULT_BUSY_TIMEOUT, DEFAULT_MAX_CONNECTIONS, Database};
pub use workflow_repo::SqliteWorkflowRepository;

/// Wrap any decoding failure as a sqlx decode error.
fn decode_err(err: impl std::error::Error + Send + Sync + 'static) -> sqlx::Error {
    sqlx::Error::Decode(Box::new(err))
}
