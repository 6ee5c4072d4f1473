//! Chronicle Store: concrete event and snapshot stores.
//!
//! The in-memory stores are the reference implementations of the
//! `chronicle-core` store contracts; the `pg_*` stores persist to
//! PostgreSQL through `sqlx`.

pub mod config;
pub mod in_memory;
pub mod in_memory_snapshot;
pub mod pg_event_store;
pub mod pg_snapshot_store;

mod append;

use chronicle_core::error::DomainError;
use sqlx::PgPool;

/// Applies the bundled SQL migrations.
///
/// # Errors
///
/// Returns `DomainError::Infrastructure` if a migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), DomainError> {
    sqlx::migrate!("../../migrations")
        .run(pool)
        .await
        .map_err(|e| DomainError::Infrastructure(format!("migration failed: {e}")))
}
