//! Transactional store boundary.
//!
//! This module defines the storage abstraction the engine runs on, plus an
//! in-memory backend (tests/dev) and a Postgres backend (production).

pub mod in_memory;
pub mod postgres;
pub mod schema;
#[cfg(test)]
pub(crate) mod testing;
pub mod r#trait;

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;
pub use r#trait::{Store, StoreError, StoreTransaction};

/// Commit on success, roll back on failure.
///
/// A failed rollback is logged and the original error is returned; the
/// transaction is discarded either way.
pub async fn settle<T, E>(tx: Box<dyn StoreTransaction>, result: Result<T, E>) -> Result<T, E>
where
    E: From<StoreError>,
{
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}
