use common::{Sku, Version};
use thiserror::Error;

/// Errors that can occur when interacting with the stock store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another writer changed the product between load and commit.
    /// Nothing from the failed transaction was applied.
    #[error(
        "Write conflict for product {sku}: expected version {expected:?}, found {actual:?}"
    )]
    WriteConflict {
        sku: Sku,
        expected: Option<Version>,
        actual: Option<Version>,
    },

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true for a lost optimistic-concurrency race.
    pub fn is_write_conflict(&self) -> bool {
        matches!(self, StoreError::WriteConflict { .. })
    }
}

/// Result type for stock store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
