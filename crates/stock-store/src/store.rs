use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use common::{BatchRef, Sku, Version};
use domain::Product;

use crate::Result;

/// How a transaction protects the products it reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConcurrencyMode {
    /// Read freely, check the version at commit. A lost race is a
    /// [`WriteConflict`](crate::StoreError::WriteConflict).
    #[default]
    Optimistic,

    /// Take an exclusive per-product lock at read time, held until the
    /// transaction ends. A second reader of the same product waits.
    Pessimistic,
}

impl ConcurrencyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConcurrencyMode::Optimistic => "optimistic",
            ConcurrencyMode::Pessimistic => "pessimistic",
        }
    }
}

impl fmt::Display for ConcurrencyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown concurrency mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseConcurrencyModeError(String);

impl fmt::Display for ParseConcurrencyModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown concurrency mode '{}', expected 'optimistic' or 'pessimistic'",
            self.0
        )
    }
}

impl std::error::Error for ParseConcurrencyModeError {}

impl FromStr for ConcurrencyMode {
    type Err = ParseConcurrencyModeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "optimistic" => Ok(ConcurrencyMode::Optimistic),
            "pessimistic" => Ok(ConcurrencyMode::Pessimistic),
            other => Err(ParseConcurrencyModeError(other.to_string())),
        }
    }
}

/// Core trait for product storage backends.
///
/// A store is a cheap, cloneable handle. All reads and writes happen inside a
/// [`StockTransaction`] obtained from [`StockStore::begin`].
#[async_trait]
pub trait StockStore: Clone + Send + Sync + 'static {
    type Transaction: StockTransaction + 'static;

    /// Opens a new transaction.
    async fn begin(&self, mode: ConcurrencyMode) -> Result<Self::Transaction>;
}

/// A single backend transaction.
///
/// Writes become visible to other transactions only on [`commit`], which is
/// all-or-nothing. Dropping a transaction without committing rolls it back
/// and releases any locks it holds.
///
/// [`commit`]: StockTransaction::commit
#[async_trait]
pub trait StockTransaction: Send {
    /// Loads a product by sku.
    ///
    /// In pessimistic mode this takes the product's lock first.
    async fn load(&mut self, sku: &Sku) -> Result<Option<Product>>;

    /// Loads the product owning the batch with this reference.
    async fn load_by_batch_ref(&mut self, reference: &BatchRef) -> Result<Option<Product>>;

    /// Stages a product that does not exist yet.
    ///
    /// Fails with a write conflict, at the latest on commit, if a product
    /// with the same sku exists.
    async fn insert(&mut self, product: &Product) -> Result<()>;

    /// Stages new state for a product that was loaded at `expected`.
    ///
    /// Fails with a write conflict, at the latest on commit, if the stored
    /// version is no longer `expected`.
    async fn update(&mut self, product: &Product, expected: Version) -> Result<()>;

    /// Applies every staged write atomically.
    async fn commit(self) -> Result<()>;

    /// Discards every staged write.
    async fn rollback(self) -> Result<()>;
}
