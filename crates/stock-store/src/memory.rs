use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{BatchRef, Sku, Version};
use domain::Product;
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use crate::{
    Result, StoreError,
    store::{ConcurrencyMode, StockStore, StockTransaction},
};

#[derive(Debug, Clone)]
struct StoredProduct {
    version: Version,
    state: Value,
}

type ProductMap = Arc<RwLock<HashMap<Sku, StoredProduct>>>;
type LockMap = Arc<Mutex<HashMap<Sku, Arc<Mutex<()>>>>>;

/// In-memory stock store for tests and for running without a database.
///
/// Products are kept as serialized documents keyed by sku, so a loaded
/// product is always a private copy, exactly as with the PostgreSQL store.
/// Pessimistic transactions lock per sku, even for skus that do not exist
/// yet.
#[derive(Clone, Default)]
pub struct InMemoryStockStore {
    products: ProductMap,
    locks: LockMap,
}

impl InMemoryStockStore {
    /// Creates a new empty in-memory stock store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored products.
    pub async fn product_count(&self) -> usize {
        self.products.read().await.len()
    }

    /// Returns the committed version of a product, if it exists.
    pub async fn stored_version(&self, sku: &Sku) -> Option<Version> {
        self.products.read().await.get(sku).map(|p| p.version)
    }
}

#[async_trait]
impl StockStore for InMemoryStockStore {
    type Transaction = InMemoryTransaction;

    async fn begin(&self, mode: ConcurrencyMode) -> Result<InMemoryTransaction> {
        Ok(InMemoryTransaction {
            products: Arc::clone(&self.products),
            locks: Arc::clone(&self.locks),
            mode,
            held: HashMap::new(),
            staged: Vec::new(),
            finished: false,
        })
    }
}

#[derive(Debug)]
enum StagedWrite {
    Insert {
        sku: Sku,
        version: Version,
        state: Value,
    },
    Update {
        sku: Sku,
        expected: Version,
        version: Version,
        state: Value,
    },
}

/// Transaction over an [`InMemoryStockStore`].
///
/// Writes are staged and validated together on commit. Dropping the
/// transaction discards them and releases its locks.
pub struct InMemoryTransaction {
    products: ProductMap,
    locks: LockMap,
    mode: ConcurrencyMode,
    held: HashMap<Sku, OwnedMutexGuard<()>>,
    staged: Vec<StagedWrite>,
    finished: bool,
}

impl InMemoryTransaction {
    async fn lock(&mut self, sku: &Sku) {
        if self.mode != ConcurrencyMode::Pessimistic || self.held.contains_key(sku) {
            return;
        }

        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(sku.clone()).or_default())
        };
        let guard = lock.lock_owned().await;
        tracing::trace!(%sku, "product lock acquired");
        self.held.insert(sku.clone(), guard);
    }

    async fn read(&self, sku: &Sku) -> Result<Option<Product>> {
        let products = self.products.read().await;
        match products.get(sku) {
            Some(stored) => Ok(Some(serde_json::from_value(stored.state.clone())?)),
            None => Ok(None),
        }
    }

    async fn find_sku_by_batch(&self, reference: &BatchRef) -> Option<Sku> {
        let products = self.products.read().await;
        products
            .iter()
            .filter(|(_, stored)| owns_batch(&stored.state, reference))
            .map(|(sku, _)| sku)
            .min()
            .cloned()
    }
}

fn owns_batch(state: &Value, reference: &BatchRef) -> bool {
    state
        .get("batches")
        .and_then(Value::as_array)
        .is_some_and(|batches| {
            batches
                .iter()
                .any(|b| b.get("reference").and_then(Value::as_str) == Some(reference.as_str()))
        })
}

fn write_conflict(sku: &Sku, expected: Option<Version>, actual: Option<Version>) -> StoreError {
    metrics::counter!("stock_store_write_conflicts_total", "backend" => "memory").increment(1);
    tracing::warn!(%sku, ?expected, ?actual, "write conflict");
    StoreError::WriteConflict {
        sku: sku.clone(),
        expected,
        actual,
    }
}

#[async_trait]
impl StockTransaction for InMemoryTransaction {
    async fn load(&mut self, sku: &Sku) -> Result<Option<Product>> {
        self.lock(sku).await;
        self.read(sku).await
    }

    async fn load_by_batch_ref(&mut self, reference: &BatchRef) -> Result<Option<Product>> {
        let Some(sku) = self.find_sku_by_batch(reference).await else {
            return Ok(None);
        };
        self.load(&sku).await
    }

    async fn insert(&mut self, product: &Product) -> Result<()> {
        self.staged.push(StagedWrite::Insert {
            sku: product.sku().clone(),
            version: product.version(),
            state: serde_json::to_value(product)?,
        });
        Ok(())
    }

    async fn update(&mut self, product: &Product, expected: Version) -> Result<()> {
        self.staged.push(StagedWrite::Update {
            sku: product.sku().clone(),
            expected,
            version: product.version(),
            state: serde_json::to_value(product)?,
        });
        Ok(())
    }

    async fn commit(mut self) -> Result<()> {
        let staged = std::mem::take(&mut self.staged);
        let mut products = self.products.write().await;

        for write in &staged {
            match write {
                StagedWrite::Insert { sku, .. } => {
                    if let Some(existing) = products.get(sku) {
                        return Err(write_conflict(sku, None, Some(existing.version)));
                    }
                }
                StagedWrite::Update { sku, expected, .. } => {
                    let actual = products.get(sku).map(|p| p.version);
                    if actual != Some(*expected) {
                        return Err(write_conflict(sku, Some(*expected), actual));
                    }
                }
            }
        }

        let writes = staged.len();
        for write in staged {
            match write {
                StagedWrite::Insert {
                    sku,
                    version,
                    state,
                }
                | StagedWrite::Update {
                    sku,
                    version,
                    state,
                    ..
                } => {
                    products.insert(sku, StoredProduct { version, state });
                }
            }
        }
        drop(products);

        self.finished = true;
        tracing::debug!(writes, "in-memory transaction committed");
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        drop(self);
        Ok(())
    }
}

impl InMemoryTransaction {
    /// Releases held product locks and forgets every lock nobody holds or
    /// waits for.
    ///
    /// Holders and waiters keep their own `Arc` to the lock, so an entry the
    /// map alone references is idle. If the map is busy the pruning is left
    /// to the next transaction to finish.
    fn release_locks(&mut self) {
        if self.held.is_empty() {
            return;
        }
        self.held.clear();

        if let Ok(mut locks) = self.locks.try_lock() {
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        if !self.finished {
            tracing::debug!(
                staged = self.staged.len(),
                locks = self.held.len(),
                "in-memory transaction rolled back"
            );
        }
        self.release_locks();
    }
}
