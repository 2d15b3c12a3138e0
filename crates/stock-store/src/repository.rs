//! Repository over one stock transaction.

use common::{BatchRef, Sku, Version};
use domain::{Aggregate, Product};

use crate::{Result, store::StockTransaction};

struct Tracked {
    product: Product,
    /// Version the product had when loaded. `None` for products added in
    /// this transaction.
    loaded_version: Option<Version>,
}

/// Collection-like access to products inside one transaction.
///
/// Every product handed out is tracked as "seen", in first-seen order, and
/// loading the same sku twice returns the same instance. On commit, added
/// products are inserted, loaded products whose version moved are updated
/// against the version they were loaded at, and untouched products are not
/// written at all.
pub struct Repository<T: StockTransaction> {
    tx: T,
    seen: Vec<Tracked>,
}

impl<T: StockTransaction> Repository<T> {
    pub fn new(tx: T) -> Self {
        Self {
            tx,
            seen: Vec::new(),
        }
    }

    /// Stages a new product for insertion and marks it seen.
    pub fn add(&mut self, product: Product) -> &mut Product {
        tracing::debug!(sku = %product.sku(), "product added");
        self.track(product, None)
    }

    /// Returns the product for `sku`, loading it on first access.
    pub async fn get(&mut self, sku: &Sku) -> Result<Option<&mut Product>> {
        if let Some(index) = self.position(sku) {
            return Ok(Some(&mut self.seen[index].product));
        }

        match self.tx.load(sku).await? {
            Some(product) => {
                let version = product.version();
                Ok(Some(self.track(product, Some(version))))
            }
            None => Ok(None),
        }
    }

    /// Returns the product owning the batch with this reference.
    pub async fn get_by_batch_ref(&mut self, reference: &BatchRef) -> Result<Option<&mut Product>> {
        if let Some(index) = self
            .seen
            .iter()
            .position(|t| t.product.batch(reference).is_some())
        {
            return Ok(Some(&mut self.seen[index].product));
        }

        let Some(product) = self.tx.load_by_batch_ref(reference).await? else {
            return Ok(None);
        };

        // A product already in hand wins over a second copy.
        if let Some(index) = self.position(product.sku()) {
            return Ok(Some(&mut self.seen[index].product));
        }

        let version = product.version();
        Ok(Some(self.track(product, Some(version))))
    }

    /// Products handed out so far, in first-seen order.
    pub fn seen(&self) -> impl Iterator<Item = &Product> {
        self.seen.iter().map(|t| &t.product)
    }

    /// Flushes every change and commits the transaction.
    ///
    /// Returns the seen products so their recorded events can be harvested.
    pub async fn commit(mut self) -> Result<Vec<Product>> {
        let mut inserted = 0;
        let mut updated = 0;

        for tracked in &self.seen {
            match tracked.loaded_version {
                None => {
                    self.tx.insert(&tracked.product).await?;
                    inserted += 1;
                }
                Some(loaded) if loaded != tracked.product.version() => {
                    self.tx.update(&tracked.product, loaded).await?;
                    updated += 1;
                }
                Some(_) => {}
            }
        }

        self.tx.commit().await?;
        tracing::debug!(
            aggregate = Product::aggregate_type(),
            inserted,
            updated,
            seen = self.seen.len(),
            "repository committed"
        );

        Ok(self.seen.into_iter().map(|t| t.product).collect())
    }

    /// Discards every change.
    pub async fn rollback(self) -> Result<()> {
        tracing::debug!(seen = self.seen.len(), "repository rolled back");
        self.tx.rollback().await
    }

    fn position(&self, sku: &Sku) -> Option<usize> {
        self.seen.iter().position(|t| t.product.sku() == sku)
    }

    fn track(&mut self, product: Product, loaded_version: Option<Version>) -> &mut Product {
        let index = self.seen.len();
        self.seen.push(Tracked {
            product,
            loaded_version,
        });
        &mut self.seen[index].product
    }
}

#[cfg(test)]
mod tests {
    use domain::{Batch, OrderLine};

    use super::*;
    use crate::{ConcurrencyMode, InMemoryStockStore, StockStore};

    async fn repository(store: &InMemoryStockStore) -> Repository<crate::InMemoryTransaction> {
        Repository::new(store.begin(ConcurrencyMode::Optimistic).await.unwrap())
    }

    async fn seed(store: &InMemoryStockStore, product: Product) {
        let mut repo = repository(store).await;
        repo.add(product);
        repo.commit().await.unwrap();
    }

    fn chair() -> Product {
        Product::with_batches("CHAIR", vec![Batch::new("b1", "CHAIR", 20, None)])
    }

    #[tokio::test]
    async fn added_products_are_seen_and_inserted() {
        let store = InMemoryStockStore::new();
        let mut repo = repository(&store).await;

        repo.add(chair());
        assert_eq!(repo.seen().count(), 1);

        let committed = repo.commit().await.unwrap();
        assert_eq!(committed.len(), 1);
        assert_eq!(store.product_count().await, 1);
    }

    #[tokio::test]
    async fn get_returns_the_same_instance_twice() {
        let store = InMemoryStockStore::new();
        seed(&store, chair()).await;
        let sku = Sku::new("CHAIR");

        let mut repo = repository(&store).await;
        repo.get(&sku)
            .await
            .unwrap()
            .unwrap()
            .allocate(OrderLine::new("o1", "CHAIR", 5))
            .unwrap();

        let again = repo.get(&sku).await.unwrap().unwrap();
        assert_eq!(again.available_quantity(), 15);
        assert_eq!(repo.seen().count(), 1);
    }

    #[tokio::test]
    async fn get_by_batch_ref_shares_identity_with_get() {
        let store = InMemoryStockStore::new();
        seed(&store, chair()).await;

        let mut repo = repository(&store).await;
        repo.get(&Sku::new("CHAIR"))
            .await
            .unwrap()
            .unwrap()
            .allocate(OrderLine::new("o1", "CHAIR", 5))
            .unwrap();

        let by_batch = repo
            .get_by_batch_ref(&BatchRef::new("b1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_batch.available_quantity(), 15);
        assert_eq!(repo.seen().count(), 1);
    }

    #[tokio::test]
    async fn unknown_products_are_not_seen() {
        let store = InMemoryStockStore::new();
        let mut repo = repository(&store).await;

        assert!(repo.get(&Sku::new("GHOST")).await.unwrap().is_none());
        assert!(
            repo.get_by_batch_ref(&BatchRef::new("nope"))
                .await
                .unwrap()
                .is_none()
        );
        assert_eq!(repo.seen().count(), 0);
    }

    #[tokio::test]
    async fn commit_writes_only_changed_products() {
        let store = InMemoryStockStore::new();
        seed(&store, chair()).await;
        seed(
            &store,
            Product::with_batches("DESK", vec![Batch::new("b2", "DESK", 3, None)]),
        )
        .await;

        let mut repo = repository(&store).await;
        repo.get(&Sku::new("CHAIR"))
            .await
            .unwrap()
            .unwrap()
            .allocate(OrderLine::new("o1", "CHAIR", 1))
            .unwrap();
        repo.get(&Sku::new("DESK")).await.unwrap();

        // A concurrent writer bumps DESK. Since DESK was only read, this
        // commit must not touch it and so must not conflict.
        let mut other = repository(&store).await;
        other
            .get(&Sku::new("DESK"))
            .await
            .unwrap()
            .unwrap()
            .allocate(OrderLine::new("o2", "DESK", 1))
            .unwrap();
        other.commit().await.unwrap();

        let committed = repo.commit().await.unwrap();
        assert_eq!(committed.len(), 2);
        assert_eq!(
            store.stored_version(&Sku::new("CHAIR")).await,
            Some(Version::new(1))
        );
        assert_eq!(
            store.stored_version(&Sku::new("DESK")).await,
            Some(Version::new(1))
        );
    }

    #[tokio::test]
    async fn rollback_leaves_store_untouched() {
        let store = InMemoryStockStore::new();
        let mut repo = repository(&store).await;
        repo.add(chair());

        repo.rollback().await.unwrap();
        assert_eq!(store.product_count().await, 0);
    }
}
