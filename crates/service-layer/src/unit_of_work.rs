//! Unit of work: one transaction scope plus event harvesting.

use domain::{Aggregate, Event, Product};
use stock_store::{ConcurrencyMode, Repository, StockStore};
use uuid::Uuid;

use crate::Result;

/// Opens transaction scopes against a store and collects the events recorded
/// by products that were committed through them.
///
/// Products from a scope that was rolled back (explicitly or by dropping it)
/// never reach the harvest, so their events are discarded with them.
pub struct UnitOfWork<S: StockStore> {
    store: S,
    mode: ConcurrencyMode,
    committed: Vec<Product>,
}

impl<S: StockStore> UnitOfWork<S> {
    pub fn new(store: S, mode: ConcurrencyMode) -> Self {
        Self {
            store,
            mode,
            committed: Vec::new(),
        }
    }

    pub fn mode(&self) -> ConcurrencyMode {
        self.mode
    }

    /// Opens a transaction and a fresh repository over it.
    ///
    /// Dropping the returned scope without calling
    /// [`commit`](UnitOfWorkScope::commit) rolls the transaction back.
    pub async fn begin(&mut self) -> Result<UnitOfWorkScope<'_, S>> {
        self.committed.retain(|p| p.has_pending_events());

        let tx = self.store.begin(self.mode).await?;
        let id = Uuid::new_v4();
        tracing::debug!(uow_id = %id, mode = %self.mode, "unit of work started");

        Ok(UnitOfWorkScope {
            uow: self,
            repository: Repository::new(tx),
            id,
        })
    }

    /// Drains the events of every committed product, in the order the
    /// products were first seen and FIFO per product.
    ///
    /// Each event is yielded once. A second call yields nothing new.
    pub fn collect_new_events(&mut self) -> impl Iterator<Item = Event> + '_ {
        self.committed
            .iter_mut()
            .flat_map(|product| product.drain_events())
    }
}

/// One open transaction of a [`UnitOfWork`].
pub struct UnitOfWorkScope<'a, S: StockStore> {
    uow: &'a mut UnitOfWork<S>,
    repository: Repository<S::Transaction>,
    id: Uuid,
}

impl<S: StockStore> UnitOfWorkScope<'_, S> {
    /// The repository of this scope.
    pub fn products(&mut self) -> &mut Repository<S::Transaction> {
        &mut self.repository
    }

    /// Flushes every change atomically and hands the seen products to the
    /// unit of work for harvesting.
    pub async fn commit(self) -> Result<()> {
        let Self {
            uow,
            repository,
            id,
        } = self;

        let products = repository.commit().await?;
        tracing::debug!(uow_id = %id, products = products.len(), "unit of work committed");
        uow.committed.extend(products);
        Ok(())
    }

    /// Discards every change made in this scope.
    pub async fn rollback(self) -> Result<()> {
        self.repository.rollback().await?;
        tracing::debug!(uow_id = %self.id, "unit of work rolled back");
        Ok(())
    }
}
