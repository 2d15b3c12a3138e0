//! Command and event handlers.
//!
//! Every handler is a value closed over whatever it needs besides the unit
//! of work it is given. Handlers that mutate products implement both the
//! command and the matching inbound event, so upstream systems can trigger
//! the same work either way.

use async_trait::async_trait;
use common::BatchRef;
use domain::{
    Allocate, Allocated, AllocationRequired, BatchCreated, BatchQuantityChanged,
    ChangeBatchQuantity, CreateBatch, DomainCommand, DomainEvent, Event, OrderLine, OutOfStock,
    Product,
};
use serde::Serialize;
use stock_store::StockStore;

use crate::adapters::{Notifier, Publisher};
use crate::unit_of_work::UnitOfWork;
use crate::{Result, ServiceError};

/// Channel the `Allocated` event is published on.
pub const LINE_ALLOCATED_CHANNEL: &str = "line_allocated";

/// What a successfully handled command did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum CommandOutcome {
    /// The order line is allocated to this batch.
    Allocated { batch_ref: BatchRef },

    /// The batch exists. `created` is false if it already did.
    BatchCreated { batch_ref: BatchRef, created: bool },

    /// The batch quantity was changed; this many lines must be re-allocated.
    BatchQuantityChanged {
        batch_ref: BatchRef,
        reallocations: usize,
    },
}

/// Handles one command type. Exactly one per command type is registered.
#[async_trait]
pub trait CommandHandler<C: DomainCommand, S: StockStore>: Send + Sync {
    async fn handle(&self, command: C, uow: &mut UnitOfWork<S>) -> Result<CommandOutcome>;
}

/// Handles one event type. Any number per event type may be registered.
#[async_trait]
pub trait EventHandler<E: DomainEvent, S: StockStore>: Send + Sync {
    /// Name used in logs and metrics.
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &E, uow: &mut UnitOfWork<S>) -> Result<()>;
}

/// Allocates an order line to the preferred batch of its product.
///
/// Work is committed even when the product is out of stock, so the
/// `OutOfStock` event it recorded is harvested; the failure is still
/// returned to the caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllocateHandler;

impl AllocateHandler {
    async fn allocate<S: StockStore>(
        &self,
        line: OrderLine,
        uow: &mut UnitOfWork<S>,
    ) -> Result<BatchRef> {
        let mut scope = uow.begin().await?;

        let Some(product) = scope.products().get(line.sku()).await? else {
            let err = ServiceError::invalid_sku(line.sku());
            scope.rollback().await?;
            return Err(err);
        };

        let result = product.allocate(line);
        scope.commit().await?;
        Ok(result?)
    }
}

#[async_trait]
impl<S: StockStore> CommandHandler<Allocate, S> for AllocateHandler {
    #[tracing::instrument(skip(self, uow), fields(order_id = %command.order_id, sku = %command.sku))]
    async fn handle(&self, command: Allocate, uow: &mut UnitOfWork<S>) -> Result<CommandOutcome> {
        let line = OrderLine::new(command.order_id, command.sku, command.quantity);
        let batch_ref = self.allocate(line, uow).await?;
        tracing::info!(%batch_ref, "order line allocated");
        Ok(CommandOutcome::Allocated { batch_ref })
    }
}

#[async_trait]
impl<S: StockStore> EventHandler<AllocationRequired, S> for AllocateHandler {
    fn name(&self) -> &'static str {
        "allocate"
    }

    #[tracing::instrument(skip(self, uow), fields(order_id = %event.order_id, sku = %event.sku))]
    async fn handle(&self, event: &AllocationRequired, uow: &mut UnitOfWork<S>) -> Result<()> {
        let line = OrderLine::new(event.order_id.clone(), event.sku.clone(), event.quantity);
        let batch_ref = self.allocate(line, uow).await?;
        tracing::info!(%batch_ref, "order line re-allocated");
        Ok(())
    }
}

/// Adds a batch, creating the product on its first batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct AddBatchHandler;

impl AddBatchHandler {
    async fn add_batch<S: StockStore>(
        &self,
        command: CreateBatch,
        uow: &mut UnitOfWork<S>,
    ) -> Result<bool> {
        let CreateBatch {
            reference,
            sku,
            quantity,
            eta,
        } = command;

        let mut scope = uow.begin().await?;

        // Batch references are unique across every product.
        let owner = scope
            .products()
            .get_by_batch_ref(&reference)
            .await?
            .map(|product| product.sku().clone());
        if let Some(owner) = owner.filter(|owner| *owner != sku) {
            scope.rollback().await?;
            return Err(ServiceError::InvalidReference(format!(
                "Batch reference {reference} already belongs to sku {owner}"
            )));
        }

        let products = scope.products();
        let created = match products.get(&sku).await? {
            Some(product) => product.add_batch(reference, quantity, eta),
            None => {
                tracing::info!(%sku, "creating product");
                let mut product = Product::new(sku);
                let created = product.add_batch(reference, quantity, eta);
                products.add(product);
                created
            }
        };

        scope.commit().await?;
        Ok(created)
    }
}

#[async_trait]
impl<S: StockStore> CommandHandler<CreateBatch, S> for AddBatchHandler {
    #[tracing::instrument(skip(self, uow), fields(reference = %command.reference, sku = %command.sku))]
    async fn handle(&self, command: CreateBatch, uow: &mut UnitOfWork<S>) -> Result<CommandOutcome> {
        let batch_ref = command.reference.clone();
        let created = self.add_batch(command, uow).await?;
        if !created {
            tracing::debug!("batch already exists");
        }
        Ok(CommandOutcome::BatchCreated { batch_ref, created })
    }
}

#[async_trait]
impl<S: StockStore> EventHandler<BatchCreated, S> for AddBatchHandler {
    fn name(&self) -> &'static str {
        "add_batch"
    }

    #[tracing::instrument(skip(self, uow), fields(reference = %event.reference, sku = %event.sku))]
    async fn handle(&self, event: &BatchCreated, uow: &mut UnitOfWork<S>) -> Result<()> {
        let command = CreateBatch::new(
            event.reference.clone(),
            event.sku.clone(),
            event.quantity,
            event.eta,
        );
        self.add_batch(command, uow).await?;
        Ok(())
    }
}

/// Changes the purchased quantity of a batch, shedding allocations that no
/// longer fit.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChangeBatchQuantityHandler;

impl ChangeBatchQuantityHandler {
    async fn change<S: StockStore>(
        &self,
        reference: &BatchRef,
        quantity: u32,
        uow: &mut UnitOfWork<S>,
    ) -> Result<usize> {
        let mut scope = uow.begin().await?;

        let Some(product) = scope.products().get_by_batch_ref(reference).await? else {
            scope.rollback().await?;
            return Err(ServiceError::InvalidReference(format!(
                "Invalid batch reference {reference}"
            )));
        };

        let shed = product.change_batch_quantity(reference, quantity)?;
        scope.commit().await?;
        Ok(shed)
    }
}

#[async_trait]
impl<S: StockStore> CommandHandler<ChangeBatchQuantity, S> for ChangeBatchQuantityHandler {
    #[tracing::instrument(skip(self, uow), fields(reference = %command.reference))]
    async fn handle(
        &self,
        command: ChangeBatchQuantity,
        uow: &mut UnitOfWork<S>,
    ) -> Result<CommandOutcome> {
        let reallocations = self
            .change(&command.reference, command.quantity, uow)
            .await?;
        if reallocations > 0 {
            tracing::info!(reallocations, "batch shrank below its allocations");
        }
        Ok(CommandOutcome::BatchQuantityChanged {
            batch_ref: command.reference,
            reallocations,
        })
    }
}

#[async_trait]
impl<S: StockStore> EventHandler<BatchQuantityChanged, S> for ChangeBatchQuantityHandler {
    fn name(&self) -> &'static str {
        "change_batch_quantity"
    }

    #[tracing::instrument(skip(self, uow), fields(reference = %event.reference))]
    async fn handle(&self, event: &BatchQuantityChanged, uow: &mut UnitOfWork<S>) -> Result<()> {
        self.change(&event.reference, event.quantity, uow).await?;
        Ok(())
    }
}

/// Tells the stock team when a product runs out.
pub struct SendOutOfStockNotification<N> {
    notifier: N,
    recipient: String,
}

impl<N: Notifier> SendOutOfStockNotification<N> {
    pub fn new(notifier: N, recipient: impl Into<String>) -> Self {
        Self {
            notifier,
            recipient: recipient.into(),
        }
    }
}

#[async_trait]
impl<N: Notifier, S: StockStore> EventHandler<OutOfStock, S> for SendOutOfStockNotification<N> {
    fn name(&self) -> &'static str {
        "send_out_of_stock_notification"
    }

    async fn handle(&self, event: &OutOfStock, _uow: &mut UnitOfWork<S>) -> Result<()> {
        self.notifier
            .send(&self.recipient, &format!("Out of stock for {}", event.sku))
            .await
    }
}

/// Publishes every allocation on [`LINE_ALLOCATED_CHANNEL`].
pub struct PublishAllocatedEvent<P> {
    publisher: P,
}

impl<P: Publisher> PublishAllocatedEvent<P> {
    pub fn new(publisher: P) -> Self {
        Self { publisher }
    }
}

#[async_trait]
impl<P: Publisher, S: StockStore> EventHandler<Allocated, S> for PublishAllocatedEvent<P> {
    fn name(&self) -> &'static str {
        "publish_allocated_event"
    }

    async fn handle(&self, event: &Allocated, _uow: &mut UnitOfWork<S>) -> Result<()> {
        self.publisher
            .publish(LINE_ALLOCATED_CHANNEL, &Event::Allocated(event.clone()))
            .await
    }
}
