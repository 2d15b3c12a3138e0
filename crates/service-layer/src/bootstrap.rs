//! Builds a message bus with the default handler table.

use domain::{
    Allocate, Allocated, AllocationRequired, BatchCreated, BatchQuantityChanged,
    ChangeBatchQuantity, CreateBatch, OutOfStock,
};
use stock_store::{ConcurrencyMode, StockStore};

use crate::adapters::{Notifier, Publisher};
use crate::bus::MessageBus;
use crate::handlers::{
    AddBatchHandler, AllocateHandler, ChangeBatchQuantityHandler, PublishAllocatedEvent,
    SendOutOfStockNotification,
};
use crate::registry::HandlerRegistry;

/// Where out-of-stock alerts go unless configured otherwise.
pub const DEFAULT_STOCK_ALERTS_RECIPIENT: &str = "stock@made.com";

/// Settings the bus is built with.
#[derive(Debug, Clone)]
pub struct BusSettings {
    pub concurrency: ConcurrencyMode,
    pub stock_alerts_recipient: String,
}

impl Default for BusSettings {
    fn default() -> Self {
        Self {
            concurrency: ConcurrencyMode::default(),
            stock_alerts_recipient: DEFAULT_STOCK_ALERTS_RECIPIENT.to_string(),
        }
    }
}

/// Builds a bus over `store` with every handler bound to its collaborators.
///
/// | message                | handler                        |
/// |------------------------|--------------------------------|
/// | `Allocate`             | [`AllocateHandler`]            |
/// | `CreateBatch`          | [`AddBatchHandler`]            |
/// | `ChangeBatchQuantity`  | [`ChangeBatchQuantityHandler`] |
/// | `Allocated`            | [`PublishAllocatedEvent`]      |
/// | `OutOfStock`           | [`SendOutOfStockNotification`] |
/// | `AllocationRequired`   | [`AllocateHandler`]            |
/// | `BatchCreated`         | [`AddBatchHandler`]            |
/// | `BatchQuantityChanged` | [`ChangeBatchQuantityHandler`] |
pub fn bootstrap<S, N, P>(
    store: S,
    settings: BusSettings,
    notifier: N,
    publisher: P,
) -> MessageBus<S>
where
    S: StockStore,
    N: Notifier,
    P: Publisher,
{
    let mut registry = HandlerRegistry::<S>::new();
    registry
        .register_command::<Allocate, _>(AllocateHandler)
        .register_command::<CreateBatch, _>(AddBatchHandler)
        .register_command::<ChangeBatchQuantity, _>(ChangeBatchQuantityHandler)
        .register_event::<Allocated, _>(PublishAllocatedEvent::new(publisher))
        .register_event::<OutOfStock, _>(SendOutOfStockNotification::new(
            notifier,
            settings.stock_alerts_recipient.clone(),
        ))
        .register_event::<AllocationRequired, _>(AllocateHandler)
        .register_event::<BatchCreated, _>(AddBatchHandler)
        .register_event::<BatchQuantityChanged, _>(ChangeBatchQuantityHandler);

    tracing::info!(
        concurrency = %settings.concurrency,
        stock_alerts_recipient = %settings.stock_alerts_recipient,
        "message bus ready"
    );

    MessageBus::new(store, settings.concurrency, registry)
}
