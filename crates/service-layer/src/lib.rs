//! Service layer for the stock allocation service.
//!
//! This crate wires the domain to storage:
//! - [`UnitOfWork`] scopes one transaction and harvests the events recorded
//!   by every product it committed
//! - handlers turn one command or event into work inside a unit of work
//! - the [`MessageBus`] routes a message to its handlers and feeds harvested
//!   events back into the same dispatch, failing fast on commands and
//!   isolating event handler failures
//! - [`bootstrap`] builds a bus with the default handler table

pub mod adapters;
pub mod bootstrap;
pub mod bus;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod unit_of_work;
pub mod views;

pub use adapters::{
    InMemoryNotifier, InMemoryPublisher, LogNotifier, LogPublisher, Notifier, Publisher,
};
pub use bootstrap::{BusSettings, DEFAULT_STOCK_ALERTS_RECIPIENT, bootstrap};
pub use bus::MessageBus;
pub use error::{ErrorKind, Result, ServiceError};
pub use handlers::{
    AddBatchHandler, AllocateHandler, ChangeBatchQuantityHandler, CommandHandler, CommandOutcome,
    EventHandler, PublishAllocatedEvent, SendOutOfStockNotification,
};
pub use registry::HandlerRegistry;
pub use unit_of_work::{UnitOfWork, UnitOfWorkScope};
pub use views::{ProductView, product_view};
