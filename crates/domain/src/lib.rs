//! Domain layer for the stock allocation service.
//!
//! This crate provides:
//! - the `Aggregate` trait describing a consistency boundary
//! - the `Product` aggregate with its `Batch` entities and `OrderLine` values
//! - commands (intent) and events (facts), and the `Message` envelope the
//!   message bus routes

pub mod aggregate;
pub mod commands;
pub mod error;
pub mod events;
pub mod message;
pub mod product;

pub use aggregate::Aggregate;
pub use commands::{Allocate, ChangeBatchQuantity, Command, CreateBatch, DomainCommand};
pub use error::DomainError;
pub use events::{
    Allocated, AllocationRequired, BatchCreated, BatchQuantityChanged, DomainEvent, Event,
    OutOfStock,
};
pub use message::Message;
pub use product::{Batch, OrderLine, Product};
