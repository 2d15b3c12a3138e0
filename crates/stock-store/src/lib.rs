//! Storage for product aggregates.
//!
//! A product is stored as one document (its batches and allocations) next to
//! its version number. Backends implement [`StockStore`], which hands out
//! [`StockTransaction`]s; the [`Repository`] sits on top of one transaction
//! and tracks every product it hands out.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{InMemoryStockStore, InMemoryTransaction};
pub use postgres::{PostgresStockStore, PostgresTransaction};
pub use repository::Repository;
pub use store::{ConcurrencyMode, ParseConcurrencyModeError, StockStore, StockTransaction};
