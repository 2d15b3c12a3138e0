//! Domain error types.

use common::{BatchRef, Sku};
use thiserror::Error;

/// Outcomes of aggregate operations that the caller must handle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// No batch of the product can satisfy the requested line.
    #[error("Out of stock for sku {sku}")]
    OutOfStock { sku: Sku },

    /// The product has no batch with this reference.
    #[error("Unknown batch reference: {reference}")]
    UnknownBatch { reference: BatchRef },
}
