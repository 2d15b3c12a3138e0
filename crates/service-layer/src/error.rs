//! Service error types.

use common::{Sku, Version};
use domain::DomainError;
use stock_store::StoreError;
use thiserror::Error;

/// Coarse classification of a [`ServiceError`], for callers that branch on
/// the kind of failure rather than its details.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidReference,
    OutOfStock,
    WriteConflict,
    UnregisteredMessageType,
    Storage,
    Notification,
    Publish,
}

/// Errors that can occur while dispatching a message.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// A command names a sku or batch that does not exist.
    #[error("{0}")]
    InvalidReference(String),

    /// No batch can satisfy the requested allocation.
    #[error("Out of stock for sku {sku}")]
    OutOfStock { sku: Sku },

    /// Another writer committed first. The command may be resubmitted.
    #[error(
        "Write conflict for product {sku}: expected version {expected:?}, found {actual:?}"
    )]
    WriteConflict {
        sku: Sku,
        expected: Option<Version>,
        actual: Option<Version>,
    },

    /// A command type has zero or several handlers registered.
    #[error("Expected exactly one handler for {message_type}, found {registrations}")]
    UnregisteredMessageType {
        message_type: String,
        registrations: usize,
    },

    /// Storage failed for a reason other than a write conflict.
    #[error("Storage error: {0}")]
    Store(#[source] StoreError),

    /// The notifier could not deliver a message.
    #[error("Notification failed: {0}")]
    Notification(String),

    /// The publisher could not publish an event.
    #[error("Publish failed: {0}")]
    Publish(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::InvalidReference(_) => ErrorKind::InvalidReference,
            ServiceError::OutOfStock { .. } => ErrorKind::OutOfStock,
            ServiceError::WriteConflict { .. } => ErrorKind::WriteConflict,
            ServiceError::UnregisteredMessageType { .. } => ErrorKind::UnregisteredMessageType,
            ServiceError::Store(_) => ErrorKind::Storage,
            ServiceError::Notification(_) => ErrorKind::Notification,
            ServiceError::Publish(_) => ErrorKind::Publish,
        }
    }

    pub(crate) fn invalid_sku(sku: &Sku) -> Self {
        ServiceError::InvalidReference(format!("Invalid sku {sku}"))
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::WriteConflict {
                sku,
                expected,
                actual,
            } => ServiceError::WriteConflict {
                sku,
                expected,
                actual,
            },
            other => ServiceError::Store(other),
        }
    }
}

impl From<DomainError> for ServiceError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::OutOfStock { sku } => ServiceError::OutOfStock { sku },
            DomainError::UnknownBatch { reference } => {
                ServiceError::InvalidReference(format!("Invalid batch reference {reference}"))
            }
        }
    }
}

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;
