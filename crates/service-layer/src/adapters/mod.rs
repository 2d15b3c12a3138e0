//! Outbound collaborators: notifications and event publishing.

pub mod notifier;
pub mod publisher;

pub use notifier::{InMemoryNotifier, LogNotifier, Notifier};
pub use publisher::{InMemoryPublisher, LogPublisher, Publisher};
