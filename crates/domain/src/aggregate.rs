//! Core aggregate trait.

use common::Version;

/// Trait for aggregates.
///
/// An aggregate is a cluster of domain objects treated as a single unit of
/// consistency. All mutation of the cluster goes through the aggregate root,
/// which:
/// - carries a version that advances once per state-changing call
/// - records domain events on its own queue instead of publishing them
///
/// Whoever persists the aggregate is responsible for draining that queue.
pub trait Aggregate: Send + Sync {
    /// Key the aggregate is stored and loaded by.
    type Key: Clone + Eq + std::hash::Hash + std::fmt::Display + Send + Sync;

    /// Events the aggregate records.
    type Event: Clone + Send + Sync;

    /// Returns the aggregate type name.
    ///
    /// Used for logging and storage organization.
    fn aggregate_type() -> &'static str;

    /// Returns the aggregate's key.
    fn key(&self) -> &Self::Key;

    /// Returns the current version of the aggregate.
    fn version(&self) -> Version;

    /// Returns the events recorded since the queue was last drained.
    fn pending_events(&self) -> &[Self::Event];

    /// Drains the pending event queue in FIFO order.
    fn drain_events(&mut self) -> std::vec::Drain<'_, Self::Event>;

    /// Returns true if events are waiting to be drained.
    fn has_pending_events(&self) -> bool {
        !self.pending_events().is_empty()
    }
}
