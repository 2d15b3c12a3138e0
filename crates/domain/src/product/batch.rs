//! Batch entity.

use std::cmp::Ordering;

use chrono::NaiveDate;
use common::{BatchRef, Sku};
use serde::{Deserialize, Serialize};

use super::OrderLine;

/// A quantity of one sku, identified by its reference, that has arrived or is
/// expected to arrive on `eta`.
///
/// Batches compare equal when their references match. Allocations are kept
/// in the order they were made.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    reference: BatchRef,
    sku: Sku,
    purchased_quantity: u32,
    #[serde(default)]
    eta: Option<NaiveDate>,
    #[serde(default)]
    allocations: Vec<OrderLine>,
}

impl Batch {
    /// Creates a batch with no allocations.
    pub fn new(
        reference: impl Into<BatchRef>,
        sku: impl Into<Sku>,
        purchased_quantity: u32,
        eta: Option<NaiveDate>,
    ) -> Self {
        Self {
            reference: reference.into(),
            sku: sku.into(),
            purchased_quantity,
            eta,
            allocations: Vec::new(),
        }
    }

    pub fn reference(&self) -> &BatchRef {
        &self.reference
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn eta(&self) -> Option<NaiveDate> {
        self.eta
    }

    pub fn purchased_quantity(&self) -> u32 {
        self.purchased_quantity
    }

    /// Lines allocated to this batch, oldest first.
    pub fn allocations(&self) -> &[OrderLine] {
        &self.allocations
    }

    pub fn allocated_quantity(&self) -> i64 {
        self.allocations.iter().map(|l| i64::from(l.quantity())).sum()
    }

    /// Purchased minus allocated.
    ///
    /// Negative only transiently, while the aggregate sheds allocations
    /// after the purchased quantity was reduced.
    pub fn available_quantity(&self) -> i64 {
        i64::from(self.purchased_quantity) - self.allocated_quantity()
    }

    pub fn is_allocated(&self, line: &OrderLine) -> bool {
        self.allocations.contains(line)
    }

    /// Returns true if the line is for this batch's sku and fits in what is
    /// still available.
    pub fn can_allocate(&self, line: &OrderLine) -> bool {
        self.sku == *line.sku() && self.available_quantity() >= i64::from(line.quantity())
    }

    /// Allocates a line to this batch. Allocating a line twice is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if the line cannot be allocated to this batch. Callers check
    /// [`Batch::can_allocate`] first.
    pub(crate) fn allocate(&mut self, line: OrderLine) {
        if self.is_allocated(&line) {
            return;
        }
        assert!(
            self.can_allocate(&line),
            "batch {} cannot take {} x {}",
            self.reference,
            line.quantity(),
            line.sku()
        );
        self.allocations.push(line);
    }

    /// Removes the most recently allocated line.
    pub(crate) fn deallocate_one(&mut self) -> Option<OrderLine> {
        self.allocations.pop()
    }

    pub(crate) fn set_purchased_quantity(&mut self, quantity: u32) {
        self.purchased_quantity = quantity;
    }

    /// Allocation preference: batches without an eta (already in stock)
    /// first, then by earliest eta, ties broken by reference.
    pub fn allocation_order(&self, other: &Self) -> Ordering {
        self.eta
            .cmp(&other.eta)
            .then_with(|| self.reference.cmp(&other.reference))
    }
}

impl PartialEq for Batch {
    fn eq(&self, other: &Self) -> bool {
        self.reference == other.reference
    }
}

impl Eq for Batch {}

impl std::hash::Hash for Batch {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.reference.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2026, 3, day)
    }

    fn batch_and_line(batch_qty: u32, line_qty: u32) -> (Batch, OrderLine) {
        (
            Batch::new("batch-001", "ELEGANT-LAMP", batch_qty, None),
            OrderLine::new("order-123", "ELEGANT-LAMP", line_qty),
        )
    }

    #[test]
    fn allocating_reduces_available_quantity() {
        let mut batch = Batch::new("batch-001", "SMALL-TABLE", 20, date(1));
        batch.allocate(OrderLine::new("order-ref", "SMALL-TABLE", 2));

        assert_eq!(batch.allocated_quantity(), 2);
        assert_eq!(batch.available_quantity(), 18);
    }

    #[test]
    fn can_allocate_if_available_greater_or_equal() {
        let (large, line) = batch_and_line(20, 2);
        assert!(large.can_allocate(&line));

        let (exact, line) = batch_and_line(2, 2);
        assert!(exact.can_allocate(&line));

        let (small, line) = batch_and_line(2, 20);
        assert!(!small.can_allocate(&line));
    }

    #[test]
    fn cannot_allocate_if_skus_do_not_match() {
        let batch = Batch::new("batch-001", "UNCOMFORTABLE-CHAIR", 100, None);
        let line = OrderLine::new("order-123", "EXPENSIVE-TOASTER", 10);
        assert!(!batch.can_allocate(&line));
    }

    #[test]
    fn allocation_is_idempotent() {
        let (mut batch, line) = batch_and_line(20, 2);
        batch.allocate(line.clone());
        batch.allocate(line);

        assert_eq!(batch.available_quantity(), 18);
        assert_eq!(batch.allocations().len(), 1);
    }

    #[test]
    #[should_panic(expected = "cannot take")]
    fn allocating_without_capacity_panics() {
        let (mut batch, line) = batch_and_line(1, 2);
        batch.allocate(line);
    }

    #[test]
    fn deallocate_one_sheds_most_recent_line() {
        let mut batch = Batch::new("batch-001", "SHELF", 10, None);
        batch.allocate(OrderLine::new("first", "SHELF", 3));
        batch.allocate(OrderLine::new("second", "SHELF", 4));

        let shed = batch.deallocate_one().unwrap();
        assert_eq!(shed.order_id().as_str(), "second");
        assert_eq!(batch.available_quantity(), 7);

        batch.deallocate_one();
        assert!(batch.deallocate_one().is_none());
    }

    #[test]
    fn available_goes_negative_when_purchased_shrinks() {
        let (mut batch, line) = batch_and_line(20, 15);
        batch.allocate(line);
        batch.set_purchased_quantity(10);

        assert_eq!(batch.available_quantity(), -5);
    }

    #[test]
    fn allocation_order_prefers_stock_then_earliest_eta() {
        let in_stock = Batch::new("zzz", "SPOON", 10, None);
        let soon = Batch::new("aaa", "SPOON", 10, date(2));
        let later = Batch::new("bbb", "SPOON", 10, date(9));
        let same_day = Batch::new("ccc", "SPOON", 10, date(2));

        assert_eq!(in_stock.allocation_order(&soon), Ordering::Less);
        assert_eq!(soon.allocation_order(&later), Ordering::Less);
        assert_eq!(soon.allocation_order(&same_day), Ordering::Less);
        assert_eq!(later.allocation_order(&in_stock), Ordering::Greater);
    }

    #[test]
    fn batches_are_equal_by_reference() {
        let a = Batch::new("batch-001", "SPOON", 10, None);
        let b = Batch::new("batch-001", "SPOON", 99, date(4));
        assert_eq!(a, b);
    }
}
