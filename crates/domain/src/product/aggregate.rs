//! Product aggregate implementation.

use chrono::NaiveDate;
use common::{BatchRef, Sku, Version};
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::error::DomainError;
use crate::events::{Allocated, AllocationRequired, Event, OutOfStock};

use super::{Batch, OrderLine};

/// Product aggregate root.
///
/// Owns every batch of one sku. All allocation goes through the product so
/// that the invariant "never allocate more than is available" can be checked
/// in one place, and so that a single version number guards the whole
/// cluster against concurrent writers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    sku: Sku,

    #[serde(default)]
    batches: Vec<Batch>,

    /// Advances once per state-changing call.
    #[serde(default)]
    version_number: Version,

    /// Recorded, not yet harvested. Never persisted.
    #[serde(skip)]
    events: Vec<Event>,
}

impl Product {
    /// Creates a product with no batches at version 0.
    pub fn new(sku: impl Into<Sku>) -> Self {
        Self::with_batches(sku, Vec::new())
    }

    /// Creates a product at version 0 that already owns `batches`.
    pub fn with_batches(sku: impl Into<Sku>, batches: Vec<Batch>) -> Self {
        Self {
            sku: sku.into(),
            batches,
            version_number: Version::initial(),
            events: Vec::new(),
        }
    }

    pub fn sku(&self) -> &Sku {
        &self.sku
    }

    pub fn version(&self) -> Version {
        self.version_number
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn batch(&self, reference: &BatchRef) -> Option<&Batch> {
        self.batches.iter().find(|b| b.reference() == reference)
    }

    /// Sum of what is still available across all batches.
    pub fn available_quantity(&self) -> i64 {
        self.batches.iter().map(Batch::available_quantity).sum()
    }

    /// Adds a batch of this product's sku.
    ///
    /// Returns false, leaving the product untouched, if a batch with the same
    /// reference already exists.
    pub fn add_batch(
        &mut self,
        reference: impl Into<BatchRef>,
        quantity: u32,
        eta: Option<NaiveDate>,
    ) -> bool {
        let reference = reference.into();
        if self.batch(&reference).is_some() {
            return false;
        }

        self.batches
            .push(Batch::new(reference, self.sku.clone(), quantity, eta));
        self.version_number = self.version_number.next();
        true
    }

    /// Allocates a line to the preferred batch that can hold it.
    ///
    /// A line that is already allocated returns its batch again without
    /// changing anything. When no batch can take the line an [`OutOfStock`]
    /// event is recorded and the version stays where it was.
    pub fn allocate(&mut self, line: OrderLine) -> Result<BatchRef, DomainError> {
        if let Some(batch) = self.batches.iter().find(|b| b.is_allocated(&line)) {
            return Ok(batch.reference().clone());
        }

        let Some(batch) = self
            .batches
            .iter_mut()
            .filter(|b| b.can_allocate(&line))
            .min_by(|a, b| a.allocation_order(b))
        else {
            self.events.push(OutOfStock::new(self.sku.clone()).into());
            return Err(DomainError::OutOfStock {
                sku: self.sku.clone(),
            });
        };

        let reference = batch.reference().clone();
        let allocated = Allocated {
            order_id: line.order_id().clone(),
            sku: line.sku().clone(),
            quantity: line.quantity(),
            batch_ref: reference.clone(),
        };
        batch.allocate(line);

        self.version_number = self.version_number.next();
        self.events.push(allocated.into());
        Ok(reference)
    }

    /// Sets the purchased quantity of a batch.
    ///
    /// If the batch is now over-allocated, lines are shed (most recent
    /// first) until it is not, and an [`AllocationRequired`] event is
    /// recorded for each. Returns the number of lines shed.
    pub fn change_batch_quantity(
        &mut self,
        reference: &BatchRef,
        quantity: u32,
    ) -> Result<usize, DomainError> {
        let batch = self
            .batches
            .iter_mut()
            .find(|b| b.reference() == reference)
            .ok_or_else(|| DomainError::UnknownBatch {
                reference: reference.clone(),
            })?;

        batch.set_purchased_quantity(quantity);

        let mut shed = 0;
        while batch.available_quantity() < 0 {
            let Some(line) = batch.deallocate_one() else {
                break;
            };
            self.events.push(
                AllocationRequired::new(line.order_id().clone(), line.sku().clone(), line.quantity())
                    .into(),
            );
            shed += 1;
        }

        self.version_number = self.version_number.next();
        Ok(shed)
    }
}

impl Aggregate for Product {
    type Key = Sku;
    type Event = Event;

    fn aggregate_type() -> &'static str {
        "Product"
    }

    fn key(&self) -> &Sku {
        &self.sku
    }

    fn version(&self) -> Version {
        self.version_number
    }

    fn pending_events(&self) -> &[Event] {
        &self.events
    }

    fn drain_events(&mut self) -> std::vec::Drain<'_, Event> {
        self.events.drain(..)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(day: u32) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2026, 5, day)
    }

    #[test]
    fn new_product_starts_at_version_zero() {
        let product = Product::new("CLOCK");
        assert_eq!(product.version(), Version::initial());
        assert!(product.batches().is_empty());
        assert!(!product.has_pending_events());
    }

    #[test]
    fn prefers_in_stock_batches_to_shipments() {
        let mut product = Product::with_batches(
            "RETRO-CLOCK",
            vec![
                Batch::new("shipment-batch", "RETRO-CLOCK", 100, date(2)),
                Batch::new("in-stock-batch", "RETRO-CLOCK", 100, None),
            ],
        );

        let reference = product
            .allocate(OrderLine::new("oref", "RETRO-CLOCK", 10))
            .unwrap();

        assert_eq!(reference.as_str(), "in-stock-batch");
        let batch = product.batch(&reference).unwrap();
        assert_eq!(batch.available_quantity(), 90);
        assert_eq!(
            product.batch(&BatchRef::new("shipment-batch")).unwrap().available_quantity(),
            100
        );
    }

    #[test]
    fn prefers_earlier_batches() {
        let mut product = Product::with_batches(
            "MINIMALIST-SPOON",
            vec![
                Batch::new("slow", "MINIMALIST-SPOON", 100, date(20)),
                Batch::new("speedy", "MINIMALIST-SPOON", 100, date(1)),
                Batch::new("normal", "MINIMALIST-SPOON", 100, date(10)),
            ],
        );

        let reference = product
            .allocate(OrderLine::new("order1", "MINIMALIST-SPOON", 10))
            .unwrap();
        assert_eq!(reference.as_str(), "speedy");
    }

    #[test]
    fn allocate_records_event_and_increments_version() {
        let mut product = Product::with_batches(
            "LAMP",
            vec![Batch::new("b1", "LAMP", 10, None)],
        );

        product.allocate(OrderLine::new("o1", "LAMP", 3)).unwrap();

        assert_eq!(product.version(), Version::new(1));
        let events: Vec<Event> = product.drain_events().collect();
        assert_eq!(
            events,
            vec![Event::Allocated(Allocated {
                order_id: "o1".into(),
                sku: "LAMP".into(),
                quantity: 3,
                batch_ref: "b1".into(),
            })]
        );
        assert!(!product.has_pending_events());
    }

    #[test]
    fn out_of_stock_records_event_and_keeps_version() {
        let mut product = Product::with_batches(
            "SMALL-FORK",
            vec![Batch::new("b1", "SMALL-FORK", 10, None)],
        );
        product.allocate(OrderLine::new("o1", "SMALL-FORK", 10)).unwrap();
        product.drain_events().for_each(drop);

        let result = product.allocate(OrderLine::new("o2", "SMALL-FORK", 1));

        assert_eq!(
            result,
            Err(DomainError::OutOfStock {
                sku: "SMALL-FORK".into()
            })
        );
        assert_eq!(product.version(), Version::new(1));
        assert_eq!(
            product.pending_events(),
            &[Event::OutOfStock(OutOfStock::new("SMALL-FORK"))]
        );
    }

    #[test]
    fn reallocating_the_same_line_changes_nothing() {
        let mut product = Product::with_batches(
            "LAMP",
            vec![Batch::new("b1", "LAMP", 10, None)],
        );
        let line = OrderLine::new("o1", "LAMP", 3);
        product.allocate(line.clone()).unwrap();
        product.drain_events().for_each(drop);

        let reference = product.allocate(line).unwrap();

        assert_eq!(reference.as_str(), "b1");
        assert_eq!(product.version(), Version::new(1));
        assert!(!product.has_pending_events());
        assert_eq!(product.available_quantity(), 7);
    }

    #[test]
    fn add_batch_is_idempotent_per_reference() {
        let mut product = Product::new("RUG");

        assert!(product.add_batch("b1", 5, None));
        assert!(!product.add_batch("b1", 50, date(3)));

        assert_eq!(product.batches().len(), 1);
        assert_eq!(product.batches()[0].purchased_quantity(), 5);
        assert_eq!(product.version(), Version::new(1));
    }

    #[test]
    fn change_batch_quantity_sheds_lines_until_not_overallocated() {
        let mut product = Product::with_batches(
            "INDIFFERENT-TABLE",
            vec![Batch::new("b1", "INDIFFERENT-TABLE", 50, None)],
        );
        product
            .allocate(OrderLine::new("o1", "INDIFFERENT-TABLE", 20))
            .unwrap();
        product
            .allocate(OrderLine::new("o2", "INDIFFERENT-TABLE", 20))
            .unwrap();
        product.drain_events().for_each(drop);

        let shed = product
            .change_batch_quantity(&BatchRef::new("b1"), 25)
            .unwrap();

        assert_eq!(shed, 1);
        assert_eq!(product.version(), Version::new(3));
        assert_eq!(product.available_quantity(), 5);
        assert_eq!(
            product.pending_events(),
            &[Event::AllocationRequired(AllocationRequired::new(
                "o2",
                "INDIFFERENT-TABLE",
                20
            ))]
        );
    }

    #[test]
    fn change_batch_quantity_rejects_unknown_reference() {
        let mut product = Product::new("RUG");
        let result = product.change_batch_quantity(&BatchRef::new("nope"), 1);

        assert_eq!(
            result,
            Err(DomainError::UnknownBatch {
                reference: BatchRef::new("nope")
            })
        );
        assert_eq!(product.version(), Version::initial());
    }

    #[test]
    fn pending_events_are_not_serialized() {
        let mut product = Product::with_batches(
            "LAMP",
            vec![Batch::new("b1", "LAMP", 10, None)],
        );
        product.allocate(OrderLine::new("o1", "LAMP", 3)).unwrap();

        let json = serde_json::to_value(&product).unwrap();
        assert!(json.get("events").is_none());
        assert_eq!(json["version_number"], 1);

        let restored: Product = serde_json::from_value(json).unwrap();
        assert_eq!(restored.version(), Version::new(1));
        assert_eq!(restored.available_quantity(), 7);
        assert!(!restored.has_pending_events());
    }
}
