//! Domain events: broadcast facts with zero or more subscribers.

use chrono::NaiveDate;
use common::{BatchRef, OrderId, Sku};
use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Trait implemented by every concrete event type.
///
/// The event type name is the routing key the handler registry uses.
pub trait DomainEvent: Into<Event> + Clone + Send + Sync + 'static {
    /// Stable name of the event type.
    const EVENT_TYPE: &'static str;

    /// Borrows the concrete event out of the [`Event`] envelope.
    fn from_event(event: &Event) -> Option<&Self>;
}

/// Every event known to the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Event {
    /// An order line was allocated to a batch.
    Allocated(Allocated),

    /// No batch could satisfy an order line.
    OutOfStock(OutOfStock),

    /// A batch was announced by an upstream system.
    BatchCreated(BatchCreated),

    /// An order line lost its allocation and must be placed again.
    AllocationRequired(AllocationRequired),

    /// The purchased quantity of a batch was changed upstream.
    BatchQuantityChanged(BatchQuantityChanged),
}

impl Event {
    /// Returns the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            Event::Allocated(_) => Allocated::EVENT_TYPE,
            Event::OutOfStock(_) => OutOfStock::EVENT_TYPE,
            Event::BatchCreated(_) => BatchCreated::EVENT_TYPE,
            Event::AllocationRequired(_) => AllocationRequired::EVENT_TYPE,
            Event::BatchQuantityChanged(_) => BatchQuantityChanged::EVENT_TYPE,
        }
    }

    /// Returns the sku the event concerns, when it names one.
    pub fn sku(&self) -> Option<&Sku> {
        match self {
            Event::Allocated(e) => Some(&e.sku),
            Event::OutOfStock(e) => Some(&e.sku),
            Event::BatchCreated(e) => Some(&e.sku),
            Event::AllocationRequired(e) => Some(&e.sku),
            Event::BatchQuantityChanged(_) => None,
        }
    }
}

macro_rules! domain_event {
    ($name:ident) => {
        impl DomainEvent for $name {
            const EVENT_TYPE: &'static str = stringify!($name);

            fn from_event(event: &Event) -> Option<&Self> {
                match event {
                    Event::$name(inner) => Some(inner),
                    _ => None,
                }
            }
        }

        impl From<$name> for Event {
            fn from(event: $name) -> Self {
                Event::$name(event)
            }
        }

        impl From<$name> for Message {
            fn from(event: $name) -> Self {
                Message::Event(Event::$name(event))
            }
        }
    };
}

/// Data for the Allocated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocated {
    pub order_id: OrderId,
    pub sku: Sku,
    pub quantity: u32,
    pub batch_ref: BatchRef,
}

/// Data for the OutOfStock event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutOfStock {
    pub sku: Sku,
}

/// Data for the BatchCreated event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCreated {
    pub reference: BatchRef,
    pub sku: Sku,
    pub quantity: u32,
    #[serde(default)]
    pub eta: Option<NaiveDate>,
}

/// Data for the AllocationRequired event.
///
/// Re-derived from an order line that was shed from a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllocationRequired {
    pub order_id: OrderId,
    pub sku: Sku,
    pub quantity: u32,
}

/// Data for the BatchQuantityChanged event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchQuantityChanged {
    pub reference: BatchRef,
    pub quantity: u32,
}

domain_event!(Allocated);
domain_event!(OutOfStock);
domain_event!(BatchCreated);
domain_event!(AllocationRequired);
domain_event!(BatchQuantityChanged);

impl OutOfStock {
    pub fn new(sku: impl Into<Sku>) -> Self {
        Self { sku: sku.into() }
    }
}

impl BatchCreated {
    pub fn new(
        reference: impl Into<BatchRef>,
        sku: impl Into<Sku>,
        quantity: u32,
        eta: Option<NaiveDate>,
    ) -> Self {
        Self {
            reference: reference.into(),
            sku: sku.into(),
            quantity,
            eta,
        }
    }
}

impl AllocationRequired {
    pub fn new(order_id: impl Into<OrderId>, sku: impl Into<Sku>, quantity: u32) -> Self {
        Self {
            order_id: order_id.into(),
            sku: sku.into(),
            quantity,
        }
    }
}

impl BatchQuantityChanged {
    pub fn new(reference: impl Into<BatchRef>, quantity: u32) -> Self {
        Self {
            reference: reference.into(),
            quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_names() {
        let event: Event = OutOfStock::new("FORK").into();
        assert_eq!(event.event_type(), "OutOfStock");

        let event: Event = AllocationRequired::new("o1", "FORK", 3).into();
        assert_eq!(event.event_type(), "AllocationRequired");
        assert_eq!(event.sku(), Some(&Sku::new("FORK")));
    }

    #[test]
    fn from_event_borrows_matching_variant_only() {
        let event: Event = OutOfStock::new("FORK").into();
        assert_eq!(
            OutOfStock::from_event(&event).map(|e| e.sku.as_str()),
            Some("FORK")
        );
        assert!(Allocated::from_event(&event).is_none());
    }

    #[test]
    fn serializes_with_type_tag() {
        let event: Event = BatchQuantityChanged::new("b1", 97).into();
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "BatchQuantityChanged");
        assert_eq!(json["data"]["reference"], "b1");
        assert_eq!(json["data"]["quantity"], 97);
    }

    #[test]
    fn batch_created_eta_defaults_to_none() {
        let json = serde_json::json!({
            "type": "BatchCreated",
            "data": {"reference": "b1", "sku": "LAMP", "quantity": 10}
        });
        let event: Event = serde_json::from_value(json).unwrap();
        assert_eq!(event, Event::BatchCreated(BatchCreated::new("b1", "LAMP", 10, None)));
    }
}
