//! Commands: directed intent, handled by exactly one handler.

use chrono::NaiveDate;
use common::{BatchRef, OrderId, Sku};
use serde::{Deserialize, Serialize};

use crate::message::Message;

/// Trait implemented by every concrete command type.
///
/// The command type name is the routing key the handler registry uses.
pub trait DomainCommand: Into<Command> + Send + Sync + Sized + 'static {
    /// Stable name of the command type.
    const COMMAND_TYPE: &'static str;

    /// Moves the concrete command out of the [`Command`] envelope.
    fn from_command(command: Command) -> Option<Self>;
}

/// Every command known to the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Command {
    Allocate(Allocate),
    CreateBatch(CreateBatch),
    ChangeBatchQuantity(ChangeBatchQuantity),
}

impl Command {
    /// Returns the command type name.
    pub fn command_type(&self) -> &'static str {
        match self {
            Command::Allocate(_) => Allocate::COMMAND_TYPE,
            Command::CreateBatch(_) => CreateBatch::COMMAND_TYPE,
            Command::ChangeBatchQuantity(_) => ChangeBatchQuantity::COMMAND_TYPE,
        }
    }
}

macro_rules! domain_command {
    ($name:ident) => {
        impl DomainCommand for $name {
            const COMMAND_TYPE: &'static str = stringify!($name);

            fn from_command(command: Command) -> Option<Self> {
                match command {
                    Command::$name(inner) => Some(inner),
                    _ => None,
                }
            }
        }

        impl From<$name> for Command {
            fn from(command: $name) -> Self {
                Command::$name(command)
            }
        }

        impl From<$name> for Message {
            fn from(command: $name) -> Self {
                Message::Command(Command::$name(command))
            }
        }
    };
}

/// Command to allocate an order line to the best available batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Allocate {
    pub order_id: OrderId,
    pub sku: Sku,
    pub quantity: u32,
}

impl Allocate {
    pub fn new(order_id: impl Into<OrderId>, sku: impl Into<Sku>, quantity: u32) -> Self {
        Self {
            order_id: order_id.into(),
            sku: sku.into(),
            quantity,
        }
    }
}

/// Command to register a new batch of stock.
///
/// Creates the product aggregate if the sku has never been seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBatch {
    pub reference: BatchRef,
    pub sku: Sku,
    pub quantity: u32,
    #[serde(default)]
    pub eta: Option<NaiveDate>,
}

impl CreateBatch {
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

/// Command to change the purchased quantity of an existing batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeBatchQuantity {
    pub reference: BatchRef,
    pub quantity: u32,
}

impl ChangeBatchQuantity {
    pub fn new(reference: impl Into<BatchRef>, quantity: u32) -> Self {
        Self {
            reference: reference.into(),
            quantity,
        }
    }
}

domain_command!(Allocate);
domain_command!(CreateBatch);
domain_command!(ChangeBatchQuantity);
