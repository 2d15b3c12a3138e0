//! The envelope routed by the message bus.

use serde::{Deserialize, Serialize};

use crate::commands::Command;
use crate::events::Event;

/// A message is either a command or an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Message {
    Command(Command),
    Event(Event),
}

impl Message {
    /// Returns the type name of the wrapped command or event.
    pub fn message_type(&self) -> &'static str {
        match self {
            Message::Command(command) => command.command_type(),
            Message::Event(event) => event.event_type(),
        }
    }

    /// Returns true if the message is a command.
    pub fn is_command(&self) -> bool {
        matches!(self, Message::Command(_))
    }
}

impl From<Command> for Message {
    fn from(command: Command) -> Self {
        Message::Command(command)
    }
}

impl From<Event> for Message {
    fn from(event: Event) -> Self {
        Message::Event(event)
    }
}
