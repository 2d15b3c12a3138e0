//! Handler registry: message type name to handlers.

use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use domain::{Command, DomainCommand, DomainEvent, Event};
use stock_store::StockStore;

use crate::handlers::{CommandHandler, CommandOutcome, EventHandler};
use crate::unit_of_work::UnitOfWork;
use crate::{Result, ServiceError};

/// A command handler with its command type erased.
#[async_trait]
pub(crate) trait ErasedCommandHandler<S: StockStore>: Send + Sync {
    async fn handle(&self, command: Command, uow: &mut UnitOfWork<S>) -> Result<CommandOutcome>;
}

/// An event handler with its event type erased.
#[async_trait]
pub(crate) trait ErasedEventHandler<S: StockStore>: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(&self, event: &Event, uow: &mut UnitOfWork<S>) -> Result<()>;
}

struct Typed<M, H> {
    handler: H,
    _message: PhantomData<fn(M)>,
}

impl<M, H> Typed<M, H> {
    fn new(handler: H) -> Self {
        Self {
            handler,
            _message: PhantomData,
        }
    }
}

#[async_trait]
impl<C, H, S> ErasedCommandHandler<S> for Typed<C, H>
where
    C: DomainCommand,
    H: CommandHandler<C, S>,
    S: StockStore,
{
    async fn handle(&self, command: Command, uow: &mut UnitOfWork<S>) -> Result<CommandOutcome> {
        let command_type = command.command_type();
        match C::from_command(command) {
            Some(command) => CommandHandler::handle(&self.handler, command, uow).await,
            None => Err(ServiceError::UnregisteredMessageType {
                message_type: command_type.to_string(),
                registrations: 0,
            }),
        }
    }
}

#[async_trait]
impl<E, H, S> ErasedEventHandler<S> for Typed<E, H>
where
    E: DomainEvent,
    H: EventHandler<E, S>,
    S: StockStore,
{
    fn name(&self) -> &'static str {
        <H as EventHandler<E, S>>::name(&self.handler)
    }

    async fn handle(&self, event: &Event, uow: &mut UnitOfWork<S>) -> Result<()> {
        match E::from_event(event) {
            Some(event) => EventHandler::handle(&self.handler, event, uow).await,
            None => Ok(()),
        }
    }
}

/// Maps each message type to its handlers.
///
/// Commands are expected to have exactly one handler; the bus reports zero
/// or several as a configuration error when such a command is dispatched.
/// Event handlers run in registration order.
pub struct HandlerRegistry<S: StockStore> {
    commands: HashMap<&'static str, Vec<Arc<dyn ErasedCommandHandler<S>>>>,
    events: HashMap<&'static str, Vec<Arc<dyn ErasedEventHandler<S>>>>,
}

impl<S: StockStore> Default for HandlerRegistry<S> {
    fn default() -> Self {
        Self {
            commands: HashMap::new(),
            events: HashMap::new(),
        }
    }
}

impl<S: StockStore> HandlerRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler for command type `C`.
    pub fn register_command<C, H>(&mut self, handler: H) -> &mut Self
    where
        C: DomainCommand,
        H: CommandHandler<C, S> + 'static,
    {
        self.commands
            .entry(C::COMMAND_TYPE)
            .or_default()
            .push(Arc::new(Typed::<C, H>::new(handler)));
        self
    }

    /// Appends a handler for event type `E`.
    pub fn register_event<E, H>(&mut self, handler: H) -> &mut Self
    where
        E: DomainEvent,
        H: EventHandler<E, S> + 'static,
    {
        self.events
            .entry(E::EVENT_TYPE)
            .or_default()
            .push(Arc::new(Typed::<E, H>::new(handler)));
        self
    }

    pub(crate) fn command_handlers(&self, command_type: &str) -> &[Arc<dyn ErasedCommandHandler<S>>] {
        self.commands
            .get(command_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub(crate) fn event_handlers(&self, event_type: &str) -> &[Arc<dyn ErasedEventHandler<S>>] {
        self.events
            .get(event_type)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of handlers registered for a command type.
    pub fn command_handler_count(&self, command_type: &str) -> usize {
        self.command_handlers(command_type).len()
    }

    /// Names of the handlers registered for an event type, in order.
    pub fn event_handler_names(&self, event_type: &str) -> Vec<&'static str> {
        self.event_handlers(event_type)
            .iter()
            .map(|h| h.name())
            .collect()
    }
}
