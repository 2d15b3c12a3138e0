//! Message bus: runs one external message, and every event it causes, to
//! completion.

use std::collections::VecDeque;
use std::time::Instant;

use domain::{Command, Event, Message};
use stock_store::{ConcurrencyMode, StockStore};

use crate::handlers::CommandOutcome;
use crate::registry::HandlerRegistry;
use crate::unit_of_work::UnitOfWork;
use crate::{Result, ServiceError};

/// Routes messages to their registered handlers.
///
/// Each [`dispatch`](MessageBus::dispatch) owns a queue seeded with one
/// message and a fresh [`UnitOfWork`]. Events harvested from committed work
/// are appended to the same queue and handled in the same call.
///
/// Commands fail fast: a command error is returned from `dispatch`. Events
/// are isolated: a failing event handler is logged and counted, and its
/// siblings still run.
pub struct MessageBus<S: StockStore> {
    store: S,
    mode: ConcurrencyMode,
    registry: HandlerRegistry<S>,
}

impl<S: StockStore> MessageBus<S> {
    pub fn new(store: S, mode: ConcurrencyMode, registry: HandlerRegistry<S>) -> Self {
        Self {
            store,
            mode,
            registry,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn mode(&self) -> ConcurrencyMode {
        self.mode
    }

    pub fn registry(&self) -> &HandlerRegistry<S> {
        &self.registry
    }

    /// Creates a unit of work over this bus's store.
    pub fn unit_of_work(&self) -> UnitOfWork<S> {
        UnitOfWork::new(self.store.clone(), self.mode)
    }

    /// Handles `message` and everything it causes.
    ///
    /// Returns the outcome of each command handled, in order. If a command
    /// fails, events already harvested from work it committed are still
    /// delivered before its error is returned. Only events can follow a
    /// failed command: they report work that is already committed, such as
    /// `OutOfStock`, and their listeners must still hear of it.
    #[tracing::instrument(skip(self, message), fields(message_type))]
    pub async fn dispatch(&self, message: impl Into<Message> + Send) -> Result<Vec<CommandOutcome>> {
        let message = message.into();
        tracing::Span::current().record("message_type", message.message_type());

        let start = Instant::now();
        let mut uow = self.unit_of_work();
        let mut queue = VecDeque::from([message]);
        let mut outcomes = Vec::new();
        let mut failure = None;

        while let Some(message) = queue.pop_front() {
            metrics::counter!("messagebus_messages_total", "message_type" => message.message_type())
                .increment(1);

            match message {
                Message::Command(command) => {
                    match self.handle_command(command, &mut uow).await {
                        Ok(outcome) => outcomes.push(outcome),
                        Err(err) => failure = Some(err),
                    }
                    queue.extend(uow.collect_new_events().map(Message::Event));
                }
                Message::Event(event) => {
                    self.handle_event(&event, &mut uow, &mut queue).await;
                }
            }

            if failure.is_some() {
                // Only events follow a failed command.
                queue.retain(|m| !m.is_command());
            }
        }

        metrics::histogram!("messagebus_dispatch_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        match failure {
            Some(err) => Err(err),
            None => Ok(outcomes),
        }
    }

    async fn handle_command(
        &self,
        command: Command,
        uow: &mut UnitOfWork<S>,
    ) -> Result<CommandOutcome> {
        let command_type = command.command_type();
        let handlers = self.registry.command_handlers(command_type);

        let [handler] = handlers else {
            tracing::error!(
                command_type,
                registrations = handlers.len(),
                "command must have exactly one handler"
            );
            return Err(ServiceError::UnregisteredMessageType {
                message_type: command_type.to_string(),
                registrations: handlers.len(),
            });
        };

        tracing::debug!(command_type, "handling command");
        handler.handle(command, uow).await.inspect_err(|err| {
            tracing::warn!(command_type, error = %err, "command failed");
            metrics::counter!("messagebus_command_failures_total", "message_type" => command_type)
                .increment(1);
        })
    }

    async fn handle_event(
        &self,
        event: &Event,
        uow: &mut UnitOfWork<S>,
        queue: &mut VecDeque<Message>,
    ) {
        let event_type = event.event_type();

        for handler in self.registry.event_handlers(event_type) {
            let name = handler.name();
            tracing::debug!(event_type, handler = name, "handling event");

            if let Err(err) = handler.handle(event, uow).await {
                tracing::error!(event_type, handler = name, error = %err, "event handler failed");
                metrics::counter!(
                    "messagebus_event_handler_failures_total",
                    "message_type" => event_type,
                    "handler" => name
                )
                .increment(1);
            }

            queue.extend(uow.collect_new_events().map(Message::Event));
        }
    }
}
