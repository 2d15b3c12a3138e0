//! Publisher trait and implementations.

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use domain::Event;

use crate::error::ServiceError;

/// Publishes events to other systems on a named channel.
#[async_trait]
pub trait Publisher: Send + Sync + 'static {
    async fn publish(&self, channel: &str, event: &Event) -> Result<(), ServiceError>;
}

/// Publisher that writes every event to the log as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, channel: &str, event: &Event) -> Result<(), ServiceError> {
        let payload =
            serde_json::to_string(event).map_err(|e| ServiceError::Publish(e.to_string()))?;
        tracing::info!(%channel, %payload, "event published");
        Ok(())
    }
}

#[derive(Debug, Default)]
struct InMemoryPublisherState {
    published: Vec<(String, Event)>,
    fail_on_publish: bool,
}

/// In-memory publisher for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPublisher {
    state: Arc<RwLock<InMemoryPublisherState>>,
}

impl InMemoryPublisher {
    /// Creates a new in-memory publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the publisher to fail every publish.
    pub fn set_fail_on_publish(&self, fail: bool) {
        self.state.write().unwrap().fail_on_publish = fail;
    }

    /// Returns every `(channel, event)` published so far.
    pub fn published(&self) -> Vec<(String, Event)> {
        self.state.read().unwrap().published.clone()
    }
}

#[async_trait]
impl Publisher for InMemoryPublisher {
    async fn publish(&self, channel: &str, event: &Event) -> Result<(), ServiceError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_publish {
            return Err(ServiceError::Publish(format!("channel {channel} unavailable")));
        }

        state.published.push((channel.to_string(), event.clone()));
        Ok(())
    }
}
