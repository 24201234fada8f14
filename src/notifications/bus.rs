//! Broadcast channel carrying [`AppEvent`]s.

use tokio::sync::broadcast;
use tracing::debug;

use super::models::AppEvent;

const DEFAULT_CAPACITY: usize = 256;

/// Cheaply cloneable handle to the application event channel.
#[derive(Clone)]
pub struct EventBus {
    event_tx: broadcast::Sender<AppEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (event_tx, _) = broadcast::channel(capacity);
        Self { event_tx }
    }

    /// Subscribe to all events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<AppEvent> {
        self.event_tx.subscribe()
    }

    /// Publish an event. Having no subscriber is not an error.
    pub fn publish(&self, event: AppEvent) {
        if let Err(e) = self.event_tx.send(event) {
            debug!("No subscribers for event: {:?}", e.0);
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.event_tx.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
