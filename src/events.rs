//! Index event broadcasting.
//!
//! A broadcast channel shared between the indexing pipeline and any number
//! of subscribers. Chunk-driven storage writes have no direct caller, so
//! their outcomes surface here; test code subscribes before driving writes
//! to observe them deterministically.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::index::IndexError;

/// Events observable through [`EventBroadcaster::subscribe`].
#[derive(Debug, Clone)]
pub enum IndexEvent {
    /// A direct entry committed successfully.
    Inserted { identifier: String },
    /// An asynchronous failure with no direct caller to report to.
    Error { source: Arc<IndexError> },
}

/// Fan-out sender for index events.
#[derive(Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<IndexEvent>,
}

impl EventBroadcaster {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Send an event to all subscribers. Dropped when nobody listens.
    pub fn send(&self, event: IndexEvent) {
        match self.sender.send(event.clone()) {
            Ok(count) => {
                crate::debug_event!("events", "sent", "{event:?} to {count} subscribers");
            }
            Err(_) => {
                crate::debug_event!("events", "dropped", "no subscribers for {event:?}");
            }
        }
    }

    /// Subscribe to receive events from this point on.
    pub fn subscribe(&self) -> broadcast::Receiver<IndexEvent> {
        self.sender.subscribe()
    }
}
