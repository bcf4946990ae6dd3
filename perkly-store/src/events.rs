use perkly_shared::models::events::DomainEvent;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// In-process event bridge. Publishing never blocks and never fails the caller;
/// slow subscribers lag and lose the oldest events.
#[derive(Clone)]
pub struct EventPublisher {
    tx: broadcast::Sender<DomainEvent>,
}

impl EventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.tx.subscribe()
    }

    /// Returns how many subscribers received the event.
    pub fn publish(&self, event: DomainEvent) -> usize {
        let name = event.name();
        match self.tx.send(event) {
            Ok(receivers) => {
                debug!("Published {} to {} subscriber(s)", name, receivers);
                receivers
            }
            Err(_) => {
                debug!("Dropped {}: no subscribers", name);
                0
            }
        }
    }

    /// Subscriber that writes every event to the log until the publisher goes away.
    pub fn spawn_logger(&self) -> JoinHandle<()> {
        let mut rx = self.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(payload) => info!(event = event.name(), "{}", payload),
                        Err(e) => warn!("Failed to serialize {}: {}", event.name(), e),
                    },
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Event logger lagged, skipped {} events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
