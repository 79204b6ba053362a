/// Event sinks
///
/// [`EventSink`] is the one-way boundary services emit through. The production
/// sink fans envelopes out over a `tokio::sync::broadcast` channel; any number
/// of listeners can subscribe, and emitting with no listener is not an error.
///
/// # Example
///
/// ```no_run
/// use orgdesk_shared::events::{spawn_event_logger, BroadcastEventSink, DomainEvent, EventSink};
///
/// # async fn example() {
/// let sink = BroadcastEventSink::new(256);
/// let logger = spawn_event_logger(sink.subscribe());
///
/// sink.emit(DomainEvent::UserVerified { user_id: 7 });
/// # }
/// ```

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{DomainEvent, EventEnvelope};

/// Receives domain events; never blocks and never fails the caller
pub trait EventSink: Send + Sync {
    fn emit(&self, event: DomainEvent);
}

/// Broadcast-channel sink
#[derive(Debug, Clone)]
pub struct BroadcastEventSink {
    sender: broadcast::Sender<EventEnvelope>,
}

impl BroadcastEventSink {
    /// `capacity` is how many envelopes a slow subscriber may fall behind
    /// before it starts missing events
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }
}

impl EventSink for BroadcastEventSink {
    fn emit(&self, event: DomainEvent) {
        let envelope = EventEnvelope::new(event);
        let name = envelope.event.name();
        let id = envelope.id;

        match self.sender.send(envelope) {
            Ok(receivers) => debug!(event = name, %id, receivers, "Event emitted"),
            Err(_) => debug!(event = name, %id, "Event emitted with no subscribers"),
        }
    }
}

/// Logs every envelope received on `receiver` until the channel closes
pub fn spawn_event_logger(mut receiver: broadcast::Receiver<EventEnvelope>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(envelope) => {
                    let payload = serde_json::to_string(&envelope.event).unwrap_or_default();
                    info!(
                        event = envelope.event.name(),
                        id = %envelope.id,
                        actor_id = envelope.event.actor_id(),
                        %payload,
                        "Domain event"
                    );
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Event logger fell behind; events were dropped");
                }
                Err(RecvError::Closed) => {
                    debug!("Event channel closed; stopping event logger");
                    break;
                }
            }
        }
    })
}
