//! Event publishing/subscription abstraction (mechanics only).
//!
//! - **Transport-agnostic**: in-memory channels today, a broker later
//! - **At-least-once**: consumers must be idempotent
//! - **No persistence**: the store is the source of truth; the bus only distributes

use std::sync::Arc;
use std::sync::mpsc::Receiver;

use serde::Serialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::envelope::EventEnvelope;
use crate::event::Event;

/// A subscription to an event stream (broadcast semantics: every subscriber
/// receives every message published after it subscribed).
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Drain everything currently queued.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Domain-agnostic event bus (pub/sub abstraction).
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}

/// Publish a committed domain event, logging (never propagating) failures.
///
/// Called after the store has committed; a publication failure must not turn a
/// successful mutation into an error for the caller.
pub fn publish_best_effort<B, E>(bus: &B, aggregate_id: Uuid, aggregate_type: &str, event: &E)
where
    B: EventBus<EventEnvelope<JsonValue>> + ?Sized,
    E: Event + Serialize,
{
    let envelope = match EventEnvelope::from_typed(aggregate_id, aggregate_type, event) {
        Ok(envelope) => envelope,
        Err(err) => {
            tracing::warn!(event_type = event.event_type(), error = %err, "event serialization failed");
            return;
        }
    };

    if let Err(err) = bus.publish(envelope) {
        tracing::warn!(event_type = event.event_type(), error = ?err, "event publication failed");
    }
}
