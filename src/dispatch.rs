//! Event dispatcher and callback bridge.
//!
//! The registry maps subscription keys to subscriber channels. Delivery
//! crosses from the connection task into a per-subscription drain task
//! through an unbounded channel; the drain task invokes the handler.
//! This gives each subscription serial, ordered handler invocation (a
//! delivery waits for the previous one to complete) without ever
//! blocking the connection task, and keeps one slow subscriber from
//! stalling the others.
//!
//! Replacing a subscription closes the old channel: the old drain task
//! finishes whatever was already queued for it and exits, and every
//! later event goes to the replacement handler.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::error::Result;
use crate::event::{EventKey, EventPayload};

/// Subscriber callback.
///
/// Receives the decoded payload, or the decode failure for this
/// subscription's event kind. Invocations for one subscription are never
/// concurrent with each other. Returning `Err` reports a handler fault
/// to the diagnostic log; it does not cancel the subscription.
pub type EventHandler = Box<dyn FnMut(Result<EventPayload>) -> Result<()> + Send + 'static>;

/// Per-event-type (and per-pin, for GPIO) subscription registry.
pub struct SubscriptionRegistry {
    subs: HashMap<EventKey, mpsc::UnboundedSender<Result<EventPayload>>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            subs: HashMap::new(),
        }
    }

    /// Register a handler for a key, replacing any previous one.
    ///
    /// Spawns the subscription's drain task. Must be called from within
    /// a tokio runtime.
    pub fn insert(&mut self, key: EventKey, handler: EventHandler) {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(drain(key, rx, handler));
        if self.subs.insert(key, tx).is_some() {
            tracing::debug!(?key, "subscription replaced");
        }
    }

    /// Remove a subscription; no-op if absent.
    pub fn remove(&mut self, key: &EventKey) -> bool {
        self.subs.remove(key).is_some()
    }

    /// Hand an event (or its decode failure) to the matching subscriber.
    ///
    /// Returns `false` when nothing is registered under the key; such
    /// events are simply discarded by the caller.
    pub fn deliver(&mut self, key: EventKey, event: Result<EventPayload>) -> bool {
        match self.subs.get(&key) {
            Some(tx) => {
                if tx.send(event).is_err() {
                    // drain task died (handler panicked); drop the dead entry
                    tracing::error!(?key, "subscriber task gone, dropping subscription");
                    self.subs.remove(&key);
                }
                true
            }
            None => false,
        }
    }

    /// Number of live subscriptions.
    pub fn len(&self) -> usize {
        self.subs.len()
    }

    /// Check if no subscriptions are registered.
    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Drain loop for one subscription: dequeue, invoke, repeat.
async fn drain(
    key: EventKey,
    mut rx: mpsc::UnboundedReceiver<Result<EventPayload>>,
    mut handler: EventHandler,
) {
    while let Some(event) = rx.recv().await {
        if let Err(e) = handler(event) {
            tracing::error!(?key, "event handler failed: {e}");
        }
    }
    tracing::trace!(?key, "subscription drained");
}
