//! In-memory event bus for tests/dev.

use std::sync::{Mutex, mpsc};

use crate::bus::{EventBus, LedgerScoped, Subscription, Topic};

#[derive(Debug)]
pub enum InMemoryBusError {
    /// Publish failed due to internal lock poisoning.
    Poisoned,
}

#[derive(Debug)]
struct Subscriber<M> {
    topic: Topic,
    tx: mpsc::Sender<M>,
}

/// In-memory pub/sub bus routing ledger envelopes by stream.
///
/// A subscriber is found dead when a message on its topic cannot be
/// delivered, and is removed then. Subscribers to a quiet ledger linger
/// until that ledger publishes again.
#[derive(Debug)]
pub struct InMemoryEventBus<M> {
    subscribers: Mutex<Vec<Subscriber<M>>>,
}

impl<M> InMemoryEventBus<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registered subscribers, including dead ones not yet pruned.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().map(|subs| subs.len()).unwrap_or(0)
    }
}

impl<M> Default for InMemoryEventBus<M> {
    fn default() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl<M> EventBus<M> for InMemoryEventBus<M>
where
    M: LedgerScoped + Clone + Send + 'static,
{
    type Error = InMemoryBusError;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        let ledger_id = message.ledger_id();
        let mut subs = self
            .subscribers
            .lock()
            .map_err(|_| InMemoryBusError::Poisoned)?;

        subs.retain(|sub| !sub.topic.covers(ledger_id) || sub.tx.send(message.clone()).is_ok());

        Ok(())
    }

    fn subscribe(&self, topic: Topic) -> Subscription<M> {
        let (tx, rx) = mpsc::channel();

        // A poisoned lock still hands back a subscription; it just never fires.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(Subscriber { topic, tx });
        }

        Subscription::new(rx)
    }
}
