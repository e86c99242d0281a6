//! Event publishing/subscription abstraction (mechanics only).
//!
//! The bus distributes events **after** they were appended to the ledger's
//! event store; the store stays the source of truth. Delivery is
//! at-least-once and subscribers must tolerate duplicates.

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use grouppool_core::LedgerId;

use crate::envelope::EventEnvelope;

/// A message that belongs to exactly one ledger stream.
pub trait LedgerScoped {
    fn ledger_id(&self) -> LedgerId;
}

impl<E> LedgerScoped for EventEnvelope<E> {
    fn ledger_id(&self) -> LedgerId {
        EventEnvelope::ledger_id(self)
    }
}

/// Which ledger streams a subscription listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    AllLedgers,
    Ledger(LedgerId),
}

impl Topic {
    pub fn covers(&self, ledger_id: LedgerId) -> bool {
        match self {
            Topic::AllLedgers => true,
            Topic::Ledger(id) => *id == ledger_id,
        }
    }
}

/// A subscription to the event stream.
///
/// Each subscription receives a copy of every message on its topic published
/// after it was created, in publication order.
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

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(
        &self,
        timeout: Duration,
    ) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }

    /// Drain everything currently buffered without blocking.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Transport-agnostic pub/sub bus with broadcast semantics.
///
/// `publish()` may fail; the caller decides whether to surface or retry.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self, topic: Topic) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self, topic: Topic) -> Subscription<M> {
        (**self).subscribe(topic)
    }
}
