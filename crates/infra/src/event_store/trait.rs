use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use uuid::Uuid;

use grouppool_core::{ExpectedVersion, LedgerId};
use std::sync::Arc;

/// An event ready to be appended to a ledger stream (no sequence number yet).
///
/// Built from a typed ledger event with `UncommittedEvent::from_typed()`,
/// which serializes the payload to JSON and captures the event metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: Uuid,
    pub ledger_id: LedgerId,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// A persisted event with its assigned position in the ledger stream.
///
/// Sequence numbers start at 1 and increase by exactly one per event, so the
/// last sequence number is also the stream version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: Uuid,
    pub ledger_id: LedgerId,

    /// Monotonically increasing position in the ledger stream.
    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    pub fn stream_version(&self) -> u64 {
        self.sequence_number
    }

    /// Convert a stored event into an envelope for publication.
    pub fn to_envelope(&self) -> grouppool_events::EventEnvelope<JsonValue> {
        grouppool_events::EventEnvelope::new(
            self.event_id,
            self.ledger_id,
            self.event_type.clone(),
            self.sequence_number,
            self.occurred_at,
            self.payload.clone(),
        )
    }
}

/// Event store operation error (infrastructure, not ledger rules).
#[derive(Debug, Error)]
pub enum EventStoreError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Append-only store of ledger streams.
///
/// Implementations must:
/// - reject batches that mix ledgers
/// - enforce optimistic concurrency against the current stream version
/// - assign `sequence_number`s starting at `current_version + 1`
/// - persist a batch atomically (all events or none)
pub trait EventStore: Send + Sync {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Load the full stream, in sequence order. Unknown ledgers yield an empty stream.
    fn load_stream(&self, ledger_id: LedgerId) -> Result<Vec<StoredEvent>, EventStoreError>;

    /// Identifiers of every ledger with at least one stored event.
    fn ledger_ids(&self) -> Result<Vec<LedgerId>, EventStoreError>;
}

impl<S> EventStore for Arc<S>
where
    S: EventStore + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).append(events, expected_version)
    }

    fn load_stream(&self, ledger_id: LedgerId) -> Result<Vec<StoredEvent>, EventStoreError> {
        (**self).load_stream(ledger_id)
    }

    fn ledger_ids(&self) -> Result<Vec<LedgerId>, EventStoreError> {
        (**self).ledger_ids()
    }
}

impl UncommittedEvent {
    /// Wrap a typed ledger event, serializing it to a JSON payload.
    pub fn from_typed<E>(
        ledger_id: LedgerId,
        event_id: Uuid,
        event: &E,
    ) -> Result<Self, EventStoreError>
    where
        E: grouppool_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event).map_err(|e| {
            EventStoreError::InvalidAppend(format!("payload serialization failed: {e}"))
        })?;

        Ok(Self {
            event_id,
            ledger_id,
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}
