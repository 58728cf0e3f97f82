use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;

use std::sync::Arc;

use tally_core::{AggregateId, EventId, ExpectedVersion};
use tally_events::EventEnvelope;

/// An event ready to be appended to a stream (not yet assigned a sequence number).
///
/// Built from a typed domain event with [`UncommittedEvent::from_typed`], which
/// serializes the payload and captures the metadata needed to decode it again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UncommittedEvent {
    pub event_id: EventId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

/// A journaled event with its assigned position in the stream.
///
/// Sequence numbers start at 1, increase by one per event and are never
/// reused. A stream's version is the sequence number of its last event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredEvent {
    pub event_id: EventId,
    pub aggregate_id: AggregateId,
    pub aggregate_type: String,

    pub sequence_number: u64,

    pub event_type: String,
    pub event_version: u32,
    pub occurred_at: DateTime<Utc>,

    pub payload: JsonValue,
}

impl StoredEvent {
    /// Decode the JSON payload back into a typed envelope.
    pub fn decode<E>(&self) -> Result<EventEnvelope<E>, JournalError>
    where
        E: DeserializeOwned,
    {
        let payload: E = serde_json::from_value(self.payload.clone())
            .map_err(|e| JournalError::Deserialize(e.to_string()))?;

        Ok(EventEnvelope::new(
            self.event_id,
            self.aggregate_id,
            self.aggregate_type.clone(),
            self.sequence_number,
            payload,
        ))
    }
}

/// Journal operation error.
///
/// These are infrastructure failures. Callers surface them as retryable,
/// never as a rejected command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JournalError {
    #[error("optimistic concurrency check failed: {0}")]
    Concurrency(String),

    #[error("aggregate type mismatch: {0}")]
    AggregateTypeMismatch(String),

    #[error("invalid append: {0}")]
    InvalidAppend(String),

    #[error("payload deserialization failed: {0}")]
    Deserialize(String),

    #[error("journal unavailable: {0}")]
    Unavailable(String),
}

/// Append-only store of per-bill event streams.
///
/// `append`:
/// - requires every event in the batch to target the same aggregate
/// - checks `expected_version` against the current stream version
/// - assigns sequence numbers starting at `current_version + 1`
/// - stores the whole batch or nothing
///
/// `load_stream` returns the events of one stream in sequence order, or an
/// empty vector for an unknown stream.
pub trait EventJournal: Send + Sync {
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, JournalError>;

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, JournalError>;
}

impl<S> EventJournal for Arc<S>
where
    S: EventJournal + ?Sized,
{
    fn append(
        &self,
        events: Vec<UncommittedEvent>,
        expected_version: ExpectedVersion,
    ) -> Result<Vec<StoredEvent>, JournalError> {
        (**self).append(events, expected_version)
    }

    fn load_stream(&self, aggregate_id: AggregateId) -> Result<Vec<StoredEvent>, JournalError> {
        (**self).load_stream(aggregate_id)
    }
}

impl UncommittedEvent {
    pub fn from_typed<E>(
        aggregate_id: AggregateId,
        aggregate_type: impl Into<String>,
        event_id: EventId,
        event: &E,
    ) -> Result<Self, JournalError>
    where
        E: tally_events::Event + Serialize,
    {
        let payload = serde_json::to_value(event)
            .map_err(|e| JournalError::InvalidAppend(format!("payload serialization failed: {e}")))?;

        Ok(Self {
            event_id,
            aggregate_id,
            aggregate_type: aggregate_type.into(),
            event_type: event.event_type().to_string(),
            event_version: event.version(),
            occurred_at: event.occurred_at(),
            payload,
        })
    }
}
