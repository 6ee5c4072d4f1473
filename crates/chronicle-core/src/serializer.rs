//! Aggregate serialization for snapshots.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::aggregate::AggregateRoot;
use crate::error::DomainError;

/// Converts aggregates to bytes and back.
///
/// Aggregates with pending recorded events are never serialized.
pub trait AggregateSerializer<A: AggregateRoot>: Send + Sync {
    /// Serializes a fully persisted aggregate.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::CannotSerializeWithPendingEvents` if the aggregate
    /// has pending events, or `DomainError::Serialization` on codec failure.
    fn serialize(&self, aggregate: &A) -> Result<Vec<u8>, DomainError>;

    /// Deserializes an aggregate.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::WrongAggregateType` if the bytes hold another
    /// aggregate type, or `DomainError::Serialization` on codec failure.
    fn deserialize(&self, bytes: &[u8]) -> Result<A, DomainError>;
}

#[derive(Serialize)]
struct EnvelopeRef<'a, A> {
    aggregate_type: &'a str,
    aggregate: &'a A,
}

#[derive(Deserialize)]
struct Envelope {
    aggregate_type: String,
    aggregate: serde_json::Value,
}

/// JSON serializer wrapping the aggregate in a typed envelope.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonAggregateSerializer;

impl<A> AggregateSerializer<A> for JsonAggregateSerializer
where
    A: AggregateRoot + Serialize + DeserializeOwned,
{
    fn serialize(&self, aggregate: &A) -> Result<Vec<u8>, DomainError> {
        if aggregate.has_pending_events() {
            return Err(DomainError::CannotSerializeWithPendingEvents {
                pending: aggregate.recorded_events().len(),
            });
        }
        serde_json::to_vec(&EnvelopeRef {
            aggregate_type: A::aggregate_type(),
            aggregate,
        })
        .map_err(|e| DomainError::Serialization(format!("aggregate serialization failed: {e}")))
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<A, DomainError> {
        let envelope: Envelope = serde_json::from_slice(bytes)
            .map_err(|e| DomainError::Serialization(format!("invalid serialized aggregate: {e}")))?;
        if envelope.aggregate_type != A::aggregate_type() {
            return Err(DomainError::WrongAggregateType {
                expected: A::aggregate_type().to_owned(),
                actual: envelope.aggregate_type,
            });
        }
        serde_json::from_value(envelope.aggregate)
            .map_err(|e| DomainError::Serialization(format!("invalid serialized aggregate: {e}")))
    }
}
