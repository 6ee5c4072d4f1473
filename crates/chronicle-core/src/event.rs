//! Aggregate event abstractions.

use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::clock::Clock;
use crate::error::DomainError;
use crate::identity::AggregateId;
use crate::version::Version;

const CORRELATION_ID: &str = "correlation_id";
const CAUSATION_ID: &str = "causation_id";
const USER_ID: &str = "user_id";

/// Returns a type's name with its module path and generic arguments removed.
#[must_use]
pub fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let without_generics = full.split('<').next().unwrap_or(full);
    without_generics
        .rsplit("::")
        .next()
        .unwrap_or(without_generics)
}

/// Semantic key-value bag describing what happened.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    /// Creates an empty payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the payload with `key` set to `value`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Encodes a serializable value into a payload.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Payload` if the value does not serialize to a
    /// JSON object (or unit).
    pub fn encode<E: Serialize + ?Sized>(value: &E) -> Result<Self, DomainError> {
        let value = serde_json::to_value(value)
            .map_err(|e| DomainError::Payload(format!("payload encoding failed: {e}")))?;
        Self::from_value(value)
    }

    /// Decodes the payload into a typed value.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Payload` if the payload does not match `E`.
    pub fn decode<E: DeserializeOwned>(&self) -> Result<E, DomainError> {
        match serde_json::from_value(Value::Object(self.0.clone())) {
            Ok(decoded) => Ok(decoded),
            // Unit structs encode as `null`.
            Err(_) if self.0.is_empty() => serde_json::from_value(Value::Null)
                .map_err(|e| DomainError::Payload(format!("payload decoding failed: {e}"))),
            Err(e) => Err(DomainError::Payload(format!("payload decoding failed: {e}"))),
        }
    }

    /// Builds a payload from a JSON object; `null` yields an empty payload.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Payload` for any other JSON value.
    pub fn from_value(value: Value) -> Result<Self, DomainError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(DomainError::Payload(format!(
                "payload must be a JSON object, got {other}"
            ))),
        }
    }

    /// Returns the payload as a JSON object.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns a read-only view of the entries.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the payload has no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Cross-cutting key-value bag (correlation, causation, user).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(Map<String, Value>);

impl Metadata {
    /// Creates empty metadata.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the metadata with `key` set to `value`.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Returns the metadata with a correlation ID.
    #[must_use]
    pub fn with_correlation_id(self, correlation_id: Uuid) -> Self {
        self.with(CORRELATION_ID, correlation_id.to_string())
    }

    /// Returns the metadata with a causation ID.
    #[must_use]
    pub fn with_causation_id(self, causation_id: Uuid) -> Self {
        self.with(CAUSATION_ID, causation_id.to_string())
    }

    /// Returns the metadata with the acting user.
    #[must_use]
    pub fn with_user_id(self, user_id: impl Into<String>) -> Self {
        self.with(USER_ID, user_id.into())
    }

    /// Correlation ID for tracing a command through its effects.
    #[must_use]
    pub fn correlation_id(&self) -> Option<Uuid> {
        self.uuid(CORRELATION_ID)
    }

    /// Causation ID linking to the causing event/command.
    #[must_use]
    pub fn causation_id(&self) -> Option<Uuid> {
        self.uuid(CAUSATION_ID)
    }

    /// The acting user, if recorded.
    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.0.get(USER_ID).and_then(Value::as_str)
    }

    fn uuid(&self, key: &str) -> Option<Uuid> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }

    /// Builds metadata from a JSON object; `null` yields empty metadata.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Payload` for any other JSON value.
    pub fn from_value(value: Value) -> Result<Self, DomainError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(DomainError::Payload(format!(
                "metadata must be a JSON object, got {other}"
            ))),
        }
    }

    /// Returns the metadata as a JSON object.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    /// Returns the value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns a read-only view of the entries.
    #[must_use]
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Returns `true` if no metadata is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Trait for typed domain events carried in an event payload.
pub trait DomainEvent: Serialize + DeserializeOwned + Send + Sync + std::fmt::Debug {
    /// Returns the event type name (used for apply dispatch and storage).
    #[must_use]
    fn event_type() -> &'static str
    where
        Self: Sized,
    {
        short_type_name::<Self>()
    }
}

/// An immutable fact about one aggregate.
///
/// Every field but the version is fixed at construction. Events built in
/// memory carry `Version::ZERO` until an aggregate records them; events
/// read back from storage always carry their assigned version.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    aggregate_id: AggregateId,
    version: Version,
    event_type: String,
    payload: Payload,
    metadata: Metadata,
    created_at: DateTime<Utc>,
}

impl Event {
    /// Creates a new, unversioned event from a typed domain event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Payload` if `event` does not encode to an object.
    pub fn occurred<E: DomainEvent>(
        aggregate_id: AggregateId,
        event: &E,
        clock: &dyn Clock,
    ) -> Result<Self, DomainError> {
        Ok(Self::occurred_raw(
            E::event_type(),
            aggregate_id,
            Payload::encode(event)?,
            clock,
        ))
    }

    /// Creates a new, unversioned event from a raw payload.
    #[must_use]
    pub fn occurred_raw(
        event_type: impl Into<String>,
        aggregate_id: AggregateId,
        payload: Payload,
        clock: &dyn Clock,
    ) -> Self {
        Self {
            aggregate_id,
            version: Version::ZERO,
            event_type: event_type.into(),
            payload,
            metadata: Metadata::new(),
            created_at: clock.now().with_timezone(&Utc),
        }
    }

    /// Rebuilds a persisted event with all fields supplied.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidAggregateVersion` if `version` is zero.
    pub fn reconstitute<Tz: TimeZone>(
        event_type: impl Into<String>,
        aggregate_id: AggregateId,
        version: Version,
        payload: Payload,
        metadata: Metadata,
        created_at: DateTime<Tz>,
    ) -> Result<Self, DomainError> {
        let event_type = event_type.into();
        if version.is_zero() {
            return Err(DomainError::InvalidAggregateVersion {
                aggregate_id,
                event_type,
            });
        }
        Ok(Self {
            aggregate_id,
            version,
            event_type,
            payload,
            metadata,
            created_at: created_at.with_timezone(&Utc),
        })
    }

    /// Returns the event with its metadata replaced.
    #[must_use]
    pub fn with_metadata(self, metadata: Metadata) -> Self {
        Self { metadata, ..self }
    }

    /// Returns a copy of this event positioned at `version`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::EventAlreadyVersioned` if the event already has a
    /// version, or `DomainError::InvalidAggregateVersion` if `version` is zero.
    pub fn with_version(&self, version: Version) -> Result<Self, DomainError> {
        if !self.version.is_zero() {
            return Err(DomainError::EventAlreadyVersioned {
                aggregate_id: self.aggregate_id.clone(),
                event_type: self.event_type.clone(),
                version: self.version,
            });
        }
        if version.is_zero() {
            return Err(DomainError::InvalidAggregateVersion {
                aggregate_id: self.aggregate_id.clone(),
                event_type: self.event_type.clone(),
            });
        }
        Ok(Self {
            version,
            ..self.clone()
        })
    }

    /// Decodes the payload as a typed domain event.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Payload` if the payload does not match `E`.
    pub fn payload_as<E: DomainEvent>(&self) -> Result<E, DomainError> {
        self.payload.decode()
    }

    /// Returns `true` if this event carries `E`'s type discriminator.
    #[must_use]
    pub fn is<E: DomainEvent>(&self) -> bool {
        self.event_type == E::event_type()
    }

    /// The aggregate this event belongs to.
    #[must_use]
    pub fn aggregate_id(&self) -> &AggregateId {
        &self.aggregate_id
    }

    /// Position in the aggregate stream; zero while unpersisted.
    #[must_use]
    pub fn aggregate_version(&self) -> Version {
        self.version
    }

    /// The event type discriminator.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// The event payload.
    #[must_use]
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// The event metadata.
    #[must_use]
    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Creation instant, in UTC.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}
