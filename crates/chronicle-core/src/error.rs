//! Domain error types.

use thiserror::Error;

use crate::identity::AggregateId;
use crate::version::Version;

/// Top-level domain error type.
///
/// Only `ConcurrencyConflict` is worth retrying (reload, reapply, save
/// again); `AggregateNotFound` separates "does not exist" from failures; every
/// other variant reports a sequencing or wiring bug in the caller.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A version value is out of range.
    #[error("invalid version: {0}")]
    InvalidVersion(String),

    /// A persisted event must carry a non-zero version.
    #[error("event {event_type} of aggregate {aggregate_id} requires a non-zero version")]
    InvalidAggregateVersion {
        /// The aggregate the event belongs to.
        aggregate_id: AggregateId,
        /// The event type discriminator.
        event_type: String,
    },

    /// An event's version may only be assigned once.
    #[error("event {event_type} of aggregate {aggregate_id} is already at version {version}")]
    EventAlreadyVersioned {
        /// The aggregate the event belongs to.
        aggregate_id: AggregateId,
        /// The event type discriminator.
        event_type: String,
        /// The version the event already carries.
        version: Version,
    },

    /// An event stream slot was read where no event exists.
    #[error("invalid aggregate event: {0}")]
    InvalidAggregateEvent(String),

    /// An aggregate cannot be reconstituted without history.
    #[error("cannot reconstitute {aggregate_type} from an empty event stream")]
    EmptyEventStream {
        /// The aggregate type being reconstituted.
        aggregate_type: &'static str,
    },

    /// A replayed event does not directly follow the aggregate's version.
    #[error("aggregate version mismatch: expected event version {expected}, got {actual}")]
    VersionMismatch {
        /// The version the next event must carry.
        expected: Version,
        /// The version the event actually carries.
        actual: Version,
    },

    /// Only unversioned events can be recorded.
    #[error("only new events can be recorded, {event_type} already carries version {version}")]
    OnlyNewEventsRecordable {
        /// The event type discriminator.
        event_type: String,
        /// The version the event carries.
        version: Version,
    },

    /// No apply handler is registered for an event type.
    #[error("aggregate event handler {handler} for event {event_type} does not exist")]
    NoApplyHandler {
        /// The derived handler name.
        handler: String,
        /// The event type discriminator.
        event_type: String,
    },

    /// An aggregate's identity may only be assigned once.
    #[error("aggregate identity is already {current}, cannot reassign to {attempted}")]
    IdentityAlreadyAssigned {
        /// The identity already held.
        current: AggregateId,
        /// The identity that was offered.
        attempted: AggregateId,
    },

    /// The aggregate has no identity yet.
    #[error("{aggregate_type} has no identity assigned")]
    UnidentifiedAggregate {
        /// The aggregate type.
        aggregate_type: &'static str,
    },

    /// Aggregates with unpersisted events cannot be serialized.
    #[error("cannot serialize an aggregate with {pending} pending recorded events")]
    CannotSerializeWithPendingEvents {
        /// Number of pending events.
        pending: usize,
    },

    /// Snapshots must not carry unpersisted events.
    #[error("cannot snapshot an aggregate with {pending} pending recorded events")]
    SnapshotHasPendingEvents {
        /// Number of pending events.
        pending: usize,
    },

    /// An aggregate of an unexpected type was encountered.
    #[error("aggregate root should be a {expected}, {actual} given")]
    WrongAggregateType {
        /// The type the stream declares.
        expected: String,
        /// The type that was found.
        actual: String,
    },

    /// Loads must start at version 1 or later.
    #[error("event store load from version must be at least 1, {0} given")]
    InvalidLoadVersion(Version),

    /// Bounded loads must request at least one event.
    #[error("event store load count must be at least 1, {0} given")]
    InvalidLoadCount(u64),

    /// A bounded range load was malformed.
    #[error("invalid event store load range: {0}")]
    InvalidLoadRange(LoadRangeError),

    /// Optimistic concurrency conflict.
    #[error("concurrency conflict on aggregate {aggregate_id}: expected version {expected}, found {actual}")]
    ConcurrencyConflict {
        /// The aggregate that had the conflict.
        aggregate_id: AggregateId,
        /// The expected version.
        expected: Version,
        /// The actual version found.
        actual: Version,
    },

    /// A batch is gapped or out of order relative to the stream.
    #[error("event stream of aggregate {aggregate_id} cannot be stored: version {version} is out of sequence")]
    OutOfSequence {
        /// The aggregate whose stream was written.
        aggregate_id: AggregateId,
        /// The offending event version.
        version: Version,
    },

    /// An aggregate was not found.
    #[error("aggregate root from identity {0} not found")]
    AggregateNotFound(AggregateId),

    /// An event payload could not be encoded or decoded.
    #[error("payload error: {0}")]
    Payload(String),

    /// An aggregate could not be serialized or deserialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An infrastructure/persistence error.
    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl DomainError {
    /// Returns `true` when the caller should reload, reapply and retry.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::ConcurrencyConflict { .. })
    }

    /// Returns `true` for `AggregateNotFound`.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::AggregateNotFound(_))
    }
}

/// The bound a `load_to` range violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LoadRangeError {
    /// The upper bound is below 1.
    #[error("load to version must be at least 1, {0} given")]
    ToVersion(Version),

    /// The lower bound is below 1.
    #[error("load from version must be at least 1, {0} given")]
    FromVersion(Version),

    /// The lower bound lies past the upper bound.
    #[error("load to version {to} must not be lower than from version {from}")]
    FromAfterTo {
        /// Lower bound.
        from: Version,
        /// Upper bound.
        to: Version,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_concurrency_conflicts_are_retriable() {
        let conflict = DomainError::ConcurrencyConflict {
            aggregate_id: AggregateId::new("U1"),
            expected: Version::ZERO,
            actual: Version::FIRST,
        };
        let not_found = DomainError::AggregateNotFound(AggregateId::new("U1"));

        assert!(conflict.is_retriable());
        assert!(!not_found.is_retriable());
        assert!(not_found.is_not_found());
        assert!(!DomainError::InvalidLoadCount(0).is_retriable());
    }

    #[test]
    fn test_version_mismatch_message_names_both_versions() {
        let error = DomainError::VersionMismatch {
            expected: Version::new(2),
            actual: Version::new(5),
        };

        assert_eq!(
            error.to_string(),
            "aggregate version mismatch: expected event version 2, got 5"
        );
    }

    #[test]
    fn test_load_range_message_names_bounds() {
        let error = DomainError::InvalidLoadRange(LoadRangeError::FromAfterTo {
            from: Version::new(10),
            to: Version::FIRST,
        });

        assert_eq!(
            error.to_string(),
            "invalid event store load range: load to version 1 must not be lower than from version 10"
        );
    }
}
