//! Event store abstraction.
//!
//! Backing stores implement five primitives (`stream_exists`,
//! `create_stream`, `stream_version`, `read_events`, `append_events`); the
//! provided `load_from`, `load_to` and `store` methods layer argument
//! validation and optimistic concurrency on top of them.

use async_trait::async_trait;

use crate::error::{DomainError, LoadRangeError};
use crate::event::Event;
use crate::identity::AggregateId;
use crate::store_stream::StoreStream;
use crate::stream::EventStream;
use crate::version::Version;

/// Checks that `events` continue a stream currently at `current` without
/// gaps or reordering.
///
/// # Errors
///
/// Returns `DomainError::OutOfSequence` naming the first offending version.
pub fn ensure_contiguous(
    aggregate_id: &AggregateId,
    current: Version,
    events: &[Event],
) -> Result<(), DomainError> {
    let mut expected = current.next();
    for event in events {
        if event.aggregate_version() != expected {
            return Err(DomainError::OutOfSequence {
                aggregate_id: aggregate_id.clone(),
                version: event.aggregate_version(),
            });
        }
        expected = expected.next();
    }
    Ok(())
}

/// Append-only, per-aggregate event log with optimistic concurrency.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Returns `true` if the stream has been created.
    async fn stream_exists(&self, stream: &StoreStream) -> Result<bool, DomainError>;

    /// Creates an empty stream at version 0.
    async fn create_stream(&self, stream: &StoreStream) -> Result<(), DomainError>;

    /// Returns the version of the last stored event, or 0.
    async fn stream_version(&self, stream: &StoreStream) -> Result<Version, DomainError>;

    /// Reads events with versions in `[from, to]`, or from `from` onwards.
    async fn read_events(
        &self,
        stream: &StoreStream,
        from: Version,
        to: Option<Version>,
    ) -> Result<EventStream, DomainError>;

    /// Appends a contiguous batch atomically: either every event is written
    /// or the stream is left untouched.
    async fn append_events(&self, stream: &StoreStream, events: &[Event])
    -> Result<(), DomainError>;

    /// Loads events starting at `from_version`, at most `count` of them.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidLoadVersion` if `from_version` is 0 or
    /// `DomainError::InvalidLoadCount` if `count` is 0.
    async fn load_from(
        &self,
        stream: &StoreStream,
        from_version: Version,
        count: Option<u64>,
    ) -> Result<EventStream, DomainError> {
        if from_version.is_zero() {
            return Err(DomainError::InvalidLoadVersion(from_version));
        }
        if let Some(count @ 0) = count {
            return Err(DomainError::InvalidLoadCount(count));
        }
        if !self.stream_exists(stream).await? {
            self.create_stream(stream).await?;
            return Ok(EventStream::empty());
        }
        let to = count.map(|count| Version::new(from_version.value().saturating_add(count - 1)));
        self.read_events(stream, from_version, to).await
    }

    /// Loads events up to and including `to_version`, starting at
    /// `from_version` (1 when omitted).
    ///
    /// # Errors
    ///
    /// Returns `DomainError::InvalidLoadRange` naming the violated bound.
    async fn load_to(
        &self,
        stream: &StoreStream,
        to_version: Version,
        from_version: Option<Version>,
    ) -> Result<EventStream, DomainError> {
        if to_version.is_zero() {
            return Err(DomainError::InvalidLoadRange(LoadRangeError::ToVersion(
                to_version,
            )));
        }
        let from_version = from_version.unwrap_or(Version::FIRST);
        if from_version.is_zero() {
            return Err(DomainError::InvalidLoadRange(LoadRangeError::FromVersion(
                from_version,
            )));
        }
        if from_version > to_version {
            return Err(DomainError::InvalidLoadRange(LoadRangeError::FromAfterTo {
                from: from_version,
                to: to_version,
            }));
        }
        if !self.stream_exists(stream).await? {
            self.create_stream(stream).await?;
            return Ok(EventStream::empty());
        }
        self.read_events(stream, from_version, Some(to_version))
            .await
    }

    /// Appends `events` if the stream is still at `expected_version`.
    ///
    /// The stream version is checked before the append and again after it;
    /// a writer that slipped in between is reported rather than lost.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::ConcurrencyConflict` if the stream moved away
    /// from `expected_version`, or `DomainError::OutOfSequence` if the batch
    /// is gapped or out of order.
    async fn store(
        &self,
        stream: &StoreStream,
        events: EventStream,
        expected_version: Version,
    ) -> Result<(), DomainError> {
        let events = events.into_events();
        let Some(last) = events.last().map(Event::aggregate_version) else {
            return Ok(());
        };
        if !self.stream_exists(stream).await? {
            self.create_stream(stream).await?;
        }
        let current = self.stream_version(stream).await?;
        if current != expected_version {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id: stream.aggregate_id().clone(),
                expected: expected_version,
                actual: current,
            });
        }
        ensure_contiguous(stream.aggregate_id(), current, &events)?;
        self.append_events(stream, &events).await?;
        let stored = self.stream_version(stream).await?;
        if stored != last {
            return Err(DomainError::ConcurrencyConflict {
                aggregate_id: stream.aggregate_id().clone(),
                expected: last,
                actual: stored,
            });
        }
        tracing::debug!(stream = %stream, from = %current, to = %last, "stored events");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use crate::testing::{Incremented, Tally, persisted};

    /// Reports scripted stream versions, simulating a writer that slips in
    /// between the pre-append check and the append.
    struct RacingStore {
        versions: Mutex<VecDeque<Version>>,
    }

    #[async_trait]
    impl EventStore for RacingStore {
        async fn stream_exists(&self, _stream: &StoreStream) -> Result<bool, DomainError> {
            Ok(true)
        }

        async fn create_stream(&self, _stream: &StoreStream) -> Result<(), DomainError> {
            Ok(())
        }

        async fn stream_version(&self, _stream: &StoreStream) -> Result<Version, DomainError> {
            Ok(self.versions.lock().unwrap().pop_front().unwrap_or_default())
        }

        async fn read_events(
            &self,
            _stream: &StoreStream,
            _from: Version,
            _to: Option<Version>,
        ) -> Result<EventStream, DomainError> {
            Ok(EventStream::empty())
        }

        async fn append_events(
            &self,
            _stream: &StoreStream,
            _events: &[Event],
        ) -> Result<(), DomainError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_interleaved_writer_is_detected_after_append() {
        // Arrange
        let store = RacingStore {
            versions: Mutex::new(VecDeque::from([Version::ZERO, Version::new(2)])),
        };
        let stream = StoreStream::of::<Tally>(AggregateId::new("T1"));
        let events = EventStream::from_events(vec![persisted("T1", 1, &Incremented { by: 1 })]);

        // Act
        let result = store.store(&stream, events, Version::ZERO).await;

        // Assert
        match result {
            Err(DomainError::ConcurrencyConflict {
                expected, actual, ..
            }) => {
                assert_eq!(expected, Version::FIRST);
                assert_eq!(actual, Version::new(2));
            }
            other => panic!("expected ConcurrencyConflict, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stale_expected_version_is_rejected_before_append() {
        let store = RacingStore {
            versions: Mutex::new(VecDeque::from([Version::new(3)])),
        };
        let stream = StoreStream::of::<Tally>(AggregateId::new("T1"));
        let events = EventStream::from_events(vec![persisted("T1", 2, &Incremented { by: 1 })]);

        let result = store.store(&stream, events, Version::FIRST).await;

        assert!(matches!(
            result,
            Err(DomainError::ConcurrencyConflict { expected, actual, .. })
                if expected == Version::FIRST && actual == Version::new(3)
        ));
    }

    #[test]
    fn test_contiguous_batch_is_accepted() {
        let events = vec![
            persisted("T1", 3, &Incremented { by: 1 }),
            persisted("T1", 4, &Incremented { by: 1 }),
        ];

        assert!(ensure_contiguous(&AggregateId::new("T1"), Version::new(2), &events).is_ok());
    }

    #[test]
    fn test_gapped_batch_names_offending_version() {
        let events = vec![
            persisted("T1", 1, &Incremented { by: 1 }),
            persisted("T1", 3, &Incremented { by: 1 }),
        ];

        let result = ensure_contiguous(&AggregateId::new("T1"), Version::ZERO, &events);

        match result {
            Err(DomainError::OutOfSequence { version, .. }) => assert_eq!(version, Version::new(3)),
            other => panic!("expected OutOfSequence, got {other:?}"),
        }
    }

    #[test]
    fn test_batch_must_follow_current_version() {
        let events = vec![persisted("T1", 1, &Incremented { by: 1 })];

        let result = ensure_contiguous(&AggregateId::new("T1"), Version::new(4), &events);

        assert!(matches!(result, Err(DomainError::OutOfSequence { .. })));
    }
}
