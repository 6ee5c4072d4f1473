//! In-memory event store.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use tracing::instrument;

use chronicle_core::error::DomainError;
use chronicle_core::event::Event;
use chronicle_core::event_store::EventStore;
use chronicle_core::store_stream::StoreStream;
use chronicle_core::stream::EventStream;
use chronicle_core::version::Version;

use crate::append::admit;

/// Event store holding every stream in process memory, keyed by stream id.
///
/// Appends take the write lock for the whole check-and-extend, so a rejected
/// batch never becomes visible.
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    streams: RwLock<HashMap<String, Vec<Event>>>,
}

impl InMemoryEventStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> DomainError {
    DomainError::Infrastructure("in-memory event store lock poisoned".into())
}

fn last_version(events: &[Event]) -> Version {
    events
        .last()
        .map_or(Version::ZERO, Event::aggregate_version)
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn stream_exists(&self, stream: &StoreStream) -> Result<bool, DomainError> {
        let streams = self.streams.read().map_err(|_| poisoned())?;
        Ok(streams.contains_key(stream.stream_id()))
    }

    async fn create_stream(&self, stream: &StoreStream) -> Result<(), DomainError> {
        let mut streams = self.streams.write().map_err(|_| poisoned())?;
        streams.entry(stream.stream_id().to_owned()).or_default();
        Ok(())
    }

    async fn stream_version(&self, stream: &StoreStream) -> Result<Version, DomainError> {
        let streams = self.streams.read().map_err(|_| poisoned())?;
        Ok(streams
            .get(stream.stream_id())
            .map_or(Version::ZERO, |events| last_version(events)))
    }

    async fn read_events(
        &self,
        stream: &StoreStream,
        from: Version,
        to: Option<Version>,
    ) -> Result<EventStream, DomainError> {
        let streams = self.streams.read().map_err(|_| poisoned())?;
        let Some(events) = streams.get(stream.stream_id()) else {
            return Ok(EventStream::empty());
        };
        let selected: Vec<Event> = events
            .iter()
            .filter(|event| {
                let version = event.aggregate_version();
                version >= from && to.is_none_or(|to| version <= to)
            })
            .cloned()
            .collect();
        Ok(EventStream::from_events(selected))
    }

    #[instrument(skip_all, fields(stream = %stream, count = events.len()))]
    async fn append_events(
        &self,
        stream: &StoreStream,
        events: &[Event],
    ) -> Result<(), DomainError> {
        let mut streams = self.streams.write().map_err(|_| poisoned())?;
        let current = streams
            .get(stream.stream_id())
            .map_or(Version::ZERO, |stored| last_version(stored));
        admit(stream, current, events)?;
        let stored = streams.entry(stream.stream_id().to_owned()).or_default();
        stored.extend_from_slice(events);
        tracing::debug!(version = %last_version(stored), "appended events");
        Ok(())
    }
}
