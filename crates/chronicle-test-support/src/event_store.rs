//! Test event stores: wrappers and failure doubles for `EventStore`.

use std::sync::Mutex;

use async_trait::async_trait;
use chronicle_core::error::DomainError;
use chronicle_core::event::Event;
use chronicle_core::event_store::EventStore;
use chronicle_core::store_stream::StoreStream;
use chronicle_core::stream::EventStream;
use chronicle_core::version::Version;

/// An event store that delegates to `inner` and records every
/// `append_events` call, including rejected ones.
#[derive(Debug)]
pub struct RecordingEventStore<S> {
    inner: S,
    appended: Mutex<Vec<(StoreStream, Vec<Event>)>>,
}

impl<S: EventStore> RecordingEventStore<S> {
    /// Wraps `inner`.
    #[must_use]
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            appended: Mutex::new(Vec::new()),
        }
    }

    /// The wrapped store.
    #[must_use]
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Returns a snapshot of every batch passed to `append_events`.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn appended_batches(&self) -> Vec<(StoreStream, Vec<Event>)> {
        self.appended.lock().unwrap().clone()
    }

    /// Number of `append_events` calls so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn append_calls(&self) -> usize {
        self.appended.lock().unwrap().len()
    }
}

#[async_trait]
impl<S: EventStore> EventStore for RecordingEventStore<S> {
    async fn stream_exists(&self, stream: &StoreStream) -> Result<bool, DomainError> {
        self.inner.stream_exists(stream).await
    }

    async fn create_stream(&self, stream: &StoreStream) -> Result<(), DomainError> {
        self.inner.create_stream(stream).await
    }

    async fn stream_version(&self, stream: &StoreStream) -> Result<Version, DomainError> {
        self.inner.stream_version(stream).await
    }

    async fn read_events(
        &self,
        stream: &StoreStream,
        from: Version,
        to: Option<Version>,
    ) -> Result<EventStream, DomainError> {
        self.inner.read_events(stream, from, to).await
    }

    async fn append_events(
        &self,
        stream: &StoreStream,
        events: &[Event],
    ) -> Result<(), DomainError> {
        self.appended
            .lock()
            .unwrap()
            .push((stream.clone(), events.to_vec()));
        self.inner.append_events(stream, events).await
    }
}

/// An event store whose every primitive returns an infrastructure error.
/// Useful for testing error-handling paths.
#[derive(Debug)]
pub struct FailingEventStore;

fn connection_refused() -> DomainError {
    DomainError::Infrastructure("connection refused".into())
}

#[async_trait]
impl EventStore for FailingEventStore {
    async fn stream_exists(&self, _stream: &StoreStream) -> Result<bool, DomainError> {
        Err(connection_refused())
    }

    async fn create_stream(&self, _stream: &StoreStream) -> Result<(), DomainError> {
        Err(connection_refused())
    }

    async fn stream_version(&self, _stream: &StoreStream) -> Result<Version, DomainError> {
        Err(connection_refused())
    }

    async fn read_events(
        &self,
        _stream: &StoreStream,
        _from: Version,
        _to: Option<Version>,
    ) -> Result<EventStream, DomainError> {
        Err(connection_refused())
    }

    async fn append_events(
        &self,
        _stream: &StoreStream,
        _events: &[Event],
    ) -> Result<(), DomainError> {
        Err(connection_refused())
    }
}
