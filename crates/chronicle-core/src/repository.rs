//! Aggregate repository: composes snapshot and event stores.

use std::num::NonZeroU64;
use std::sync::Arc;

use tracing::{debug, instrument, warn};

use crate::aggregate::AggregateRoot;
use crate::error::DomainError;
use crate::event_store::EventStore;
use crate::identity::AggregateId;
use crate::snapshot::{Snapshot, SnapshotStore};
use crate::store_stream::StoreStream;
use crate::version::Version;

/// When the repository writes snapshots on its own.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SnapshotPolicy {
    /// Only on explicit [`AggregateRepository::snapshot`] calls.
    #[default]
    Never,
    /// Whenever a save crosses a multiple of the given event count.
    EveryNEvents(NonZeroU64),
}

impl SnapshotPolicy {
    /// Returns `true` if moving from `before` to `after` calls for a snapshot.
    #[must_use]
    pub fn is_due(self, before: Version, after: Version) -> bool {
        match self {
            Self::Never => false,
            Self::EveryNEvents(every) => {
                before.value() / every.get() != after.value() / every.get()
            }
        }
    }
}

/// Repository configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepositoryConfig {
    /// Automatic snapshotting behaviour.
    pub snapshot_policy: SnapshotPolicy,
}

/// Loads and saves aggregates of type `A`.
///
/// Loading prefers a snapshot plus the events recorded after it, and falls
/// back to replaying the full stream. Saving appends the aggregate's pending
/// events, using the version before the first of them as the concurrency
/// token.
pub struct AggregateRepository<A: AggregateRoot> {
    event_store: Arc<dyn EventStore>,
    snapshot_store: Option<Arc<dyn SnapshotStore<A>>>,
    config: RepositoryConfig,
}

impl<A: AggregateRoot> AggregateRepository<A> {
    /// Creates a repository without snapshot support.
    #[must_use]
    pub fn new(event_store: Arc<dyn EventStore>) -> Self {
        Self {
            event_store,
            snapshot_store: None,
            config: RepositoryConfig::default(),
        }
    }

    /// Adds a snapshot store.
    #[must_use]
    pub fn with_snapshot_store(mut self, snapshot_store: Arc<dyn SnapshotStore<A>>) -> Self {
        self.snapshot_store = Some(snapshot_store);
        self
    }

    /// Replaces the configuration.
    #[must_use]
    pub fn with_config(mut self, config: RepositoryConfig) -> Self {
        self.config = config;
        self
    }

    /// The stream locator for `aggregate_id`.
    #[must_use]
    pub fn stream_for(&self, aggregate_id: &AggregateId) -> StoreStream {
        StoreStream::of::<A>(aggregate_id.clone())
    }

    /// Loads the aggregate with the given identity.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::AggregateNotFound` if neither a snapshot nor any
    /// event exists, `DomainError::WrongAggregateType` if the snapshot holds
    /// another aggregate type, or any error raised while loading or
    /// replaying.
    #[instrument(skip_all, fields(aggregate_type = A::aggregate_type(), aggregate_id = %aggregate_id))]
    pub async fn get_aggregate_root(&self, aggregate_id: &AggregateId) -> Result<A, DomainError> {
        let stream = self.stream_for(aggregate_id);

        if let Some(snapshot) = self.load_snapshot(&stream).await? {
            if snapshot.stream().aggregate_type() != stream.aggregate_type() {
                return Err(DomainError::WrongAggregateType {
                    expected: stream.aggregate_type().to_owned(),
                    actual: snapshot.stream().aggregate_type().to_owned(),
                });
            }
            let mut aggregate = snapshot.into_aggregate();
            let snapshot_version = aggregate.version();
            let mut delta = self
                .event_store
                .load_from(&stream, snapshot_version.next(), None)
                .await?;
            aggregate.replay(&mut delta)?;
            debug!(
                snapshot_version = %snapshot_version,
                version = %aggregate.version(),
                "loaded aggregate from snapshot"
            );
            return Ok(aggregate);
        }

        let mut events = self
            .event_store
            .load_from(&stream, Version::FIRST, None)
            .await?;
        if events.count() == 0 {
            return Err(DomainError::AggregateNotFound(aggregate_id.clone()));
        }
        let aggregate = A::reconstitute(&mut events)?;
        debug!(version = %aggregate.version(), "reconstituted aggregate from events");
        Ok(aggregate)
    }

    /// Persists the aggregate's pending events.
    ///
    /// Pending events are taken out of the aggregate before the append. A save
    /// with nothing pending never reaches the event store.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::UnidentifiedAggregate` if the aggregate has no
    /// identity, `DomainError::ConcurrencyConflict` if the stream moved since
    /// the aggregate was loaded, or any other store error.
    #[instrument(skip_all, fields(aggregate_type = A::aggregate_type()))]
    pub async fn save_aggregate_root(&self, aggregate: &mut A) -> Result<(), DomainError> {
        let stream = StoreStream::for_aggregate(aggregate)?;
        stream.ensure_type::<A>()?;

        let mut events = aggregate.collect_recorded_events();
        let count = events.count();
        if count == 0 {
            return Ok(());
        }
        let expected_version = events.current()?.aggregate_version().previous()?;
        self.event_store
            .store(&stream, events, expected_version)
            .await?;
        debug!(stream = %stream, count, version = %aggregate.version(), "saved aggregate");

        if self
            .config
            .snapshot_policy
            .is_due(expected_version, aggregate.version())
        {
            if let Err(error) = self.snapshot(aggregate).await {
                warn!(stream = %stream, %error, "snapshot after save failed");
            }
        }
        Ok(())
    }

    /// Stores a snapshot of `aggregate`. Without a snapshot store this is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::SnapshotHasPendingEvents` if the aggregate has
    /// unsaved events, or any snapshot store error.
    pub async fn snapshot(&self, aggregate: &A) -> Result<(), DomainError> {
        let Some(snapshot_store) = &self.snapshot_store else {
            return Ok(());
        };
        let snapshot = Snapshot::new(aggregate.clone())?;
        snapshot_store.store(&snapshot).await?;
        debug!(stream = %snapshot.stream(), version = %snapshot.version(), "stored snapshot");
        Ok(())
    }

    async fn load_snapshot(&self, stream: &StoreStream) -> Result<Option<Snapshot<A>>, DomainError> {
        match &self.snapshot_store {
            Some(snapshot_store) => snapshot_store.load(stream).await,
            None => Ok(None),
        }
    }
}
