//! Snapshots: cached, fully persisted aggregate state.

use async_trait::async_trait;

use crate::aggregate::AggregateRoot;
use crate::error::DomainError;
use crate::store_stream::StoreStream;
use crate::version::Version;

/// An aggregate captured at a point-in-time version.
///
/// A snapshot only ever describes durable state, so the aggregate it wraps
/// has no pending recorded events.
#[derive(Debug, Clone)]
pub struct Snapshot<A: AggregateRoot> {
    stream: StoreStream,
    aggregate: A,
}

impl<A: AggregateRoot> Snapshot<A> {
    /// Captures `aggregate`.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::SnapshotHasPendingEvents` if the aggregate has
    /// unpersisted events, or `DomainError::UnidentifiedAggregate` if it has no
    /// identity.
    pub fn new(aggregate: A) -> Result<Self, DomainError> {
        if aggregate.has_pending_events() {
            return Err(DomainError::SnapshotHasPendingEvents {
                pending: aggregate.recorded_events().len(),
            });
        }
        let stream = StoreStream::for_aggregate(&aggregate)?;
        Ok(Self { stream, aggregate })
    }

    /// The stream the snapshot belongs to.
    #[must_use]
    pub fn stream(&self) -> &StoreStream {
        &self.stream
    }

    /// The captured aggregate.
    #[must_use]
    pub fn aggregate(&self) -> &A {
        &self.aggregate
    }

    /// The version the aggregate was captured at.
    #[must_use]
    pub fn version(&self) -> Version {
        self.aggregate.version()
    }

    /// Releases the captured aggregate.
    #[must_use]
    pub fn into_aggregate(self) -> A {
        self.aggregate
    }
}

/// Keyed storage of aggregate snapshots.
#[async_trait]
pub trait SnapshotStore<A: AggregateRoot>: Send + Sync {
    /// Loads the snapshot filed for `stream`, if any.
    async fn load(&self, stream: &StoreStream) -> Result<Option<Snapshot<A>>, DomainError>;

    /// Stores `snapshot`, replacing any earlier one for the same stream.
    async fn store(&self, snapshot: &Snapshot<A>) -> Result<(), DomainError>;
}
