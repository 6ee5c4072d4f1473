//! In-memory snapshot store.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use chronicle_core::aggregate::AggregateRoot;
use chronicle_core::error::DomainError;
use chronicle_core::serializer::{AggregateSerializer, JsonAggregateSerializer};
use chronicle_core::snapshot::{Snapshot, SnapshotStore};
use chronicle_core::store_stream::StoreStream;

/// Snapshot store keeping serialized aggregates in memory, keyed by stream
/// id.
///
/// One instance can serve several aggregate types; the serializer rejects a
/// snapshot read back as the wrong type.
#[derive(Debug, Default)]
pub struct InMemorySnapshotStore<S = JsonAggregateSerializer> {
    snapshots: RwLock<HashMap<String, Vec<u8>>>,
    serializer: S,
}

impl InMemorySnapshotStore {
    /// Creates an empty store using the JSON serializer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S> InMemorySnapshotStore<S> {
    /// Creates an empty store using `serializer`.
    #[must_use]
    pub fn with_serializer(serializer: S) -> Self {
        Self {
            snapshots: RwLock::new(HashMap::new()),
            serializer,
        }
    }

    /// Number of stored snapshots.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the lock is poisoned.
    pub fn len(&self) -> Result<usize, DomainError> {
        Ok(self.snapshots.read().map_err(|_| poisoned())?.len())
    }

    /// Returns `true` when no snapshot is stored.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool, DomainError> {
        Ok(self.len()? == 0)
    }
}

fn poisoned() -> DomainError {
    DomainError::Infrastructure("in-memory snapshot store lock poisoned".into())
}

#[async_trait]
impl<A, S> SnapshotStore<A> for InMemorySnapshotStore<S>
where
    A: AggregateRoot,
    S: AggregateSerializer<A>,
{
    async fn load(&self, stream: &StoreStream) -> Result<Option<Snapshot<A>>, DomainError> {
        let bytes = {
            let snapshots = self.snapshots.read().map_err(|_| poisoned())?;
            match snapshots.get(stream.stream_id()) {
                Some(bytes) => bytes.clone(),
                None => return Ok(None),
            }
        };
        let aggregate = self.serializer.deserialize(&bytes)?;
        Snapshot::new(aggregate).map(Some)
    }

    async fn store(&self, snapshot: &Snapshot<A>) -> Result<(), DomainError> {
        let aggregate = snapshot.aggregate();
        if aggregate.has_pending_events() {
            return Err(DomainError::SnapshotHasPendingEvents {
                pending: aggregate.recorded_events().len(),
            });
        }
        let bytes = self.serializer.serialize(aggregate)?;
        let mut snapshots = self.snapshots.write().map_err(|_| poisoned())?;
        snapshots.insert(snapshot.stream().stream_id().to_owned(), bytes);
        Ok(())
    }
}
