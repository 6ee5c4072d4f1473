//! `PostgreSQL` implementation of the `SnapshotStore` trait.

use async_trait::async_trait;
use sqlx::PgPool;

use chronicle_core::aggregate::AggregateRoot;
use chronicle_core::error::DomainError;
use chronicle_core::serializer::{AggregateSerializer, JsonAggregateSerializer};
use chronicle_core::snapshot::{Snapshot, SnapshotStore};
use chronicle_core::store_stream::StoreStream;

use crate::pg_event_store::infrastructure;

/// PostgreSQL-backed snapshot store: one row per stream in
/// `aggregate_snapshots`, overwritten on every store.
#[derive(Debug, Clone)]
pub struct PgSnapshotStore<S = JsonAggregateSerializer> {
    pool: PgPool,
    serializer: S,
}

impl PgSnapshotStore {
    /// Creates a store using the JSON serializer.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self::with_serializer(pool, JsonAggregateSerializer)
    }
}

impl<S> PgSnapshotStore<S> {
    /// Creates a store using `serializer`.
    #[must_use]
    pub fn with_serializer(pool: PgPool, serializer: S) -> Self {
        Self { pool, serializer }
    }
}

#[async_trait]
impl<A, S> SnapshotStore<A> for PgSnapshotStore<S>
where
    A: AggregateRoot,
    S: AggregateSerializer<A>,
{
    async fn load(&self, stream: &StoreStream) -> Result<Option<Snapshot<A>>, DomainError> {
        let data = sqlx::query_scalar::<_, Vec<u8>>(
            "SELECT data FROM aggregate_snapshots WHERE stream_id = $1",
        )
        .bind(stream.stream_id())
        .fetch_optional(&self.pool)
        .await
        .map_err(infrastructure)?;
        match data {
            Some(bytes) => Snapshot::new(self.serializer.deserialize(&bytes)?).map(Some),
            None => Ok(None),
        }
    }

    async fn store(&self, snapshot: &Snapshot<A>) -> Result<(), DomainError> {
        let aggregate = snapshot.aggregate();
        if aggregate.has_pending_events() {
            return Err(DomainError::SnapshotHasPendingEvents {
                pending: aggregate.recorded_events().len(),
            });
        }
        let data = self.serializer.serialize(aggregate)?;
        sqlx::query(
            r"
            INSERT INTO aggregate_snapshots (stream_id, aggregate_type, version, data, updated_at)
            VALUES ($1, $2, $3, $4, NOW())
            ON CONFLICT (stream_id) DO UPDATE
            SET aggregate_type = EXCLUDED.aggregate_type,
                version = EXCLUDED.version,
                data = EXCLUDED.data,
                updated_at = EXCLUDED.updated_at
            ",
        )
        .bind(snapshot.stream().stream_id())
        .bind(snapshot.stream().aggregate_type())
        .bind(i64::try_from(snapshot.version())?)
        .bind(data)
        .execute(&self.pool)
        .await
        .map_err(infrastructure)?;
        tracing::debug!(stream = %snapshot.stream(), version = %snapshot.version(), "stored snapshot");
        Ok(())
    }
}
