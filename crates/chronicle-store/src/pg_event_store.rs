//! `PostgreSQL` implementation of the `EventStore` trait.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::instrument;

use chronicle_core::error::DomainError;
use chronicle_core::event::{Event, Metadata, Payload};
use chronicle_core::event_store::EventStore;
use chronicle_core::identity::AggregateId;
use chronicle_core::store_stream::StoreStream;
use chronicle_core::stream::EventStream;
use chronicle_core::version::Version;

use crate::append::admit;

/// PostgreSQL-backed event store.
///
/// Streams live in `event_streams`, events in `aggregate_events` keyed by
/// `(stream_id, version)`. An append runs in one transaction holding the
/// stream row lock, so a rejected batch leaves the stream untouched.
#[derive(Debug, Clone)]
pub struct PgEventStore {
    pool: PgPool,
}

impl PgEventStore {
    /// Creates a new `PgEventStore`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct EventRow {
    stream_id: String,
    version: i64,
    event_type: String,
    payload: serde_json::Value,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
}

impl EventRow {
    fn into_event(self) -> Result<Event, DomainError> {
        Event::reconstitute(
            self.event_type,
            AggregateId::new(self.stream_id),
            Version::try_from(self.version)?,
            Payload::from_value(self.payload)?,
            Metadata::from_value(self.metadata)?,
            self.created_at,
        )
    }
}

pub(crate) fn infrastructure(error: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(error.to_string())
}

async fn ensure_stream_row(
    tx: &mut Transaction<'_, Postgres>,
    stream: &StoreStream,
) -> Result<(), DomainError> {
    sqlx::query(
        r"
        INSERT INTO event_streams (stream_id, aggregate_type, version)
        VALUES ($1, $2, 0)
        ON CONFLICT (stream_id) DO NOTHING
        ",
    )
    .bind(stream.stream_id())
    .bind(stream.aggregate_type())
    .execute(&mut **tx)
    .await
    .map_err(infrastructure)?;
    Ok(())
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn stream_exists(&self, stream: &StoreStream) -> Result<bool, DomainError> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM event_streams WHERE stream_id = $1)",
        )
        .bind(stream.stream_id())
        .fetch_one(&self.pool)
        .await
        .map_err(infrastructure)
    }

    async fn create_stream(&self, stream: &StoreStream) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(infrastructure)?;
        ensure_stream_row(&mut tx, stream).await?;
        tx.commit().await.map_err(infrastructure)
    }

    async fn stream_version(&self, stream: &StoreStream) -> Result<Version, DomainError> {
        let version = sqlx::query_scalar::<_, i64>(
            "SELECT version FROM event_streams WHERE stream_id = $1",
        )
        .bind(stream.stream_id())
        .fetch_optional(&self.pool)
        .await
        .map_err(infrastructure)?;
        version.map_or(Ok(Version::ZERO), Version::try_from)
    }

    async fn read_events(
        &self,
        stream: &StoreStream,
        from: Version,
        to: Option<Version>,
    ) -> Result<EventStream, DomainError> {
        let to = to.map(i64::try_from).transpose()?;
        let rows = sqlx::query_as::<_, EventRow>(
            r"
            SELECT stream_id, version, event_type, payload, metadata, created_at
            FROM aggregate_events
            WHERE stream_id = $1
              AND version >= $2
              AND ($3::BIGINT IS NULL OR version <= $3)
            ORDER BY version ASC
            ",
        )
        .bind(stream.stream_id())
        .bind(i64::try_from(from)?)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(infrastructure)?;

        let events = rows
            .into_iter()
            .map(EventRow::into_event)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(EventStream::from_events(events))
    }

    #[instrument(skip_all, fields(stream = %stream, count = events.len()))]
    async fn append_events(
        &self,
        stream: &StoreStream,
        events: &[Event],
    ) -> Result<(), DomainError> {
        let Some(last) = events.last().map(Event::aggregate_version) else {
            return Ok(());
        };
        let mut tx = self.pool.begin().await.map_err(infrastructure)?;
        ensure_stream_row(&mut tx, stream).await?;

        let current = sqlx::query_scalar::<_, i64>(
            "SELECT version FROM event_streams WHERE stream_id = $1 FOR UPDATE",
        )
        .bind(stream.stream_id())
        .fetch_one(&mut *tx)
        .await
        .map_err(infrastructure)?;
        let current = Version::try_from(current)?;
        admit(stream, current, events)?;

        for event in events {
            sqlx::query(
                r"
                INSERT INTO aggregate_events
                    (stream_id, version, event_type, payload, metadata, created_at)
                VALUES ($1, $2, $3, $4, $5, $6)
                ",
            )
            .bind(stream.stream_id())
            .bind(i64::try_from(event.aggregate_version())?)
            .bind(event.event_type())
            .bind(Json(event.payload().as_map()))
            .bind(Json(event.metadata().as_map()))
            .bind(event.created_at())
            .execute(&mut *tx)
            .await
            .map_err(|error| match error {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    DomainError::ConcurrencyConflict {
                        aggregate_id: stream.aggregate_id().clone(),
                        expected: current,
                        actual: event.aggregate_version(),
                    }
                }
                other => infrastructure(other),
            })?;
        }

        sqlx::query("UPDATE event_streams SET version = $2 WHERE stream_id = $1")
            .bind(stream.stream_id())
            .bind(i64::try_from(last)?)
            .execute(&mut *tx)
            .await
            .map_err(infrastructure)?;
        tx.commit().await.map_err(infrastructure)?;

        tracing::debug!(from = %current, to = %last, "appended events");
        Ok(())
    }
}
