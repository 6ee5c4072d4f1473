//! Integration tests for `AggregateRepository` over the in-memory stores.

use std::num::NonZeroU64;
use std::sync::Arc;

use async_trait::async_trait;
use chronicle_core::aggregate::AggregateRoot;
use chronicle_core::error::DomainError;
use chronicle_core::event_store::EventStore;
use chronicle_core::identity::AggregateId;
use chronicle_core::repository::{AggregateRepository, RepositoryConfig, SnapshotPolicy};
use chronicle_core::snapshot::{Snapshot, SnapshotStore};
use chronicle_core::store_stream::StoreStream;
use chronicle_core::version::Version;
use chronicle_store::in_memory::InMemoryEventStore;
use chronicle_store::in_memory_snapshot::InMemorySnapshotStore;
use chronicle_test_support::{
    Counter, FailingEventStore, FixedClock, Ledger, RecordingEventStore, init_tracing,
};

type Recording = RecordingEventStore<InMemoryEventStore>;

fn recording_store() -> Arc<Recording> {
    Arc::new(RecordingEventStore::new(InMemoryEventStore::new()))
}

/// A snapshot store whose writes always fail.
struct BrokenSnapshotStore;

#[async_trait]
impl SnapshotStore<Counter> for BrokenSnapshotStore {
    async fn load(&self, _stream: &StoreStream) -> Result<Option<Snapshot<Counter>>, DomainError> {
        Ok(None)
    }

    async fn store(&self, _snapshot: &Snapshot<Counter>) -> Result<(), DomainError> {
        Err(DomainError::Infrastructure("disk full".into()))
    }
}

#[tokio::test]
async fn test_save_then_load_round_trip() {
    // Arrange
    init_tracing();
    let clock = FixedClock::epoch();
    let store = recording_store();
    let repository: AggregateRepository<Counter> = AggregateRepository::new(store.clone());
    let mut counter = Counter::create("U1", &clock).unwrap();
    assert_eq!(counter.version(), Version::FIRST);
    assert_eq!(counter.recorded_events().len(), 1);
    assert_eq!(counter.recorded_events()[0].aggregate_version(), Version::FIRST);

    // Act
    repository.save_aggregate_root(&mut counter).await.unwrap();
    let loaded = repository
        .get_aggregate_root(&AggregateId::new("U1"))
        .await
        .unwrap();

    // Assert
    let stream = StoreStream::of::<Counter>(AggregateId::new("U1"));
    assert_eq!(store.stream_version(&stream).await.unwrap(), Version::FIRST);
    assert!(!counter.has_pending_events());
    assert_eq!(loaded.version(), Version::FIRST);
    assert!(loaded.created);
    assert_eq!(loaded.total, counter.total);
    assert_eq!(loaded.aggregate_id(), counter.aggregate_id());
}

#[tokio::test]
async fn test_save_without_pending_events_never_appends() {
    // Arrange
    let clock = FixedClock::epoch();
    let store = recording_store();
    let repository: AggregateRepository<Counter> = AggregateRepository::new(store.clone());
    let mut counter = Counter::create("U1", &clock).unwrap();
    repository.save_aggregate_root(&mut counter).await.unwrap();
    assert_eq!(store.append_calls(), 1);

    // Act
    repository.save_aggregate_root(&mut counter).await.unwrap();

    // Assert
    assert_eq!(store.append_calls(), 1);
}

#[tokio::test]
async fn test_successive_saves_use_previous_version_as_expectation() {
    // Arrange
    let clock = FixedClock::epoch();
    let store = recording_store();
    let repository: AggregateRepository<Counter> = AggregateRepository::new(store.clone());
    let mut counter = Counter::create("U1", &clock).unwrap();
    repository.save_aggregate_root(&mut counter).await.unwrap();

    // Act
    let mut loaded = repository
        .get_aggregate_root(&AggregateId::new("U1"))
        .await
        .unwrap();
    loaded.increment(5, &clock).unwrap();
    loaded.label("five", &clock).unwrap();
    repository.save_aggregate_root(&mut loaded).await.unwrap();

    // Assert
    let batches = store.appended_batches();
    assert_eq!(batches.len(), 2);
    let second: Vec<u64> = batches[1]
        .1
        .iter()
        .map(|event| event.aggregate_version().value())
        .collect();
    assert_eq!(second, vec![2, 3]);
    let reloaded = repository
        .get_aggregate_root(&AggregateId::new("U1"))
        .await
        .unwrap();
    assert_eq!(reloaded.total, 5);
    assert_eq!(reloaded.label.as_deref(), Some("five"));
}

#[tokio::test]
async fn test_concurrent_editors_conflict_on_second_save() {
    // Arrange
    let clock = FixedClock::epoch();
    let repository: AggregateRepository<Counter> =
        AggregateRepository::new(Arc::new(InMemoryEventStore::new()));
    let mut counter = Counter::create("U1", &clock).unwrap();
    repository.save_aggregate_root(&mut counter).await.unwrap();
    let id = AggregateId::new("U1");
    let mut first = repository.get_aggregate_root(&id).await.unwrap();
    let mut second = repository.get_aggregate_root(&id).await.unwrap();
    first.increment(1, &clock).unwrap();
    second.increment(2, &clock).unwrap();
    repository.save_aggregate_root(&mut first).await.unwrap();

    // Act
    let result = repository.save_aggregate_root(&mut second).await;

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
async fn test_missing_aggregate_is_not_found() {
    let repository: AggregateRepository<Counter> =
        AggregateRepository::new(Arc::new(InMemoryEventStore::new()));

    let result = repository.get_aggregate_root(&AggregateId::new("nope")).await;

    match result {
        Err(error) => {
            assert!(error.is_not_found());
            assert!(matches!(error, DomainError::AggregateNotFound(id) if id.as_str() == "nope"));
        }
        Ok(_) => panic!("expected AggregateNotFound"),
    }
}

#[tokio::test]
async fn test_load_replays_delta_on_top_of_snapshot() {
    // Arrange
    let clock = FixedClock::epoch();
    let events = recording_store();
    let snapshots = Arc::new(InMemorySnapshotStore::new());
    let repository: AggregateRepository<Counter> =
        AggregateRepository::new(events.clone()).with_snapshot_store(snapshots.clone());
    let mut counter = Counter::create("U1", &clock).unwrap();
    counter.increment(10, &clock).unwrap();
    repository.save_aggregate_root(&mut counter).await.unwrap();
    repository.snapshot(&counter).await.unwrap();
    counter.increment(1, &clock).unwrap();
    repository.save_aggregate_root(&mut counter).await.unwrap();

    // Act
    let loaded = repository
        .get_aggregate_root(&AggregateId::new("U1"))
        .await
        .unwrap();

    // Assert
    assert_eq!(snapshots.len().unwrap(), 1);
    assert_eq!(loaded.version(), Version::new(3));
    assert_eq!(loaded.total, 11);
}

#[tokio::test]
async fn test_snapshot_of_dirty_aggregate_is_rejected() {
    let clock = FixedClock::epoch();
    let repository: AggregateRepository<Counter> =
        AggregateRepository::new(Arc::new(InMemoryEventStore::new()))
            .with_snapshot_store(Arc::new(InMemorySnapshotStore::new()));
    let counter = Counter::create("U1", &clock).unwrap();

    let result = repository.snapshot(&counter).await;

    assert!(matches!(
        result,
        Err(DomainError::SnapshotHasPendingEvents { pending: 1 })
    ));
}

#[tokio::test]
async fn test_snapshot_of_another_type_is_rejected() {
    // Arrange
    let clock = FixedClock::epoch();
    let events = Arc::new(InMemoryEventStore::new());
    let snapshots = Arc::new(InMemorySnapshotStore::new());
    let ledgers: AggregateRepository<Ledger> =
        AggregateRepository::new(events.clone()).with_snapshot_store(snapshots.clone());
    let counters: AggregateRepository<Counter> =
        AggregateRepository::new(events).with_snapshot_store(snapshots);
    let mut ledger = Ledger::open("X1", &clock).unwrap();
    ledgers.save_aggregate_root(&mut ledger).await.unwrap();
    ledgers.snapshot(&ledger).await.unwrap();

    // Act
    let result = counters.get_aggregate_root(&AggregateId::new("X1")).await;

    // Assert
    match result {
        Err(DomainError::WrongAggregateType { expected, actual }) => {
            assert_eq!(expected, "Counter");
            assert_eq!(actual, "Ledger");
        }
        other => panic!("expected WrongAggregateType, got {other:?}"),
    }
}

#[tokio::test]
async fn test_snapshot_policy_stores_when_boundary_is_crossed() {
    // Arrange
    let clock = FixedClock::epoch();
    let snapshots = Arc::new(InMemorySnapshotStore::new());
    let repository: AggregateRepository<Counter> =
        AggregateRepository::new(Arc::new(InMemoryEventStore::new()))
            .with_snapshot_store(snapshots.clone())
            .with_config(RepositoryConfig {
                snapshot_policy: SnapshotPolicy::EveryNEvents(NonZeroU64::new(3).unwrap()),
            });
    let mut counter = Counter::create("U1", &clock).unwrap();
    counter.increment(1, &clock).unwrap();
    repository.save_aggregate_root(&mut counter).await.unwrap();
    assert!(snapshots.is_empty().unwrap());

    // Act
    counter.increment(1, &clock).unwrap();
    repository.save_aggregate_root(&mut counter).await.unwrap();

    // Assert
    let stream = StoreStream::of::<Counter>(AggregateId::new("U1"));
    let snapshot = SnapshotStore::<Counter>::load(snapshots.as_ref(), &stream)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.version(), Version::new(3));
}

#[tokio::test]
async fn test_snapshot_failure_does_not_fail_the_save() {
    // Arrange
    init_tracing();
    let clock = FixedClock::epoch();
    let events = recording_store();
    let repository: AggregateRepository<Counter> = AggregateRepository::new(events.clone())
        .with_snapshot_store(Arc::new(BrokenSnapshotStore))
        .with_config(RepositoryConfig {
            snapshot_policy: SnapshotPolicy::EveryNEvents(NonZeroU64::new(1).unwrap()),
        });
    let mut counter = Counter::create("U1", &clock).unwrap();

    // Act
    let result = repository.save_aggregate_root(&mut counter).await;

    // Assert
    assert!(result.is_ok());
    assert_eq!(events.append_calls(), 1);
}

#[tokio::test]
async fn test_store_failure_surfaces_from_load() {
    let repository: AggregateRepository<Counter> =
        AggregateRepository::new(Arc::new(FailingEventStore));

    let result = repository.get_aggregate_root(&AggregateId::new("U1")).await;

    assert!(matches!(result, Err(DomainError::Infrastructure(_))));
}
