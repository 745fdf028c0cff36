//! Tests for the in-memory reservation store's transactional contract.

#![allow(clippy::unwrap_used)]

use slotbook_ledger::store::{
    PartitionSnapshot, ReservationStore, ReservationWrite, StatsDelta, WriteSet,
};
use slotbook_ledger::LedgerError;
use slotbook_testing::fixtures::open_event;
use slotbook_testing::InMemoryReservationStore;

#[tokio::test]
async fn transact_on_unknown_event_is_not_found() {
    let store = InMemoryReservationStore::new();
    let missing = open_event(Some(5)).id;
    let result = store
        .transact(missing, &|_snapshot| {
            Ok(WriteSet {
                write: ReservationWrite::None,
                cached_count: 0,
                close_event: false,
                stats: StatsDelta::NONE,
            })
        })
        .await;
    assert!(matches!(result, Err(LedgerError::EventNotFound(_))));
}

#[tokio::test]
async fn decide_errors_abort_without_any_write() {
    let event = open_event(Some(5));
    let id = event.id;
    let store = InMemoryReservationStore::with_events([event]);

    let result = store
        .transact(id, &|_snapshot| {
            Err(LedgerError::CapacityExhausted { remaining: 0 })
        })
        .await;
    assert!(matches!(
        result,
        Err(LedgerError::CapacityExhausted { remaining: 0 })
    ));

    // The event is untouched and no stats rollup was created.
    let stored = store.event(id).await.unwrap().unwrap();
    assert_eq!(stored.cached_count, 0);
    assert!(!stored.closed);
    assert!(store.stats(id).is_none());
}

#[tokio::test]
async fn committed_writes_update_counter_close_flag_and_stats() {
    let event = open_event(Some(3));
    let id = event.id;
    let store = InMemoryReservationStore::with_events([event]);

    let writes = store
        .transact(id, &|snapshot: &PartitionSnapshot| {
            assert!(snapshot.reservations.is_empty());
            Ok(WriteSet {
                write: ReservationWrite::None,
                cached_count: 3,
                close_event: true,
                stats: StatsDelta {
                    reservations: 1,
                    attendees: 3,
                },
            })
        })
        .await
        .unwrap();
    assert_eq!(writes.cached_count, 3);

    let stored = store.event(id).await.unwrap().unwrap();
    assert_eq!(stored.cached_count, 3);
    assert!(stored.closed);
    let stats = store.stats(id).unwrap();
    assert_eq!(stats.reservation_count, 1);
    assert_eq!(stats.attendee_count, 3);

    // Negative deltas floor at zero rather than wrapping.
    store
        .transact(id, &|_snapshot| {
            Ok(WriteSet {
                write: ReservationWrite::None,
                cached_count: 0,
                close_event: false,
                stats: StatsDelta {
                    reservations: -5,
                    attendees: -10,
                },
            })
        })
        .await
        .unwrap();
    let stats = store.stats(id).unwrap();
    assert_eq!(stats.reservation_count, 0);
    assert_eq!(stats.attendee_count, 0);

    // A later commit that does not close never reopens.
    let stored = store.event(id).await.unwrap().unwrap();
    assert!(stored.closed);
}
