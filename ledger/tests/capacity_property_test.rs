//! Property tests for the capacity invariants.
//!
//! Drives the pure decision layer with arbitrary operation sequences and
//! asserts the ledger's core invariants after every committed write set:
//! the countable total never exceeds capacity, at most one reservation
//! exists per requester, attendee bounds hold, the advisory count always
//! equals the recomputed total, and the close flag is monotonic.

#![allow(clippy::unwrap_used)]

use chrono::Utc;
use proptest::prelude::*;
use slotbook_ledger::capacity::countable_total;
use slotbook_ledger::decision::{plan_create, plan_delete, plan_record_payment, plan_update};
use slotbook_ledger::store::{PartitionSnapshot, ReservationWrite};
use slotbook_ledger::{Caller, RequesterId, Reservation, ReservationChange, ReservationId};
use slotbook_testing::fixtures::{attendees, open_event, paid_event, submission};
use std::collections::HashSet;

const REQUESTER_POOL: usize = 6;

#[derive(Debug, Clone)]
enum Op {
    Create { requester: usize, group: usize },
    Update { requester: usize, group: usize },
    Delete { requester: usize },
    Pay { requester: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..REQUESTER_POOL, 1..=25usize)
            .prop_map(|(requester, group)| Op::Create { requester, group }),
        (0..REQUESTER_POOL, 1..=25usize)
            .prop_map(|(requester, group)| Op::Update { requester, group }),
        (0..REQUESTER_POOL).prop_map(|requester| Op::Delete { requester }),
        (0..REQUESTER_POOL).prop_map(|requester| Op::Pay { requester }),
    ]
}

fn reservation_of(reservations: &[Reservation], requester: RequesterId) -> Option<ReservationId> {
    reservations
        .iter()
        .find(|r| r.requester_id == requester)
        .map(|r| r.id)
}

proptest! {
    #[test]
    fn invariants_hold_under_arbitrary_operation_sequences(
        ops in proptest::collection::vec(op_strategy(), 1..60),
        capacity in 1u32..12,
        payment_required in proptest::bool::ANY,
    ) {
        let requesters: Vec<RequesterId> =
            (0..REQUESTER_POOL).map(|_| RequesterId::new()).collect();
        let mut event = if payment_required {
            paid_event(Some(capacity), 1000)
        } else {
            open_event(Some(capacity))
        };
        let mut reservations: Vec<Reservation> = Vec::new();
        let now = Utc::now();

        for op in ops {
            let was_closed = event.closed;
            let snapshot = PartitionSnapshot {
                event: event.clone(),
                reservations: reservations.clone(),
                stats: None,
            };

            let outcome = match &op {
                Op::Create { requester, group } => plan_create(
                    &snapshot,
                    ReservationId::new(),
                    requesters[*requester],
                    &{
                        let mut sub = submission(event.id, 1);
                        sub.attendees = attendees(*group);
                        sub
                    },
                    now,
                ),
                Op::Update { requester, group } => {
                    match reservation_of(&reservations, requesters[*requester]) {
                        Some(id) => plan_update(
                            &snapshot,
                            id,
                            &Caller::member(requesters[*requester]),
                            &ReservationChange {
                                attendees: Some(attendees(*group)),
                                ..ReservationChange::default()
                            },
                            now,
                        ),
                        None => continue,
                    }
                }
                Op::Delete { requester } => {
                    match reservation_of(&reservations, requesters[*requester]) {
                        Some(id) => {
                            plan_delete(&snapshot, id, &Caller::member(requesters[*requester]))
                        }
                        None => continue,
                    }
                }
                Op::Pay { requester } => {
                    match reservation_of(&reservations, requesters[*requester]) {
                        Some(id) => plan_record_payment(
                            &snapshot,
                            id,
                            &Caller::member(requesters[*requester]),
                            now,
                        ),
                        None => continue,
                    }
                }
            };

            if let Ok(writes) = outcome {
                match writes.write {
                    ReservationWrite::Insert(r) => reservations.push(r),
                    ReservationWrite::Update(updated) => {
                        if let Some(slot) =
                            reservations.iter_mut().find(|r| r.id == updated.id)
                        {
                            *slot = updated;
                        }
                    }
                    ReservationWrite::Remove(id) => reservations.retain(|r| r.id != id),
                    ReservationWrite::None => {}
                }
                event.cached_count = writes.cached_count;
                if writes.close_event {
                    event.closed = true;
                }
            }

            // Capacity: the countable total never exceeds capacity.
            let total = countable_total(&event, &reservations);
            prop_assert!(
                total <= capacity,
                "countable total {} exceeded capacity {}",
                total,
                capacity
            );

            // The advisory count always matches a fresh recomputation,
            // because it is only ever written from one.
            prop_assert_eq!(event.cached_count, total);

            // Uniqueness: one reservation per requester.
            let holders: HashSet<RequesterId> =
                reservations.iter().map(|r| r.requester_id).collect();
            prop_assert_eq!(holders.len(), reservations.len());

            // Attendee bounds hold for every committed reservation.
            for r in &reservations {
                prop_assert!((1..=20).contains(&r.attendees.len()));
            }

            // Close is monotonic.
            if was_closed {
                prop_assert!(event.closed);
            }
        }
    }
}
