//! Pure booking decisions.
//!
//! Each planner takes a consistent [`PartitionSnapshot`], re-derives the
//! countable total from it, and returns the [`WriteSet`] to commit - or the
//! typed error that aborts the transaction. Nothing here performs I/O, so a
//! store may re-run a planner against a fresh snapshot when its transaction
//! retries, and every invariant can be tested without a database.
//!
//! The capacity check and the writes it justifies always come from the same
//! snapshot; the stale-counter races of the ad-hoc increment pattern cannot
//! happen here.

use crate::capacity;
use crate::error::LedgerError;
use crate::identity::{Capability, Caller};
use crate::store::{PartitionSnapshot, ReservationWrite, StatsDelta, WriteSet};
use crate::types::{
    EventRecord, NewReservation, PaymentStatus, RequesterId, Reservation, ReservationChange,
    ReservationId,
};
use crate::validate;
use chrono::{DateTime, Utc};

/// Whether this commit fires the one-way open → closed transition.
const fn should_close(event: &EventRecord, cached_count: u32) -> bool {
    !event.closed
        && match event.capacity {
            Some(cap) => cached_count >= cap,
            None => false,
        }
}

/// Fail with the exact remaining-spot count when admitting `incoming`
/// attendees on top of `total` would exceed capacity.
fn check_capacity(
    event: &EventRecord,
    total: u32,
    incoming: u32,
) -> Result<(), LedgerError> {
    if let Some(remaining) = capacity::remaining(event, total) {
        if incoming > remaining {
            return Err(LedgerError::CapacityExhausted { remaining });
        }
    }
    Ok(())
}

/// Plan a new reservation.
///
/// # Errors
///
/// `InvalidArgument` on attendee bounds, `AlreadyExists` when the requester
/// already holds a reservation, `CapacityExhausted` when the attendees
/// don't fit, `EventClosed` when they would fit but the event no longer
/// accepts reservations.
pub fn plan_create(
    snapshot: &PartitionSnapshot,
    reservation_id: ReservationId,
    requester_id: RequesterId,
    submission: &NewReservation,
    now: DateTime<Utc>,
) -> Result<WriteSet, LedgerError> {
    let event = &snapshot.event;

    validate::validate_attendees(&submission.attendees)?;

    if snapshot.reservation_for(requester_id).is_some() {
        return Err(LedgerError::AlreadyExists {
            event_id: event.id,
            requester_id,
        });
    }

    // Capacity before the closed gate: a commit that fills the event also
    // closes it, and the next writer must still see the capacity rejection
    // with the exact remaining-spot count. The closed gate alone fires only
    // for slots freed after an auto-close, or an explicit administrative
    // close.
    let total = capacity::countable_total(event, &snapshot.reservations);
    let incoming = u32::try_from(submission.attendees.len()).unwrap_or(u32::MAX);
    check_capacity(event, total, incoming)?;

    if event.closed {
        return Err(LedgerError::EventClosed(event.id));
    }

    let reservation = Reservation {
        id: reservation_id,
        event_id: event.id,
        requester_id,
        attendees: submission.attendees.clone(),
        contact: submission.contact.clone(),
        dietary_restrictions: submission.dietary_restrictions.clone(),
        special_needs: submission.special_needs.clone(),
        notes: submission.notes.clone(),
        payment_status: event.initial_payment_status(),
        created_at: now,
        updated_at: now,
    };

    // The capacity check above always includes the incoming attendees, but
    // the advisory snapshot only counts them once they are countable.
    let cached_count = if capacity::is_countable(event, &reservation) {
        total.saturating_add(incoming)
    } else {
        total
    };

    Ok(WriteSet {
        write: ReservationWrite::Insert(reservation),
        cached_count,
        close_event: should_close(event, cached_count),
        stats: StatsDelta {
            reservations: 1,
            attendees: i64::from(incoming),
        },
    })
}

/// Plan an update to an existing reservation.
///
/// Capacity is re-validated from a fresh recomputation that excludes the
/// reservation's own prior contribution; a rejected update leaves the prior
/// record untouched.
///
/// # Errors
///
/// `ReservationNotFound`, `PermissionDenied` for non-owners,
/// `InvalidArgument` on attendee bounds, `CapacityExhausted` when the new
/// attendee list doesn't fit.
pub fn plan_update(
    snapshot: &PartitionSnapshot,
    reservation_id: ReservationId,
    caller: &Caller,
    change: &ReservationChange,
    now: DateTime<Utc>,
) -> Result<WriteSet, LedgerError> {
    let event = &snapshot.event;
    let prior = snapshot
        .reservation(reservation_id)
        .ok_or(LedgerError::ReservationNotFound(reservation_id))?;

    if !caller.owns(prior.requester_id) {
        return Err(LedgerError::PermissionDenied(
            "You can only modify your own reservations".to_string(),
        ));
    }

    if let Some(attendees) = &change.attendees {
        validate::validate_attendees(attendees)?;
    }
    if let Some(contact) = &change.contact {
        validate::validate_contact(contact)?;
    }

    let mut updated = prior.clone();
    if let Some(attendees) = &change.attendees {
        updated.attendees.clone_from(attendees);
    }
    if let Some(contact) = &change.contact {
        updated.contact = contact.clone();
    }
    if let Some(dietary) = &change.dietary_restrictions {
        updated.dietary_restrictions = Some(dietary.clone());
    }
    if let Some(needs) = &change.special_needs {
        updated.special_needs = Some(needs.clone());
    }
    if let Some(notes) = &change.notes {
        updated.notes = Some(notes.clone());
    }
    updated.updated_at = now;

    let prior_count = capacity::attendee_count(prior);
    let new_count = capacity::attendee_count(&updated);

    let total_excl =
        capacity::countable_total_excluding(event, &snapshot.reservations, reservation_id);
    check_capacity(event, total_excl, new_count)?;

    let cached_count = if capacity::is_countable(event, &updated) {
        total_excl.saturating_add(new_count)
    } else {
        total_excl
    };

    Ok(WriteSet {
        write: ReservationWrite::Update(updated),
        cached_count,
        close_event: should_close(event, cached_count),
        stats: StatsDelta {
            reservations: 0,
            attendees: i64::from(new_count) - i64::from(prior_count),
        },
    })
}

/// Plan a reservation withdrawal.
///
/// The countable total drops by exactly the reservation's countable
/// contribution, floored at zero. Withdrawal never reopens a closed event.
///
/// # Errors
///
/// `ReservationNotFound`, `PermissionDenied` unless the caller owns the
/// reservation or holds [`Capability::DeleteAnyReservation`].
pub fn plan_delete(
    snapshot: &PartitionSnapshot,
    reservation_id: ReservationId,
    caller: &Caller,
) -> Result<WriteSet, LedgerError> {
    let event = &snapshot.event;
    let reservation = snapshot
        .reservation(reservation_id)
        .ok_or(LedgerError::ReservationNotFound(reservation_id))?;

    if !caller.owns(reservation.requester_id)
        && !caller.capabilities.allows(Capability::DeleteAnyReservation)
    {
        return Err(LedgerError::PermissionDenied(
            "You can only delete your own reservations".to_string(),
        ));
    }

    let total = capacity::countable_total(event, &snapshot.reservations);
    let contribution = if capacity::is_countable(event, reservation) {
        capacity::attendee_count(reservation)
    } else {
        0
    };
    let cached_count = total.saturating_sub(contribution);
    let attendees = i64::from(capacity::attendee_count(reservation));

    Ok(WriteSet {
        write: ReservationWrite::Remove(reservation_id),
        cached_count,
        close_event: should_close(event, cached_count),
        stats: StatsDelta {
            reservations: -1,
            attendees: -attendees,
        },
    })
}

/// Plan recording a completed payment for a pending reservation.
///
/// Completion makes the reservation countable, so it must fit: a completion
/// that would push the countable total past capacity is refused rather than
/// silently breaking the invariant (the payment collaborator handles the
/// refund).
///
/// # Errors
///
/// `ReservationNotFound`, `PermissionDenied` for non-owners without
/// [`Capability::DeleteAnyReservation`], `PaymentNotPending` unless the
/// reservation awaits payment, `CapacityExhausted` when it no longer fits.
pub fn plan_record_payment(
    snapshot: &PartitionSnapshot,
    reservation_id: ReservationId,
    caller: &Caller,
    now: DateTime<Utc>,
) -> Result<WriteSet, LedgerError> {
    let event = &snapshot.event;
    let prior = snapshot
        .reservation(reservation_id)
        .ok_or(LedgerError::ReservationNotFound(reservation_id))?;

    if !caller.owns(prior.requester_id)
        && !caller.capabilities.allows(Capability::DeleteAnyReservation)
    {
        return Err(LedgerError::PermissionDenied(
            "You can only complete payment for your own reservations".to_string(),
        ));
    }

    if prior.payment_status != PaymentStatus::Pending {
        return Err(LedgerError::PaymentNotPending(reservation_id));
    }

    let count = capacity::attendee_count(prior);
    let total_excl =
        capacity::countable_total_excluding(event, &snapshot.reservations, reservation_id);
    check_capacity(event, total_excl, count)?;

    let mut updated = prior.clone();
    updated.payment_status = PaymentStatus::Completed;
    updated.updated_at = now;

    let cached_count = total_excl.saturating_add(count);

    Ok(WriteSet {
        write: ReservationWrite::Update(updated),
        cached_count,
        close_event: should_close(event, cached_count),
        // Attendees were counted into the rollup at creation time.
        stats: StatsDelta::NONE,
    })
}

/// Plan a counter reconciliation: recompute the countable total and repair
/// the advisory snapshot without touching any reservation.
///
/// This is the audit/self-heal path; like any commit it observes the close
/// transition when the recomputed total has reached capacity.
///
/// # Errors
///
/// Infallible today; typed for uniformity with the other planners.
pub fn plan_reconcile(snapshot: &PartitionSnapshot) -> Result<WriteSet, LedgerError> {
    let event = &snapshot.event;
    let cached_count = capacity::countable_total(event, &snapshot.reservations);
    Ok(WriteSet {
        write: ReservationWrite::None,
        cached_count,
        close_event: should_close(event, cached_count),
        stats: StatsDelta::NONE,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::identity::Role;
    use slotbook_testing::fixtures::{
        attendees, contact, open_event, paid_event, reservation_against, submission,
    };
    use slotbook_testing::DecisionTest;

    fn snapshot(event: EventRecord, reservations: Vec<Reservation>) -> PartitionSnapshot {
        PartitionSnapshot {
            event,
            reservations,
            stats: None,
        }
    }

    // ========== create ==========

    #[test]
    fn create_commits_reservation_count_and_stats_together() {
        let event = open_event(Some(10));
        let requester = RequesterId::new();
        let sub = submission(event.id, 3);

        DecisionTest::new()
            .given_event(event)
            .when(move |snap| {
                plan_create(snap, ReservationId::new(), requester, &sub, Utc::now())
            })
            .then_writes(move |writes| {
                assert_eq!(writes.cached_count, 3);
                assert!(!writes.close_event);
                assert_eq!(writes.stats, StatsDelta { reservations: 1, attendees: 3 });
                match &writes.write {
                    ReservationWrite::Insert(r) => {
                        assert_eq!(r.requester_id, requester);
                        assert_eq!(r.payment_status, PaymentStatus::NotRequired);
                    }
                    other => panic!("expected insert, got {other:?}"),
                }
            })
            .run();
    }

    #[test]
    fn create_rejects_attendee_lists_outside_bounds() {
        for size in [0, 21] {
            let event = open_event(Some(50));
            let mut sub = submission(event.id, 1);
            sub.attendees = attendees(size);

            DecisionTest::new()
                .given_event(event)
                .when(move |snap| {
                    plan_create(snap, ReservationId::new(), RequesterId::new(), &sub, Utc::now())
                })
                .then_error(|err| {
                    assert_eq!(err.to_string(), "Must have 1-20 attendees");
                })
                .run();
        }
    }

    #[test]
    fn create_rejects_duplicate_requester() {
        let event = open_event(Some(10));
        let requester = RequesterId::new();
        let existing = reservation_against(&event, requester, 2);
        let sub = submission(event.id, 1);

        DecisionTest::new()
            .given_event(event)
            .given_reservation(existing)
            .when(move |snap| {
                plan_create(snap, ReservationId::new(), requester, &sub, Utc::now())
            })
            .then_error(|err| {
                assert!(matches!(err, LedgerError::AlreadyExists { .. }));
            })
            .run();
    }

    #[test]
    fn create_rejects_closed_event() {
        let mut event = open_event(Some(10));
        event.closed = true;
        let sub = submission(event.id, 1);

        DecisionTest::new()
            .given_event(event)
            .when(move |snap| {
                plan_create(snap, ReservationId::new(), RequesterId::new(), &sub, Utc::now())
            })
            .then_error(|err| {
                assert!(matches!(err, LedgerError::EventClosed(_)));
            })
            .run();
    }

    #[test]
    fn create_on_a_full_closed_event_reports_capacity_not_closed() {
        // The state every loser of a last-slot race observes: the winner's
        // commit filled the event and set the close flag together.
        let mut event = open_event(Some(5));
        event.closed = true;
        event.cached_count = 5;
        let full = reservation_against(&event, RequesterId::new(), 5);
        let sub = submission(event.id, 1);

        DecisionTest::new()
            .given_event(event)
            .given_reservation(full)
            .when(move |snap| {
                plan_create(snap, ReservationId::new(), RequesterId::new(), &sub, Utc::now())
            })
            .then_error(|err| {
                assert!(matches!(err, LedgerError::CapacityExhausted { remaining: 0 }));
            })
            .run();
    }

    #[test]
    fn create_reports_zero_spots_remaining_when_full() {
        let event = open_event(Some(5));
        let full = reservation_against(&event, RequesterId::new(), 5);
        let sub = submission(event.id, 1);

        DecisionTest::new()
            .given_event(event)
            .given_reservation(full)
            .when(move |snap| {
                plan_create(snap, ReservationId::new(), RequesterId::new(), &sub, Utc::now())
            })
            .then_error(|err| {
                assert_eq!(
                    err.to_string(),
                    "Event is at capacity. Only 0 spots remaining."
                );
            })
            .run();
    }

    #[test]
    fn create_reports_partial_remaining_spots() {
        let event = open_event(Some(10));
        let existing = reservation_against(&event, RequesterId::new(), 8);
        let sub = submission(event.id, 3);

        DecisionTest::new()
            .given_event(event)
            .given_reservation(existing)
            .when(move |snap| {
                plan_create(snap, ReservationId::new(), RequesterId::new(), &sub, Utc::now())
            })
            .then_error(|err| {
                assert!(matches!(err, LedgerError::CapacityExhausted { remaining: 2 }));
            })
            .run();
    }

    #[test]
    fn create_that_fills_the_event_closes_it() {
        let event = open_event(Some(4));
        let existing = reservation_against(&event, RequesterId::new(), 2);
        let sub = submission(event.id, 2);

        DecisionTest::new()
            .given_event(event)
            .given_reservation(existing)
            .when(move |snap| {
                plan_create(snap, ReservationId::new(), RequesterId::new(), &sub, Utc::now())
            })
            .then_writes(|writes| {
                assert_eq!(writes.cached_count, 4);
                assert!(writes.close_event);
            })
            .run();
    }

    #[test]
    fn create_on_unlimited_event_never_exhausts() {
        let event = open_event(None);
        let existing = reservation_against(&event, RequesterId::new(), 20);
        let sub = submission(event.id, 20);

        DecisionTest::new()
            .given_event(event)
            .given_reservation(existing)
            .when(move |snap| {
                plan_create(snap, ReservationId::new(), RequesterId::new(), &sub, Utc::now())
            })
            .then_writes(|writes| {
                assert_eq!(writes.cached_count, 40);
                assert!(!writes.close_event);
            })
            .run();
    }

    #[test]
    fn pending_payment_reservation_is_checked_but_not_counted() {
        let event = paid_event(Some(10), 1500);
        let sub = submission(event.id, 4);

        DecisionTest::new()
            .given_event(event)
            .when(move |snap| {
                plan_create(snap, ReservationId::new(), RequesterId::new(), &sub, Utc::now())
            })
            .then_writes(|writes| {
                // Capacity admitted the group, but the advisory count stays
                // at the countable total until payment completes.
                assert_eq!(writes.cached_count, 0);
                match &writes.write {
                    ReservationWrite::Insert(r) => {
                        assert_eq!(r.payment_status, PaymentStatus::Pending);
                    }
                    other => panic!("expected insert, got {other:?}"),
                }
            })
            .run();
    }

    // ========== update ==========

    #[test]
    fn update_excludes_own_contribution_from_the_recount() {
        let event = open_event(Some(10));
        let requester = RequesterId::new();
        let mine = reservation_against(&event, requester, 8);
        let mine_id = mine.id;
        let snap = snapshot(event.clone(), vec![mine]);
        let change = ReservationChange {
            attendees: Some(attendees(10)),
            ..ReservationChange::default()
        };
        let writes = plan_update(
            &snap,
            mine_id,
            &Caller::member(requester),
            &change,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(writes.cached_count, 10);
        assert!(writes.close_event);
        assert_eq!(writes.stats.attendees, 2);
    }

    #[test]
    fn rejected_update_leaves_prior_reservation_intact() {
        let event = open_event(Some(10));
        let requester = RequesterId::new();
        let mine = reservation_against(&event, requester, 3);
        let mine_id = mine.id;
        let other = reservation_against(&event, RequesterId::new(), 6);
        let snap = snapshot(event.clone(), vec![mine.clone(), other]);
        let change = ReservationChange {
            attendees: Some(attendees(5)),
            ..ReservationChange::default()
        };
        let err = plan_update(
            &snap,
            mine_id,
            &Caller::member(requester),
            &change,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::CapacityExhausted { remaining: 4 }));
        // The planner returned an error, so no write set exists and the
        // snapshot's reservation is untouched by construction.
        assert_eq!(snap.reservation(mine_id).unwrap(), &mine);
    }

    #[test]
    fn update_by_non_owner_is_denied() {
        let event = open_event(Some(10));
        let mine = reservation_against(&event, RequesterId::new(), 2);
        let mine_id = mine.id;
        let snap = snapshot(event.clone(), vec![mine]);
        let change = ReservationChange {
            attendees: Some(attendees(1)),
            ..ReservationChange::default()
        };
        let err = plan_update(
            &snap,
            mine_id,
            &Caller::member(RequesterId::new()),
            &change,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, LedgerError::PermissionDenied(_)));
    }

    #[test]
    fn update_can_change_contact_without_touching_attendees() {
        let event = open_event(Some(4));
        let requester = RequesterId::new();
        let mine = reservation_against(&event, requester, 4);
        let mine_id = mine.id;
        let snap = snapshot(event.clone(), vec![mine]);
        let change = ReservationChange {
            contact: Some(contact()),
            ..ReservationChange::default()
        };
        let writes = plan_update(
            &snap,
            mine_id,
            &Caller::member(requester),
            &change,
            Utc::now(),
        )
        .unwrap();
        // Same attendees re-admitted against the exclusive total.
        assert_eq!(writes.cached_count, 4);
        assert_eq!(writes.stats, StatsDelta::NONE);
    }

    // ========== delete ==========

    #[test]
    fn delete_subtracts_exactly_the_countable_contribution() {
        let event = open_event(Some(10));
        let requester = RequesterId::new();
        let mine = reservation_against(&event, requester, 4);
        let mine_id = mine.id;
        let other = reservation_against(&event, RequesterId::new(), 3);
        let snap = snapshot(event.clone(), vec![mine, other]);
        let writes = plan_delete(&snap, mine_id, &Caller::member(requester)).unwrap();
        assert_eq!(writes.cached_count, 3);
        assert_eq!(writes.stats, StatsDelta { reservations: -1, attendees: -4 });
        assert!(matches!(writes.write, ReservationWrite::Remove(id) if id == mine_id));
    }

    #[test]
    fn delete_of_pending_payment_reservation_leaves_count_unchanged() {
        let event = paid_event(Some(10), 2000);
        let requester = RequesterId::new();
        let mine = reservation_against(&event, requester, 4);
        let mine_id = mine.id;
        let mut paid = reservation_against(&event, RequesterId::new(), 5);
        paid.payment_status = PaymentStatus::Completed;
        let snap = snapshot(event.clone(), vec![mine, paid]);
        let writes = plan_delete(&snap, mine_id, &Caller::member(requester)).unwrap();
        // The pending reservation contributed nothing countable.
        assert_eq!(writes.cached_count, 5);
        assert_eq!(writes.stats.attendees, -4);
    }

    #[test]
    fn admin_may_delete_any_reservation() {
        let event = open_event(Some(10));
        let mine = reservation_against(&event, RequesterId::new(), 2);
        let mine_id = mine.id;
        let snap = snapshot(event.clone(), vec![mine]);
        let admin = Caller::with_roles(RequesterId::new(), &[Role::Admin]);
        assert!(plan_delete(&snap, mine_id, &admin).is_ok());

        let stranger = Caller::member(RequesterId::new());
        let err = plan_delete(&snap, mine_id, &stranger).unwrap_err();
        assert!(matches!(err, LedgerError::PermissionDenied(_)));
    }

    #[test]
    fn delete_never_reopens_a_closed_event() {
        let mut event = open_event(Some(2));
        event.closed = true;
        event.cached_count = 2;
        let requester = RequesterId::new();
        let mine = reservation_against(&event, requester, 2);
        let mine_id = mine.id;
        let snap = snapshot(event.clone(), vec![mine]);
        let writes = plan_delete(&snap, mine_id, &Caller::member(requester)).unwrap();
        assert_eq!(writes.cached_count, 0);
        // close_event only ever sets the flag; it is false here and the
        // store leaves the existing closed flag in place.
        assert!(!writes.close_event);
    }

    // ========== payment ==========

    #[test]
    fn payment_completion_makes_the_reservation_countable_and_can_close() {
        let event = paid_event(Some(4), 1500);
        let requester = RequesterId::new();
        let mine = reservation_against(&event, requester, 4);
        let mine_id = mine.id;
        let snap = snapshot(event.clone(), vec![mine]);
        let writes =
            plan_record_payment(&snap, mine_id, &Caller::member(requester), Utc::now()).unwrap();
        assert_eq!(writes.cached_count, 4);
        assert!(writes.close_event);
        assert_eq!(writes.stats, StatsDelta::NONE);
        match writes.write {
            ReservationWrite::Update(r) => {
                assert_eq!(r.payment_status, PaymentStatus::Completed);
            }
            other => panic!("expected update, got {other:?}"),
        }
    }

    #[test]
    fn payment_completion_that_no_longer_fits_is_refused() {
        let event = paid_event(Some(5), 1500);
        let requester = RequesterId::new();
        let mine = reservation_against(&event, requester, 3);
        let mine_id = mine.id;
        let mut paid = reservation_against(&event, RequesterId::new(), 4);
        paid.payment_status = PaymentStatus::Completed;
        let snap = snapshot(event.clone(), vec![mine, paid]);
        let err = plan_record_payment(&snap, mine_id, &Caller::member(requester), Utc::now())
            .unwrap_err();
        assert!(matches!(err, LedgerError::CapacityExhausted { remaining: 1 }));
    }

    #[test]
    fn payment_completion_requires_a_pending_status() {
        let event = open_event(Some(5));
        let requester = RequesterId::new();
        let mine = reservation_against(&event, requester, 2);
        let mine_id = mine.id;
        let snap = snapshot(event.clone(), vec![mine]);
        let err = plan_record_payment(&snap, mine_id, &Caller::member(requester), Utc::now())
            .unwrap_err();
        assert!(matches!(err, LedgerError::PaymentNotPending(_)));
    }

    // ========== reconcile ==========

    #[test]
    fn reconcile_repairs_a_drifted_cached_count() {
        let mut event = open_event(Some(10));
        event.cached_count = 99;
        let r = reservation_against(&event, RequesterId::new(), 3);
        let snap = snapshot(event, vec![r]);
        let writes = plan_reconcile(&snap).unwrap();
        assert_eq!(writes.cached_count, 3);
        assert!(matches!(writes.write, ReservationWrite::None));
        assert!(!writes.close_event);
    }

    #[test]
    fn reconcile_closes_an_event_found_at_capacity() {
        let event = open_event(Some(3));
        let r = reservation_against(&event, RequesterId::new(), 3);
        let snap = snapshot(event, vec![r]);
        let writes = plan_reconcile(&snap).unwrap();
        assert!(writes.close_event);
    }
}
