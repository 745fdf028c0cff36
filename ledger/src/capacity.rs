//! Capacity recomputation engine.
//!
//! Derives the authoritative countable-attendee total for an event by
//! enumerating its reservations, never by trusting a stored counter. The
//! recompute-from-source approach means a skipped or failed counter update
//! elsewhere self-heals on the next read.
//!
//! A reservation is *countable* when the event does not require payment, or
//! when its payment has completed.

use crate::types::{EventRecord, PaymentStatus, Reservation, ReservationId};

/// Number of attendees a reservation contributes.
///
/// An empty attendee list contributes 1, matching the portal's historical
/// treatment of records submitted before the attendee list was mandatory.
#[must_use]
pub fn attendee_count(reservation: &Reservation) -> u32 {
    u32::try_from(reservation.attendees.len().max(1)).unwrap_or(u32::MAX)
}

/// Whether a reservation counts toward the event's capacity.
#[must_use]
pub const fn is_countable(event: &EventRecord, reservation: &Reservation) -> bool {
    !event.payment_required || matches!(reservation.payment_status, PaymentStatus::Completed)
}

/// The authoritative countable-attendee total for an event.
#[must_use]
pub fn countable_total(event: &EventRecord, reservations: &[Reservation]) -> u32 {
    reservations
        .iter()
        .filter(|r| r.event_id == event.id && is_countable(event, r))
        .map(attendee_count)
        .fold(0, u32::saturating_add)
}

/// The countable total with one reservation's own contribution excluded.
///
/// Used when re-validating an update, so a reservation never competes with
/// itself for capacity.
#[must_use]
pub fn countable_total_excluding(
    event: &EventRecord,
    reservations: &[Reservation],
    excluded: ReservationId,
) -> u32 {
    reservations
        .iter()
        .filter(|r| r.event_id == event.id && r.id != excluded && is_countable(event, r))
        .map(attendee_count)
        .fold(0, u32::saturating_add)
}

/// Spots remaining given a freshly recomputed total; `None` when unlimited.
#[must_use]
pub fn remaining(event: &EventRecord, total: u32) -> Option<u32> {
    event.capacity.map(|cap| cap.saturating_sub(total))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{Attendee, ContactInfo, EventId, RequesterId};
    use chrono::Utc;

    fn event(capacity: Option<u32>, payment_required: bool) -> EventRecord {
        let now = Utc::now();
        EventRecord {
            id: EventId::new(),
            title: "Pinewood Derby".to_string(),
            capacity,
            closed: false,
            cached_count: 0,
            payment_required,
            payment_amount_cents: payment_required.then_some(1500),
            payment_currency: payment_required.then(|| "USD".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    fn reservation(event_id: EventId, attendees: usize, status: PaymentStatus) -> Reservation {
        let now = Utc::now();
        Reservation {
            id: ReservationId::new(),
            event_id,
            requester_id: RequesterId::new(),
            attendees: (0..attendees)
                .map(|i| Attendee::adult(format!("attendee-{i}"), 30))
                .collect(),
            contact: ContactInfo::new("Family", "family@example.com"),
            dietary_restrictions: None,
            special_needs: None,
            notes: None,
            payment_status: status,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn totals_sum_attendee_counts() {
        let event = event(Some(10), false);
        let reservations = vec![
            reservation(event.id, 3, PaymentStatus::NotRequired),
            reservation(event.id, 2, PaymentStatus::NotRequired),
        ];
        assert_eq!(countable_total(&event, &reservations), 5);
    }

    #[test]
    fn empty_attendee_list_counts_as_one() {
        let event = event(None, false);
        let r = reservation(event.id, 0, PaymentStatus::NotRequired);
        assert_eq!(attendee_count(&r), 1);
        assert_eq!(countable_total(&event, &[r]), 1);
    }

    #[test]
    fn payment_gating_excludes_pending_reservations() {
        let event = event(Some(10), true);
        let reservations = vec![
            reservation(event.id, 4, PaymentStatus::Completed),
            reservation(event.id, 5, PaymentStatus::Pending),
        ];
        assert_eq!(countable_total(&event, &reservations), 4);
    }

    #[test]
    fn reservations_for_other_events_are_ignored() {
        let event = event(Some(10), false);
        let mut other = reservation(EventId::new(), 7, PaymentStatus::NotRequired);
        other.event_id = EventId::new();
        let mine = reservation(event.id, 2, PaymentStatus::NotRequired);
        assert_eq!(countable_total(&event, &[other, mine]), 2);
    }

    #[test]
    fn excluding_removes_only_the_named_reservation() {
        let event = event(Some(10), false);
        let keep = reservation(event.id, 3, PaymentStatus::NotRequired);
        let excluded = reservation(event.id, 4, PaymentStatus::NotRequired);
        let total = countable_total_excluding(&event, &[keep, excluded.clone()], excluded.id);
        assert_eq!(total, 3);
    }

    #[test]
    fn remaining_floors_at_zero_and_is_none_when_unlimited() {
        let capped = event(Some(5), false);
        assert_eq!(remaining(&capped, 7), Some(0));
        assert_eq!(remaining(&capped, 3), Some(2));
        let unlimited = event(None, false);
        assert_eq!(remaining(&unlimited, 100), None);
    }
}
