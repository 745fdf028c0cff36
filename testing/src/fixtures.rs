//! Fixture builders and a fluent decision-test harness.
//!
//! The builders produce well-formed events and reservations with one-line
//! call sites; [`DecisionTest`] gives decision-layer tests a readable
//! Given-When-Then shape.

#![allow(clippy::module_name_repetitions)]

use chrono::Utc;
use slotbook_ledger::error::LedgerError;
use slotbook_ledger::store::{PartitionSnapshot, WriteSet};
use slotbook_ledger::types::{
    Attendee, ContactInfo, EventId, EventRecord, NewReservation, RequesterId, Reservation,
    ReservationId,
};

/// An open, free event with the given capacity (`None` = unlimited).
#[must_use]
pub fn open_event(capacity: Option<u32>) -> EventRecord {
    let now = Utc::now();
    EventRecord {
        id: EventId::new(),
        title: "Fall Campout".to_string(),
        capacity,
        closed: false,
        cached_count: 0,
        payment_required: false,
        payment_amount_cents: None,
        payment_currency: None,
        created_at: now,
        updated_at: now,
    }
}

/// An open event that requires payment.
#[must_use]
pub fn paid_event(capacity: Option<u32>, amount_cents: i64) -> EventRecord {
    let mut event = open_event(capacity);
    event.title = "Blue & Gold Banquet".to_string();
    event.payment_required = true;
    event.payment_amount_cents = Some(amount_cents);
    event.payment_currency = Some("USD".to_string());
    event
}

/// An attendee group of `n` adults.
#[must_use]
pub fn attendees(n: usize) -> Vec<Attendee> {
    (0..n)
        .map(|i| Attendee::adult(format!("Attendee {i}"), 30))
        .collect()
}

/// Contact details that pass validation.
#[must_use]
pub fn contact() -> ContactInfo {
    ContactInfo::new("Johnson", "johnson@example.com")
}

/// A well-formed submission of `n` attendees against an event.
#[must_use]
pub fn submission(event_id: EventId, n: usize) -> NewReservation {
    NewReservation {
        event_id,
        attendees: attendees(n),
        contact: contact(),
        dietary_restrictions: None,
        special_needs: None,
        notes: None,
    }
}

/// An existing reservation of `n` attendees against an event, with the
/// payment status a fresh submission against that event would get.
#[must_use]
pub fn reservation_against(
    event: &EventRecord,
    requester_id: RequesterId,
    n: usize,
) -> Reservation {
    let now = Utc::now();
    Reservation {
        id: ReservationId::new(),
        event_id: event.id,
        requester_id,
        attendees: attendees(n),
        contact: contact(),
        dietary_restrictions: None,
        special_needs: None,
        notes: None,
        payment_status: event.initial_payment_status(),
        created_at: now,
        updated_at: now,
    }
}

/// Type alias for write-set assertion functions
type WriteAssertion = Box<dyn FnOnce(&WriteSet)>;

/// Type alias for error assertion functions
type ErrorAssertion = Box<dyn FnOnce(&LedgerError)>;

/// Type alias for the decision under test
type Decision = Box<dyn FnOnce(&PartitionSnapshot) -> Result<WriteSet, LedgerError>>;

/// Fluent API for testing decision planners with Given-When-Then syntax.
///
/// # Example
///
/// ```ignore
/// use slotbook_testing::DecisionTest;
///
/// DecisionTest::new()
///     .given_event(open_event(Some(5)))
///     .when(move |snap| plan_create(snap, id, requester, &submission, now))
///     .then_writes(|writes| {
///         assert_eq!(writes.cached_count, 3);
///     })
///     .run();
/// ```
#[derive(Default)]
pub struct DecisionTest {
    event: Option<EventRecord>,
    reservations: Vec<Reservation>,
    decision: Option<Decision>,
    write_assertions: Vec<WriteAssertion>,
    error_assertions: Vec<ErrorAssertion>,
}

impl DecisionTest {
    /// Create a new decision test.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the event the partition snapshot describes (Given).
    #[must_use]
    pub fn given_event(mut self, event: EventRecord) -> Self {
        self.event = Some(event);
        self
    }

    /// Add an existing reservation to the snapshot (Given).
    #[must_use]
    pub fn given_reservation(mut self, reservation: Reservation) -> Self {
        self.reservations.push(reservation);
        self
    }

    /// Set the decision under test (When).
    #[must_use]
    pub fn when<F>(mut self, decision: F) -> Self
    where
        F: FnOnce(&PartitionSnapshot) -> Result<WriteSet, LedgerError> + 'static,
    {
        self.decision = Some(Box::new(decision));
        self
    }

    /// Assert on the committed write set; the decision must succeed (Then).
    #[must_use]
    pub fn then_writes<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&WriteSet) + 'static,
    {
        self.write_assertions.push(Box::new(assertion));
        self
    }

    /// Assert on the returned error; the decision must fail (Then).
    #[must_use]
    pub fn then_error<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&LedgerError) + 'static,
    {
        self.error_assertions.push(Box::new(assertion));
        self
    }

    /// Run the decision and execute all assertions.
    ///
    /// # Panics
    ///
    /// Panics if the event or decision is not set, if the decision's
    /// outcome doesn't match the registered assertions, or if any
    /// assertion fails.
    #[allow(clippy::expect_used, clippy::panic)] // Test code can panic
    pub fn run(self) {
        let event = self.event.expect("Event must be set with given_event()");
        let decision = self.decision.expect("Decision must be set with when()");

        let snapshot = PartitionSnapshot {
            event,
            reservations: self.reservations,
            stats: None,
        };

        match decision(&snapshot) {
            Ok(writes) => {
                assert!(
                    self.error_assertions.is_empty(),
                    "Expected an error, but the decision succeeded: {writes:?}"
                );
                for assertion in self.write_assertions {
                    assertion(&writes);
                }
            }
            Err(error) => {
                assert!(
                    self.write_assertions.is_empty(),
                    "Expected a write set, but the decision failed: {error}"
                );
                for assertion in self.error_assertions {
                    assertion(&error);
                }
            }
        }
    }
}
