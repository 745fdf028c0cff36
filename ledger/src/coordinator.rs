//! Booking transaction coordinator.
//!
//! The only writer of event capacity state. Each operation runs the shape
//! validator, then hands a pure planner from [`crate::decision`] to the
//! store's serializable per-event transaction, and finally dispatches
//! notification and audit side effects as fire-and-forget tasks. Side
//! effects never unwind a committed booking.

use crate::decision;
use crate::environment::{AuditEntry, BookingNotice, LedgerEnvironment};
use crate::error::LedgerError;
use crate::identity::Caller;
use crate::store::{ReservationStore, ReservationWrite, WriteSet};
use crate::types::{
    BookingReceipt, EventId, NewReservation, Reservation, ReservationChange, ReservationId,
    WithdrawalReceipt,
};
use crate::validate;
use smallvec::SmallVec;
use std::sync::Arc;

/// Post-commit side effects of one booking commit.
type SideEffects = SmallVec<[SideEffect; 2]>;

enum SideEffect {
    Notify(BookingNotice),
    Audit(AuditEntry),
}

/// Coordinates reservation bookings against a [`ReservationStore`].
#[derive(Clone)]
pub struct BookingCoordinator {
    store: Arc<dyn ReservationStore>,
    env: LedgerEnvironment,
}

impl BookingCoordinator {
    /// Creates a new `BookingCoordinator`.
    #[must_use]
    pub fn new(store: Arc<dyn ReservationStore>, env: LedgerEnvironment) -> Self {
        Self { store, env }
    }

    /// The store this coordinator writes through.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn ReservationStore> {
        &self.store
    }

    /// Create a reservation for the caller against an event.
    ///
    /// # Errors
    ///
    /// `Unauthenticated`, `InvalidArgument`, `EventNotFound`,
    /// `AlreadyExists`, `EventClosed`, `CapacityExhausted`, or `Storage`.
    #[tracing::instrument(skip(self, caller, submission), fields(event_id = %submission.event_id))]
    pub async fn create_reservation(
        &self,
        caller: Option<&Caller>,
        submission: NewReservation,
    ) -> Result<BookingReceipt, LedgerError> {
        let caller = validate::require_caller(caller)?;
        validate::validate_attendees(&submission.attendees)?;
        validate::validate_contact(&submission.contact)?;

        let reservation_id = ReservationId::new();
        let requester_id = caller.requester_id;
        let now = self.env.clock.now();

        let decide = |snapshot: &crate::store::PartitionSnapshot| {
            decision::plan_create(snapshot, reservation_id, requester_id, &submission, now)
        };
        let writes = self.store.transact(submission.event_id, &decide).await?;

        metrics::counter!("slotbook_reservations_created_total").increment(1);

        let payment_pending = matches!(
            &writes.write,
            ReservationWrite::Insert(r)
                if r.payment_status == crate::types::PaymentStatus::Pending
        );
        let attendee_count = u32::try_from(submission.attendees.len()).unwrap_or(u32::MAX);

        let mut effects = SideEffects::new();
        effects.push(SideEffect::Notify(BookingNotice::Created {
            reservation_id,
            event_id: submission.event_id,
            requester_id,
            attendee_count,
            payment_pending,
        }));
        if writes.close_event {
            effects.push(SideEffect::Notify(BookingNotice::EventClosed {
                event_id: submission.event_id,
            }));
        }
        self.dispatch(effects);

        let message = if payment_pending {
            "Reservation submitted. Payment required to complete registration.".to_string()
        } else {
            "Reservation submitted successfully".to_string()
        };

        Ok(BookingReceipt {
            reservation_id,
            event_id: submission.event_id,
            new_count: writes.cached_count,
            event_closed: writes.close_event,
            message,
        })
    }

    /// Update a reservation's attendee group or contact details.
    ///
    /// # Errors
    ///
    /// `Unauthenticated`, `ReservationNotFound`, `PermissionDenied`,
    /// `InvalidArgument`, `CapacityExhausted`, or `Storage`.
    #[tracing::instrument(skip(self, caller, change), fields(reservation_id = %reservation_id))]
    pub async fn update_reservation(
        &self,
        caller: Option<&Caller>,
        reservation_id: ReservationId,
        change: ReservationChange,
    ) -> Result<BookingReceipt, LedgerError> {
        let caller = validate::require_caller(caller)?;
        let existing = self.locate(reservation_id).await?;
        let now = self.env.clock.now();

        let decide = |snapshot: &crate::store::PartitionSnapshot| {
            decision::plan_update(snapshot, reservation_id, caller, &change, now)
        };
        let writes = self.store.transact(existing.event_id, &decide).await?;

        metrics::counter!("slotbook_reservations_updated_total").increment(1);

        let attendee_count = match &writes.write {
            ReservationWrite::Update(r) => u32::try_from(r.attendees.len()).unwrap_or(u32::MAX),
            _ => 0,
        };
        let mut effects = SideEffects::new();
        effects.push(SideEffect::Notify(BookingNotice::Updated {
            reservation_id,
            event_id: existing.event_id,
            attendee_count,
        }));
        if writes.close_event {
            effects.push(SideEffect::Notify(BookingNotice::EventClosed {
                event_id: existing.event_id,
            }));
        }
        self.dispatch(effects);

        Ok(BookingReceipt {
            reservation_id,
            event_id: existing.event_id,
            new_count: writes.cached_count,
            event_closed: writes.close_event,
            message: "Reservation updated successfully".to_string(),
        })
    }

    /// Withdraw a reservation. Owners may withdraw their own; holders of
    /// the delete-any capability may withdraw anyone's.
    ///
    /// # Errors
    ///
    /// `Unauthenticated`, `ReservationNotFound`, `PermissionDenied`, or
    /// `Storage`.
    #[tracing::instrument(skip(self, caller), fields(reservation_id = %reservation_id))]
    pub async fn delete_reservation(
        &self,
        caller: Option<&Caller>,
        reservation_id: ReservationId,
    ) -> Result<WithdrawalReceipt, LedgerError> {
        let caller = validate::require_caller(caller)?;
        let existing = self.locate(reservation_id).await?;

        let decide = |snapshot: &crate::store::PartitionSnapshot| {
            decision::plan_delete(snapshot, reservation_id, caller)
        };
        let writes = self.store.transact(existing.event_id, &decide).await?;

        metrics::counter!("slotbook_reservations_deleted_total").increment(1);

        let mut effects = SideEffects::new();
        effects.push(SideEffect::Notify(BookingNotice::Withdrawn {
            reservation_id,
            event_id: existing.event_id,
        }));
        effects.push(SideEffect::Audit(AuditEntry {
            action: "reservation_deleted",
            actor: caller.requester_id,
            reservation_id,
            event_id: existing.event_id,
            at: self.env.clock.now(),
        }));
        self.dispatch(effects);

        Ok(WithdrawalReceipt {
            reservation_id,
            event_id: existing.event_id,
            new_count: writes.cached_count,
        })
    }

    /// Record that payment completed for a pending reservation, making it
    /// countable.
    ///
    /// # Errors
    ///
    /// `Unauthenticated`, `ReservationNotFound`, `PermissionDenied`,
    /// `PaymentNotPending`, `CapacityExhausted`, or `Storage`.
    #[tracing::instrument(skip(self, caller), fields(reservation_id = %reservation_id))]
    pub async fn record_payment_completed(
        &self,
        caller: Option<&Caller>,
        reservation_id: ReservationId,
    ) -> Result<BookingReceipt, LedgerError> {
        let caller = validate::require_caller(caller)?;
        let existing = self.locate(reservation_id).await?;
        let now = self.env.clock.now();

        let decide = |snapshot: &crate::store::PartitionSnapshot| {
            decision::plan_record_payment(snapshot, reservation_id, caller, now)
        };
        let writes = self.store.transact(existing.event_id, &decide).await?;

        metrics::counter!("slotbook_payments_recorded_total").increment(1);

        let mut effects = SideEffects::new();
        effects.push(SideEffect::Notify(BookingNotice::PaymentRecorded {
            reservation_id,
            event_id: existing.event_id,
        }));
        if writes.close_event {
            effects.push(SideEffect::Notify(BookingNotice::EventClosed {
                event_id: existing.event_id,
            }));
        }
        self.dispatch(effects);

        Ok(BookingReceipt {
            reservation_id,
            event_id: existing.event_id,
            new_count: writes.cached_count,
            event_closed: writes.close_event,
            message: "Payment recorded successfully".to_string(),
        })
    }

    /// Recompute an event's countable total and repair its advisory
    /// snapshot. Audit/self-heal path; returns the fresh total.
    ///
    /// # Errors
    ///
    /// `EventNotFound` or `Storage`.
    #[tracing::instrument(skip(self), fields(event_id = %event_id))]
    pub async fn reconcile_cached_count(&self, event_id: EventId) -> Result<u32, LedgerError> {
        let decide =
            |snapshot: &crate::store::PartitionSnapshot| decision::plan_reconcile(snapshot);
        let writes: WriteSet = self.store.transact(event_id, &decide).await?;
        if writes.close_event {
            let mut effects = SideEffects::new();
            effects.push(SideEffect::Notify(BookingNotice::EventClosed { event_id }));
            self.dispatch(effects);
        }
        Ok(writes.cached_count)
    }

    /// Find a reservation, surfacing a typed not-found error.
    async fn locate(&self, reservation_id: ReservationId) -> Result<Reservation, LedgerError> {
        self.store
            .reservation(reservation_id)
            .await?
            .ok_or(LedgerError::ReservationNotFound(reservation_id))
    }

    /// Dispatch side effects as detached tasks. Failures are logged and
    /// swallowed; the commit already happened.
    fn dispatch(&self, effects: SideEffects) {
        for effect in effects {
            match effect {
                SideEffect::Notify(notice) => {
                    let sink = Arc::clone(&self.env.notifications);
                    tokio::spawn(async move {
                        if let Err(error) = sink.publish(notice).await {
                            tracing::warn!(%error, "notification delivery failed");
                        }
                    });
                }
                SideEffect::Audit(entry) => {
                    let log = Arc::clone(&self.env.audit);
                    tokio::spawn(async move {
                        if let Err(error) = log.append(entry).await {
                            tracing::warn!(%error, "audit append failed");
                        }
                    });
                }
            }
        }
    }
}
