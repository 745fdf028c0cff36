//! Read-only query surface.
//!
//! Count lookups recompute from the reservation store on every call and
//! have no invariant side effects. The countability rule (payment gating)
//! applies identically to the single and batch paths; display counts and
//! admission decisions always agree.

use crate::capacity;
use crate::error::LedgerError;
use crate::identity::{Capability, Caller};
use crate::store::ReservationStore;
use crate::types::{EventId, RequesterId, Reservation};
use crate::validate;
use std::collections::HashMap;
use std::sync::Arc;

/// Read-only count and listing queries.
#[derive(Clone)]
pub struct CountQueries {
    store: Arc<dyn ReservationStore>,
}

impl CountQueries {
    /// Creates a new `CountQueries`.
    #[must_use]
    pub fn new(store: Arc<dyn ReservationStore>) -> Self {
        Self { store }
    }

    /// Freshly recomputed countable attendee total for one event.
    ///
    /// # Errors
    ///
    /// `EventNotFound` or `Storage`.
    #[tracing::instrument(skip(self), fields(event_id = %event_id))]
    pub async fn get_count(&self, event_id: EventId) -> Result<u32, LedgerError> {
        let snapshot = self.store.partition(event_id).await?;
        Ok(capacity::countable_total(
            &snapshot.event,
            &snapshot.reservations,
        ))
    }

    /// Countable attendee totals for several events in one pass.
    ///
    /// Every requested id appears in the result; unknown events map to 0.
    ///
    /// # Errors
    ///
    /// `Storage` on persistence failure.
    #[tracing::instrument(skip(self, event_ids), fields(events = event_ids.len()))]
    pub async fn get_batch_counts(
        &self,
        event_ids: &[EventId],
    ) -> Result<HashMap<EventId, u32>, LedgerError> {
        let partitions = self.store.batch_partitions(event_ids).await?;
        let mut counts: HashMap<EventId, u32> =
            event_ids.iter().map(|id| (*id, 0)).collect();
        for (event_id, snapshot) in partitions {
            counts.insert(
                event_id,
                capacity::countable_total(&snapshot.event, &snapshot.reservations),
            );
        }
        Ok(counts)
    }

    /// All reservations held by a requester, for display.
    ///
    /// Callers may list their own reservations; listing anyone else's
    /// requires [`Capability::ViewAnyReservation`].
    ///
    /// # Errors
    ///
    /// `Unauthenticated`, `PermissionDenied`, or `Storage`.
    #[tracing::instrument(skip(self, caller))]
    pub async fn list_reservations(
        &self,
        caller: Option<&Caller>,
        requester_id: RequesterId,
    ) -> Result<Vec<Reservation>, LedgerError> {
        let caller = validate::require_caller(caller)?;
        if caller.requester_id != requester_id
            && !caller.capabilities.allows(Capability::ViewAnyReservation)
        {
            return Err(LedgerError::PermissionDenied(
                "You can only view your own reservations".to_string(),
            ));
        }
        self.store.reservations_for_requester(requester_id).await
    }
}
