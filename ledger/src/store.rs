//! Reservation store abstraction.
//!
//! The store is the only write path for capacity state. Its central
//! operation, [`ReservationStore::transact`], reads a consistent snapshot of
//! one event's partition (the event record, every reservation against it,
//! and its stats rollup), hands the snapshot to a pure decision callback,
//! and applies the returned [`WriteSet`] atomically. The recomputation read
//! and the commit are one unit; a check-then-act race across two round
//! trips cannot occur.
//!
//! Implementations must serialize `transact` calls per event: of N
//! concurrent transactions for the same event, each observes either the
//! state before or after every other, never in between.

use crate::error::LedgerError;
use crate::types::{
    EventId, EventRecord, RequesterId, Reservation, ReservationId, StatsRollup,
};
use async_trait::async_trait;
use std::collections::HashMap;

/// A consistent read of one event's reservation partition.
#[derive(Clone, Debug)]
pub struct PartitionSnapshot {
    /// The event record
    pub event: EventRecord,
    /// Every reservation against the event
    pub reservations: Vec<Reservation>,
    /// Stats rollup, if one has been written
    pub stats: Option<StatsRollup>,
}

impl PartitionSnapshot {
    /// Find a reservation in the snapshot by id.
    #[must_use]
    pub fn reservation(&self, id: ReservationId) -> Option<&Reservation> {
        self.reservations.iter().find(|r| r.id == id)
    }

    /// Find a requester's reservation in the snapshot.
    #[must_use]
    pub fn reservation_for(&self, requester_id: RequesterId) -> Option<&Reservation> {
        self.reservations
            .iter()
            .find(|r| r.requester_id == requester_id)
    }
}

/// The reservation mutation a decision commits.
#[derive(Clone, Debug)]
pub enum ReservationWrite {
    /// Persist a new reservation
    Insert(Reservation),
    /// Replace an existing reservation
    Update(Reservation),
    /// Delete a reservation
    Remove(ReservationId),
    /// Touch no reservation row (counter reconciliation)
    None,
}

/// Signed adjustment to the stats rollup, applied with a floor of zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatsDelta {
    /// Change in reservation count
    pub reservations: i64,
    /// Change in attendee count
    pub attendees: i64,
}

impl StatsDelta {
    /// A delta that changes nothing.
    pub const NONE: Self = Self {
        reservations: 0,
        attendees: 0,
    };
}

/// Everything one booking decision commits, atomically.
#[derive(Clone, Debug)]
pub struct WriteSet {
    /// Reservation mutation
    pub write: ReservationWrite,
    /// Fresh countable total to record as the event's advisory snapshot
    pub cached_count: u32,
    /// Whether this commit transitions the event to closed (monotonic;
    /// never clears an existing closed flag)
    pub close_event: bool,
    /// Stats rollup adjustment
    pub stats: StatsDelta,
}

/// Decision callback run by the store inside its transaction.
///
/// Must be pure with respect to the snapshot: implementations may invoke it
/// again with a fresh snapshot when the transaction is retried.
pub type DecideFn<'a> =
    &'a (dyn Fn(&PartitionSnapshot) -> Result<WriteSet, LedgerError> + Send + Sync);

/// Persistent store for events, reservations, and stats rollups.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Create or replace an event descriptor.
    ///
    /// Ingress for the external event-management collaborator; the booking
    /// coordinator itself never calls this.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] on persistence failure.
    async fn put_event(&self, event: EventRecord) -> Result<(), LedgerError>;

    /// Fetch an event descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] on persistence failure.
    async fn event(&self, event_id: EventId) -> Result<Option<EventRecord>, LedgerError>;

    /// Read a consistent snapshot of one event's partition.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::EventNotFound`] for an unknown event, or
    /// [`LedgerError::Storage`] on persistence failure.
    async fn partition(&self, event_id: EventId) -> Result<PartitionSnapshot, LedgerError>;

    /// Read partitions for several events in one pass.
    ///
    /// Unknown events are simply absent from the result.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] on persistence failure.
    async fn batch_partitions(
        &self,
        event_ids: &[EventId],
    ) -> Result<HashMap<EventId, PartitionSnapshot>, LedgerError>;

    /// Look up a reservation by id.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] on persistence failure.
    async fn reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Option<Reservation>, LedgerError>;

    /// All reservations held by a requester, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Storage`] on persistence failure.
    async fn reservations_for_requester(
        &self,
        requester_id: RequesterId,
    ) -> Result<Vec<Reservation>, LedgerError>;

    /// Run a decision against the event's partition and apply its writes
    /// atomically.
    ///
    /// The snapshot passed to `decide` and the application of the returned
    /// [`WriteSet`] happen inside one serializable unit scoped to the
    /// event. The callback's typed error aborts the transaction and is
    /// returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::EventNotFound`] for an unknown event,
    /// whatever error `decide` produced, or [`LedgerError::Storage`] when
    /// the transaction cannot commit.
    async fn transact(
        &self,
        event_id: EventId,
        decide: DecideFn<'_>,
    ) -> Result<WriteSet, LedgerError>;
}
