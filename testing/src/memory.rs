//! In-memory reservation store.
//!
//! Backs coordinator and query tests without a database while honoring the
//! store contract: `transact` calls for the same event are serialized by a
//! per-event async mutex, so the snapshot a decision sees and the writes it
//! commits form one atomic unit, exactly as in the production store.

use async_trait::async_trait;
use chrono::Utc;
use slotbook_ledger::error::LedgerError;
use slotbook_ledger::store::{
    DecideFn, PartitionSnapshot, ReservationStore, ReservationWrite, WriteSet,
};
use slotbook_ledger::types::{
    EventId, EventRecord, RequesterId, Reservation, ReservationId, StatsRollup,
};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

#[derive(Default)]
struct StoreState {
    events: HashMap<EventId, EventRecord>,
    reservations: HashMap<ReservationId, Reservation>,
    stats: HashMap<EventId, StatsRollup>,
}

/// In-memory [`ReservationStore`] with per-event write serialization.
#[derive(Default)]
pub struct InMemoryReservationStore {
    partitions: Mutex<HashMap<EventId, Arc<Mutex<()>>>>,
    state: RwLock<StoreState>,
}

impl InMemoryReservationStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-seeded with events.
    #[must_use]
    pub fn with_events(events: impl IntoIterator<Item = EventRecord>) -> Self {
        let store = Self::new();
        {
            let mut state = store
                .state
                .write()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            for event in events {
                state.events.insert(event.id, event);
            }
        }
        store
    }

    /// The stats rollup for an event, if any writes touched it.
    #[must_use]
    pub fn stats(&self, event_id: EventId) -> Option<StatsRollup> {
        self.state
            .read()
            .ok()
            .and_then(|state| state.stats.get(&event_id).cloned())
    }

    fn read_state<T>(
        &self,
        f: impl FnOnce(&StoreState) -> T,
    ) -> Result<T, LedgerError> {
        let state = self
            .state
            .read()
            .map_err(|_| LedgerError::Storage("state lock poisoned".to_string()))?;
        Ok(f(&state))
    }

    fn read_partition(&self, event_id: EventId) -> Result<PartitionSnapshot, LedgerError> {
        self.read_state(|state| {
            state.events.get(&event_id).map(|event| PartitionSnapshot {
                event: event.clone(),
                reservations: state
                    .reservations
                    .values()
                    .filter(|r| r.event_id == event_id)
                    .cloned()
                    .collect(),
                stats: state.stats.get(&event_id).cloned(),
            })
        })?
        .ok_or(LedgerError::EventNotFound(event_id))
    }

    fn apply(&self, event_id: EventId, writes: &WriteSet) -> Result<(), LedgerError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| LedgerError::Storage("state lock poisoned".to_string()))?;
        let now = Utc::now();

        match &writes.write {
            ReservationWrite::Insert(r) | ReservationWrite::Update(r) => {
                state.reservations.insert(r.id, r.clone());
            }
            ReservationWrite::Remove(id) => {
                state.reservations.remove(id);
            }
            ReservationWrite::None => {}
        }

        let event = state
            .events
            .get_mut(&event_id)
            .ok_or(LedgerError::EventNotFound(event_id))?;
        event.cached_count = writes.cached_count;
        if writes.close_event {
            event.closed = true;
        }
        event.updated_at = now;

        let stats = state
            .stats
            .entry(event_id)
            .or_insert_with(|| StatsRollup::empty(event_id, now));
        stats.reservation_count = add_signed(stats.reservation_count, writes.stats.reservations);
        stats.attendee_count = add_signed(stats.attendee_count, writes.stats.attendees);
        stats.updated_at = now;

        Ok(())
    }
}

/// Apply a signed delta to an unsigned rollup value, floored at zero.
const fn add_signed(value: u64, delta: i64) -> u64 {
    if delta >= 0 {
        value.saturating_add(delta.unsigned_abs())
    } else {
        value.saturating_sub(delta.unsigned_abs())
    }
}

#[async_trait]
impl ReservationStore for InMemoryReservationStore {
    async fn put_event(&self, event: EventRecord) -> Result<(), LedgerError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| LedgerError::Storage("state lock poisoned".to_string()))?;
        state.events.insert(event.id, event);
        Ok(())
    }

    async fn event(&self, event_id: EventId) -> Result<Option<EventRecord>, LedgerError> {
        self.read_state(|state| state.events.get(&event_id).cloned())
    }

    async fn partition(&self, event_id: EventId) -> Result<PartitionSnapshot, LedgerError> {
        self.read_partition(event_id)
    }

    async fn batch_partitions(
        &self,
        event_ids: &[EventId],
    ) -> Result<HashMap<EventId, PartitionSnapshot>, LedgerError> {
        let mut partitions = HashMap::new();
        for event_id in event_ids {
            match self.read_partition(*event_id) {
                Ok(snapshot) => {
                    partitions.insert(*event_id, snapshot);
                }
                Err(LedgerError::EventNotFound(_)) => {}
                Err(error) => return Err(error),
            }
        }
        Ok(partitions)
    }

    async fn reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Option<Reservation>, LedgerError> {
        self.read_state(|state| state.reservations.get(&reservation_id).cloned())
    }

    async fn reservations_for_requester(
        &self,
        requester_id: RequesterId,
    ) -> Result<Vec<Reservation>, LedgerError> {
        self.read_state(|state| {
            let mut reservations: Vec<Reservation> = state
                .reservations
                .values()
                .filter(|r| r.requester_id == requester_id)
                .cloned()
                .collect();
            reservations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            reservations
        })
    }

    async fn transact(
        &self,
        event_id: EventId,
        decide: DecideFn<'_>,
    ) -> Result<WriteSet, LedgerError> {
        let partition_lock = {
            let mut locks = self.partitions.lock().await;
            Arc::clone(locks.entry(event_id).or_default())
        };
        let _guard = partition_lock.lock().await;

        let snapshot = self.read_partition(event_id)?;
        let writes = decide(&snapshot)?;
        self.apply(event_id, &writes)?;
        Ok(writes)
    }
}
