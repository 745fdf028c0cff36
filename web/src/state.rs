//! Application state for Axum handlers.

use slotbook_ledger::store::ReservationStore;
use slotbook_ledger::{BookingCoordinator, CountQueries, LedgerEnvironment};
use std::sync::Arc;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    /// The booking transaction coordinator (sole capacity writer)
    pub coordinator: BookingCoordinator,
    /// Read-only count and listing queries
    pub queries: CountQueries,
    /// The underlying store, for event-descriptor ingress
    pub store: Arc<dyn ReservationStore>,
}

impl AppState {
    /// Wire up handlers around a store and environment.
    #[must_use]
    pub fn new(store: Arc<dyn ReservationStore>, env: LedgerEnvironment) -> Self {
        Self {
            coordinator: BookingCoordinator::new(Arc::clone(&store), env),
            queries: CountQueries::new(Arc::clone(&store)),
            store,
        }
    }
}
