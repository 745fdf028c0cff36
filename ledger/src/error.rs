//! Error taxonomy for the reservation ledger.
//!
//! Every fallible ledger operation surfaces one of these variants. Each maps
//! to a stable wire code so transports (HTTP, RPC) can translate uniformly.

use crate::types::{EventId, RequesterId, ReservationId};
use thiserror::Error;

/// Errors produced by ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No caller identity was supplied.
    #[error("a verified caller identity is required")]
    Unauthenticated,

    /// The request shape or bounds are invalid.
    #[error("{0}")]
    InvalidArgument(String),

    /// The requester already holds a reservation for this event.
    #[error("a reservation already exists for event {event_id}")]
    AlreadyExists {
        /// Event the duplicate targets
        event_id: EventId,
        /// Requester who already holds a reservation
        requester_id: RequesterId,
    },

    /// The event does not exist.
    #[error("event {0} not found")]
    EventNotFound(EventId),

    /// The reservation does not exist.
    #[error("reservation {0} not found")]
    ReservationNotFound(ReservationId),

    /// The event is closed to new reservations.
    #[error("event {0} is closed to new reservations")]
    EventClosed(EventId),

    /// The reservation's payment is not in the pending state.
    #[error("reservation {0} has no pending payment")]
    PaymentNotPending(ReservationId),

    /// Admitting the attendees would exceed the event's capacity.
    #[error("Event is at capacity. Only {remaining} spots remaining.")]
    CapacityExhausted {
        /// Spots still available, from the same recomputation that made
        /// the decision
        remaining: u32,
    },

    /// The caller may not perform this operation.
    #[error("{0}")]
    PermissionDenied(String),

    /// The persistent store failed; no partial write is visible.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl LedgerError {
    /// Stable wire code for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::InvalidArgument(_) => "INVALID_ARGUMENT",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",
            Self::EventNotFound(_) | Self::ReservationNotFound(_) => "NOT_FOUND",
            Self::EventClosed(_) | Self::PaymentNotPending(_) => "FAILED_PRECONDITION",
            Self::CapacityExhausted { .. } => "RESOURCE_EXHAUSTED",
            Self::PermissionDenied(_) => "PERMISSION_DENIED",
            Self::Storage(_) => "INTERNAL",
        }
    }
}
