//! # Slotbook Ledger
//!
//! Capacity-constrained reservation ledger for a group-events portal.
//!
//! Attendee groups reserve slots against events with finite capacity. The
//! ledger accepts, updates, and withdraws reservations, keeps the derived
//! attendee count consistent under concurrent writers, and closes an event
//! automatically once capacity is reached.
//!
//! ## Core Concepts
//!
//! - **Partition snapshot**: a consistent read of one event plus all of its
//!   reservations, taken inside the store's transaction.
//! - **Decision**: a pure function `(snapshot, command) → WriteSet | error`
//!   that re-derives the countable total and carries every invariant.
//! - **Write set**: everything one commit changes - the reservation row,
//!   the fresh advisory count, the monotonic close flag, the stats delta -
//!   applied atomically or not at all.
//! - **Environment**: clock, notification, and audit collaborators injected
//!   via traits; side effects fire only after commit.
//!
//! ## Architecture Principles
//!
//! - Functional core, imperative shell: decisions are pure, stores own
//!   atomicity and retries.
//! - Recompute from the source of truth: no standalone counter is ever
//!   trusted for a capacity decision.
//! - Typed errors end to end; capacity failures report the exact remaining
//!   spots from the same recomputation that made the decision.
//!
//! ## Example
//!
//! ```ignore
//! use slotbook_ledger::{
//!     BookingCoordinator, Caller, LedgerEnvironment, NewReservation,
//! };
//!
//! async fn book(coordinator: &BookingCoordinator, caller: &Caller) {
//!     let receipt = coordinator
//!         .create_reservation(Some(caller), NewReservation { /* … */ })
//!         .await?;
//!     println!("{} attendees now counted", receipt.new_count);
//! }
//! ```

pub mod capacity;
pub mod coordinator;
pub mod decision;
pub mod environment;
pub mod error;
pub mod identity;
pub mod query;
pub mod store;
pub mod types;
pub mod validate;

pub use coordinator::BookingCoordinator;
pub use environment::{
    AuditEntry, AuditLog, BookingNotice, Clock, LedgerEnvironment, LogAuditLog,
    LogNotificationSink, NotificationSink, SystemClock,
};
pub use error::LedgerError;
pub use identity::{Caller, Capability, CapabilitySet, Role};
pub use query::CountQueries;
pub use store::{
    DecideFn, PartitionSnapshot, ReservationStore, ReservationWrite, StatsDelta, WriteSet,
};
pub use types::{
    Attendee, BookingReceipt, ContactInfo, EventId, EventRecord, NewReservation, PaymentStatus,
    RequesterId, Reservation, ReservationChange, ReservationId, StatsRollup, WithdrawalReceipt,
};
