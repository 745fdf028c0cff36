//! # Slotbook Testing
//!
//! Testing utilities for the Slotbook ledger.
//!
//! Provides an in-memory [`slotbook_ledger::store::ReservationStore`] with
//! the same per-event serialization guarantees as the production store,
//! fixture builders for events and reservations, and a fluent
//! Given-When-Then harness for exercising the pure decision layer.

pub mod fixtures;
pub mod memory;

pub use fixtures::DecisionTest;
pub use memory::InMemoryReservationStore;
