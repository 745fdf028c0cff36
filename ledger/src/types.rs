//! Domain types for the reservation ledger.
//!
//! This module contains the identifiers, value objects, and records the ledger
//! operates on: events with finite capacity, per-requester reservations, and
//! the informational stats rollup.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for an event
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(Uuid);

impl EventId {
    /// Creates a new random `EventId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create an `EventId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a reservation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationId(Uuid);

impl ReservationId {
    /// Creates a new random `ReservationId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `ReservationId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ReservationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a requester (the attendee group's account holder).
///
/// Supplied by the external identity collaborator; the ledger never mints
/// requester identities of its own.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequesterId(Uuid);

impl RequesterId {
    /// Creates a new random `RequesterId` (test and fixture use)
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `RequesterId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequesterId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Value objects
// ============================================================================

/// A single member of a reservation's attendee group.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attendee {
    /// Attendee display name
    pub name: String,
    /// Attendee age in years
    pub age: u8,
    /// Whether the attendee is an adult
    pub is_adult: bool,
}

impl Attendee {
    /// Creates an adult attendee
    #[must_use]
    pub fn adult(name: impl Into<String>, age: u8) -> Self {
        Self {
            name: name.into(),
            age,
            is_adult: true,
        }
    }

    /// Creates a child attendee
    #[must_use]
    pub fn child(name: impl Into<String>, age: u8) -> Self {
        Self {
            name: name.into(),
            age,
            is_adult: false,
        }
    }
}

/// Contact details attached to a reservation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    /// Family or group name the reservation is held under
    pub family_name: String,
    /// Contact email address
    pub email: String,
    /// Optional contact phone number
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl ContactInfo {
    /// Creates contact info with the required fields
    #[must_use]
    pub fn new(family_name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            family_name: family_name.into(),
            email: email.into(),
            phone: None,
        }
    }
}

/// Payment state of a reservation with respect to its event.
///
/// Only `Completed` reservations count toward capacity when the event
/// requires payment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// The event does not require payment
    NotRequired,
    /// Payment is required and has not yet completed
    Pending,
    /// Payment completed; the reservation counts toward capacity
    Completed,
}

impl PaymentStatus {
    /// Convert status to its database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NotRequired => "not_required",
            Self::Pending => "pending",
            Self::Completed => "completed",
        }
    }

    /// Parse status from its database string representation.
    ///
    /// # Errors
    ///
    /// Returns the unrecognized input if it doesn't match a known status.
    pub fn parse(s: &str) -> Result<Self, String> {
        match s {
            "not_required" => Ok(Self::NotRequired),
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            other => Err(format!("invalid payment status: {other}")),
        }
    }
}

// ============================================================================
// Records
// ============================================================================

/// An event as the ledger sees it.
///
/// Created and mutated by the external event-management collaborator, with
/// two exceptions: `cached_count` and `closed` are written only by the
/// booking coordinator, inside the same transaction as the reservation
/// writes that justify them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Event identifier
    pub id: EventId,
    /// Event title
    pub title: String,
    /// Maximum countable attendees; `None` means unlimited
    pub capacity: Option<u32>,
    /// Whether the event has stopped accepting reservations
    pub closed: bool,
    /// Advisory snapshot of the countable attendee total.
    ///
    /// Always recomputed from the reservation store before a capacity
    /// decision; never trusted on its own.
    pub cached_count: u32,
    /// Whether reservations must complete payment to count toward capacity
    pub payment_required: bool,
    /// Payment amount in minor units, when payment is required
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_amount_cents: Option<i64>,
    /// ISO currency code for the payment amount
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_currency: Option<String>,
    /// When the event was created
    pub created_at: DateTime<Utc>,
    /// When the event was last updated
    pub updated_at: DateTime<Utc>,
}

impl EventRecord {
    /// Initial payment status for a new reservation against this event.
    #[must_use]
    pub const fn initial_payment_status(&self) -> PaymentStatus {
        if self.payment_required {
            PaymentStatus::Pending
        } else {
            PaymentStatus::NotRequired
        }
    }
}

/// A single requester's attendee-group booking against an event.
///
/// At most one reservation exists per (`event_id`, `requester_id`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    /// Reservation identifier
    pub id: ReservationId,
    /// Event this reservation is against
    pub event_id: EventId,
    /// Owner of the reservation
    pub requester_id: RequesterId,
    /// Attendee group, ordered as submitted; 1–20 members
    pub attendees: Vec<Attendee>,
    /// Contact details
    pub contact: ContactInfo,
    /// Dietary restrictions free text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dietary_restrictions: Option<String>,
    /// Special needs free text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_needs: Option<String>,
    /// Additional notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Payment state with respect to the event
    pub payment_status: PaymentStatus,
    /// When the reservation was created
    pub created_at: DateTime<Utc>,
    /// When the reservation was last updated
    pub updated_at: DateTime<Utc>,
}

/// Secondary, eventually-consistent rollup for reporting.
///
/// Write-through and informational only; capacity decisions never read it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsRollup {
    /// Event this rollup describes
    pub event_id: EventId,
    /// Number of reservations
    pub reservation_count: u64,
    /// Total attendees across reservations (not payment-gated)
    pub attendee_count: u64,
    /// When the rollup was last touched
    pub updated_at: DateTime<Utc>,
}

impl StatsRollup {
    /// An empty rollup for an event.
    #[must_use]
    pub const fn empty(event_id: EventId, at: DateTime<Utc>) -> Self {
        Self {
            event_id,
            reservation_count: 0,
            attendee_count: 0,
            updated_at: at,
        }
    }
}

// ============================================================================
// Submission payloads
// ============================================================================

/// A reservation intent as submitted by a requester.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewReservation {
    /// Event to reserve against
    pub event_id: EventId,
    /// Attendee group
    pub attendees: Vec<Attendee>,
    /// Contact details
    pub contact: ContactInfo,
    /// Dietary restrictions free text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dietary_restrictions: Option<String>,
    /// Special needs free text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_needs: Option<String>,
    /// Additional notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Requested changes to an existing reservation.
///
/// `None` fields are left untouched.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationChange {
    /// Replacement attendee group
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attendees: Option<Vec<Attendee>>,
    /// Replacement contact details
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contact: Option<ContactInfo>,
    /// Replacement dietary restrictions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dietary_restrictions: Option<String>,
    /// Replacement special needs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub special_needs: Option<String>,
    /// Replacement notes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

// ============================================================================
// Receipts
// ============================================================================

/// Result of a successful booking commit (create, update, or payment).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingReceipt {
    /// The reservation the commit touched
    pub reservation_id: ReservationId,
    /// Event the reservation is against
    pub event_id: EventId,
    /// Countable attendee total after the commit
    pub new_count: u32,
    /// Whether this commit closed the event
    pub event_closed: bool,
    /// Human-readable outcome message
    pub message: String,
}

/// Result of a successful withdrawal.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalReceipt {
    /// The deleted reservation
    pub reservation_id: ReservationId,
    /// Event the reservation was against
    pub event_id: EventId,
    /// Countable attendee total after the commit
    pub new_count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_status_round_trips_through_strings() {
        for status in [
            PaymentStatus::NotRequired,
            PaymentStatus::Pending,
            PaymentStatus::Completed,
        ] {
            assert_eq!(PaymentStatus::parse(status.as_str()), Ok(status));
        }
        assert!(PaymentStatus::parse("refunded").is_err());
    }

    #[test]
    fn initial_payment_status_follows_event() {
        let now = Utc::now();
        let mut event = EventRecord {
            id: EventId::new(),
            title: "Campout".to_string(),
            capacity: Some(10),
            closed: false,
            cached_count: 0,
            payment_required: false,
            payment_amount_cents: None,
            payment_currency: None,
            created_at: now,
            updated_at: now,
        };
        assert_eq!(event.initial_payment_status(), PaymentStatus::NotRequired);
        event.payment_required = true;
        assert_eq!(event.initial_payment_status(), PaymentStatus::Pending);
    }
}
