//! Injected dependencies for the booking coordinator.
//!
//! The coordinator's collaborators arrive through trait objects so tests
//! can substitute deterministic implementations: a clock, the notification
//! service, and the admin audit log. Notification and audit failures are
//! the callers' to log, never to propagate - a booking that committed
//! stays committed.

use crate::types::{EventId, RequesterId, ReservationId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// Clock
// ============================================================================

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock implementation of [`Clock`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ============================================================================
// Post-commit collaborators
// ============================================================================

/// What happened to a reservation, for the notification service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BookingNotice {
    /// A reservation was created
    Created {
        /// The reservation
        reservation_id: ReservationId,
        /// Its event
        event_id: EventId,
        /// Its owner
        requester_id: RequesterId,
        /// Attendees in the group
        attendee_count: u32,
        /// Whether payment is still outstanding
        payment_pending: bool,
    },
    /// A reservation's attendee group or contact changed
    Updated {
        /// The reservation
        reservation_id: ReservationId,
        /// Its event
        event_id: EventId,
        /// Attendees after the change
        attendee_count: u32,
    },
    /// A reservation was withdrawn
    Withdrawn {
        /// The reservation
        reservation_id: ReservationId,
        /// Its event
        event_id: EventId,
    },
    /// Payment completed for a reservation
    PaymentRecorded {
        /// The reservation
        reservation_id: ReservationId,
        /// Its event
        event_id: EventId,
    },
    /// An event reached capacity and closed
    EventClosed {
        /// The event
        event_id: EventId,
    },
}

/// Notification delivery service (email/SMS live behind it, elsewhere).
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Deliver a notice.
    ///
    /// # Errors
    ///
    /// Delivery errors are opaque to the ledger; callers log and move on.
    async fn publish(&self, notice: BookingNotice) -> anyhow::Result<()>;
}

/// One admin audit record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AuditEntry {
    /// What happened, e.g. `reservation_deleted`
    pub action: &'static str,
    /// Who did it
    pub actor: RequesterId,
    /// The reservation involved
    pub reservation_id: ReservationId,
    /// The event involved
    pub event_id: EventId,
    /// When it happened
    pub at: DateTime<Utc>,
}

/// Fire-and-forget admin audit log.
#[async_trait]
pub trait AuditLog: Send + Sync {
    /// Append an entry.
    ///
    /// # Errors
    ///
    /// Append errors are opaque to the ledger; callers log and move on.
    async fn append(&self, entry: AuditEntry) -> anyhow::Result<()>;
}

// ============================================================================
// Default implementations
// ============================================================================

/// [`NotificationSink`] that emits notices as structured log lines.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn publish(&self, notice: BookingNotice) -> anyhow::Result<()> {
        tracing::info!(?notice, "booking notice");
        Ok(())
    }
}

/// [`AuditLog`] that emits entries as structured log lines.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogAuditLog;

#[async_trait]
impl AuditLog for LogAuditLog {
    async fn append(&self, entry: AuditEntry) -> anyhow::Result<()> {
        tracing::info!(
            action = entry.action,
            actor = %entry.actor,
            reservation = %entry.reservation_id,
            event = %entry.event_id,
            "audit entry"
        );
        Ok(())
    }
}

// ============================================================================
// Environment
// ============================================================================

/// Environment dependencies for the booking coordinator.
#[derive(Clone)]
pub struct LedgerEnvironment {
    /// Clock for record timestamps
    pub clock: Arc<dyn Clock>,
    /// Post-commit notification delivery
    pub notifications: Arc<dyn NotificationSink>,
    /// Fire-and-forget admin audit log
    pub audit: Arc<dyn AuditLog>,
}

impl LedgerEnvironment {
    /// Creates a new `LedgerEnvironment`.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        notifications: Arc<dyn NotificationSink>,
        audit: Arc<dyn AuditLog>,
    ) -> Self {
        Self {
            clock,
            notifications,
            audit,
        }
    }

    /// Production wiring: system clock, log-backed collaborators.
    #[must_use]
    pub fn live() -> Self {
        Self::new(
            Arc::new(SystemClock),
            Arc::new(LogNotificationSink),
            Arc::new(LogAuditLog),
        )
    }
}
