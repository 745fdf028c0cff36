//! PostgreSQL reservation store for the Slotbook ledger.
//!
//! Implements [`ReservationStore`] on top of sqlx. The booking write path,
//! [`ReservationStore::transact`], runs as a `SERIALIZABLE` transaction
//! anchored on the event row (`SELECT … FOR UPDATE`), so the partition
//! snapshot the decision sees and the writes it commits are one atomic
//! unit. Serialization conflicts abort cleanly and are retried with
//! jittered backoff; the pure decision callback simply re-runs against the
//! fresh snapshot.
//!
//! Reservations are stored as JSONB documents alongside the few columns
//! the recomputation scan and the uniqueness invariant need
//! (`attendee_count`, `payment_status`, and a unique
//! (`event_id`, `requester_id`) index).

#![forbid(unsafe_code)]

pub mod retry;

pub use retry::RetryPolicy;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use slotbook_ledger::error::LedgerError;
use slotbook_ledger::store::{
    DecideFn, PartitionSnapshot, ReservationStore, ReservationWrite, WriteSet,
};
use slotbook_ledger::types::{
    EventId, EventRecord, RequesterId, Reservation, ReservationId, StatsRollup,
};
use sqlx::types::JsonValue;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use uuid::Uuid;

const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";
const UNIQUE_VIOLATION: &str = "23505";

/// Create the ledger schema if it does not exist.
///
/// # Errors
///
/// Returns [`LedgerError::Storage`] if any statement fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), LedgerError> {
    for statement in [
        r"
        CREATE TABLE IF NOT EXISTS events (
            id UUID PRIMARY KEY,
            title TEXT NOT NULL,
            capacity INTEGER,
            closed BOOLEAN NOT NULL DEFAULT FALSE,
            cached_count INTEGER NOT NULL DEFAULT 0,
            payment_required BOOLEAN NOT NULL DEFAULT FALSE,
            payment_amount_cents BIGINT,
            payment_currency TEXT,
            created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        ",
        r"
        CREATE TABLE IF NOT EXISTS reservations (
            id UUID PRIMARY KEY,
            event_id UUID NOT NULL REFERENCES events(id) ON DELETE CASCADE,
            requester_id UUID NOT NULL,
            attendee_count INTEGER NOT NULL,
            payment_status TEXT NOT NULL,
            data JSONB NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            updated_at TIMESTAMPTZ NOT NULL,
            CONSTRAINT reservations_one_per_requester UNIQUE (event_id, requester_id)
        )
        ",
        "CREATE INDEX IF NOT EXISTS idx_reservations_event ON reservations(event_id)",
        "CREATE INDEX IF NOT EXISTS idx_reservations_requester ON reservations(requester_id)",
        r"
        CREATE TABLE IF NOT EXISTS event_stats (
            event_id UUID PRIMARY KEY,
            reservation_count BIGINT NOT NULL DEFAULT 0,
            attendee_count BIGINT NOT NULL DEFAULT 0,
            updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        ",
    ] {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| LedgerError::Storage(format!("Failed to run migration: {e}")))?;
    }
    Ok(())
}

/// PostgreSQL-backed [`ReservationStore`].
#[derive(Clone)]
pub struct PostgresReservationStore {
    pool: PgPool,
    retry: RetryPolicy,
}

impl PostgresReservationStore {
    /// Creates a store over an existing pool with the default retry policy.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            retry: RetryPolicy::default(),
        }
    }

    /// Creates a store with a custom retry policy.
    #[must_use]
    pub const fn with_policy(pool: PgPool, retry: RetryPolicy) -> Self {
        Self { pool, retry }
    }

    /// The underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn try_transact(
        &self,
        event_id: EventId,
        decide: DecideFn<'_>,
    ) -> Result<WriteSet, TxError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| tx_error("Failed to begin transaction", &e))?;

        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await
            .map_err(|e| tx_error("Failed to set isolation level", &e))?;

        // The event row is the partition anchor: FOR UPDATE serializes
        // writers for the same event even before the serializable check.
        let event_row: Option<EventRow> = sqlx::query_as(
            "SELECT id, title, capacity, closed, cached_count, payment_required,
                    payment_amount_cents, payment_currency, created_at, updated_at
             FROM events WHERE id = $1 FOR UPDATE",
        )
        .bind(event_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| tx_error("Failed to read event", &e))?;

        let Some(event_row) = event_row else {
            return Err(TxError::Ledger(LedgerError::EventNotFound(event_id)));
        };

        let reservation_rows: Vec<(JsonValue,)> =
            sqlx::query_as("SELECT data FROM reservations WHERE event_id = $1")
                .bind(event_id.as_uuid())
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| tx_error("Failed to read reservations", &e))?;

        let stats_row: Option<StatsRow> = sqlx::query_as(
            "SELECT event_id, reservation_count, attendee_count, updated_at
             FROM event_stats WHERE event_id = $1",
        )
        .bind(event_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| tx_error("Failed to read stats", &e))?;

        let snapshot = PartitionSnapshot {
            event: event_row.into(),
            reservations: decode_reservations(reservation_rows).map_err(TxError::Ledger)?,
            stats: stats_row.map(StatsRow::into_rollup),
        };

        let writes = decide(&snapshot).map_err(TxError::Ledger)?;

        apply_reservation_write(&mut tx, &writes.write).await?;

        sqlx::query(
            "UPDATE events
             SET cached_count = $2, closed = closed OR $3, updated_at = now()
             WHERE id = $1",
        )
        .bind(event_id.as_uuid())
        .bind(i32::try_from(writes.cached_count).unwrap_or(i32::MAX))
        .bind(writes.close_event)
        .execute(&mut *tx)
        .await
        .map_err(|e| tx_error("Failed to update event counters", &e))?;

        if writes.stats.reservations != 0 || writes.stats.attendees != 0 {
            sqlx::query(
                "INSERT INTO event_stats (event_id, reservation_count, attendee_count, updated_at)
                 VALUES ($1, GREATEST(0, $2), GREATEST(0, $3), now())
                 ON CONFLICT (event_id) DO UPDATE SET
                     reservation_count = GREATEST(0, event_stats.reservation_count + $2),
                     attendee_count = GREATEST(0, event_stats.attendee_count + $3),
                     updated_at = now()",
            )
            .bind(event_id.as_uuid())
            .bind(writes.stats.reservations)
            .bind(writes.stats.attendees)
            .execute(&mut *tx)
            .await
            .map_err(|e| tx_error("Failed to upsert stats", &e))?;
        }

        tx.commit()
            .await
            .map_err(|e| tx_error("Failed to commit transaction", &e))?;

        Ok(writes)
    }
}

#[async_trait]
impl ReservationStore for PostgresReservationStore {
    async fn put_event(&self, event: EventRecord) -> Result<(), LedgerError> {
        sqlx::query(
            "INSERT INTO events
                 (id, title, capacity, closed, cached_count, payment_required,
                  payment_amount_cents, payment_currency, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             ON CONFLICT (id) DO UPDATE SET
                 title = EXCLUDED.title,
                 capacity = EXCLUDED.capacity,
                 closed = EXCLUDED.closed,
                 payment_required = EXCLUDED.payment_required,
                 payment_amount_cents = EXCLUDED.payment_amount_cents,
                 payment_currency = EXCLUDED.payment_currency,
                 updated_at = now()",
        )
        .bind(event.id.as_uuid())
        .bind(&event.title)
        .bind(event.capacity.and_then(|c| i32::try_from(c).ok()))
        .bind(event.closed)
        .bind(i32::try_from(event.cached_count).unwrap_or(i32::MAX))
        .bind(event.payment_required)
        .bind(event.payment_amount_cents)
        .bind(&event.payment_currency)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(format!("Failed to upsert event: {e}")))?;
        Ok(())
    }

    async fn event(&self, event_id: EventId) -> Result<Option<EventRecord>, LedgerError> {
        let row: Option<EventRow> = sqlx::query_as(
            "SELECT id, title, capacity, closed, cached_count, payment_required,
                    payment_amount_cents, payment_currency, created_at, updated_at
             FROM events WHERE id = $1",
        )
        .bind(event_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(format!("Failed to read event: {e}")))?;
        Ok(row.map(EventRow::into))
    }

    async fn partition(&self, event_id: EventId) -> Result<PartitionSnapshot, LedgerError> {
        let event = self
            .event(event_id)
            .await?
            .ok_or(LedgerError::EventNotFound(event_id))?;

        let rows: Vec<(JsonValue,)> =
            sqlx::query_as("SELECT data FROM reservations WHERE event_id = $1")
                .bind(event_id.as_uuid())
                .fetch_all(&self.pool)
                .await
                .map_err(|e| LedgerError::Storage(format!("Failed to read reservations: {e}")))?;

        let stats: Option<StatsRow> = sqlx::query_as(
            "SELECT event_id, reservation_count, attendee_count, updated_at
             FROM event_stats WHERE event_id = $1",
        )
        .bind(event_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(format!("Failed to read stats: {e}")))?;

        Ok(PartitionSnapshot {
            event,
            reservations: decode_reservations(rows)?,
            stats: stats.map(StatsRow::into_rollup),
        })
    }

    async fn batch_partitions(
        &self,
        event_ids: &[EventId],
    ) -> Result<HashMap<EventId, PartitionSnapshot>, LedgerError> {
        if event_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let ids: Vec<Uuid> = event_ids.iter().map(|id| *id.as_uuid()).collect();

        let event_rows: Vec<EventRow> = sqlx::query_as(
            "SELECT id, title, capacity, closed, cached_count, payment_required,
                    payment_amount_cents, payment_currency, created_at, updated_at
             FROM events WHERE id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(format!("Failed to read events: {e}")))?;

        let reservation_rows: Vec<(JsonValue,)> =
            sqlx::query_as("SELECT data FROM reservations WHERE event_id = ANY($1)")
                .bind(&ids)
                .fetch_all(&self.pool)
                .await
                .map_err(|e| LedgerError::Storage(format!("Failed to read reservations: {e}")))?;

        let mut by_event: HashMap<EventId, Vec<Reservation>> = HashMap::new();
        for reservation in decode_reservations(reservation_rows)? {
            by_event
                .entry(reservation.event_id)
                .or_default()
                .push(reservation);
        }

        let mut partitions = HashMap::new();
        for row in event_rows {
            let event: EventRecord = row.into();
            let reservations = by_event.remove(&event.id).unwrap_or_default();
            partitions.insert(
                event.id,
                PartitionSnapshot {
                    event,
                    reservations,
                    stats: None,
                },
            );
        }
        Ok(partitions)
    }

    async fn reservation(
        &self,
        reservation_id: ReservationId,
    ) -> Result<Option<Reservation>, LedgerError> {
        let row: Option<(JsonValue,)> =
            sqlx::query_as("SELECT data FROM reservations WHERE id = $1")
                .bind(reservation_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| LedgerError::Storage(format!("Failed to read reservation: {e}")))?;
        row.map(|(json,)| decode_reservation(json)).transpose()
    }

    async fn reservations_for_requester(
        &self,
        requester_id: RequesterId,
    ) -> Result<Vec<Reservation>, LedgerError> {
        let rows: Vec<(JsonValue,)> = sqlx::query_as(
            "SELECT data FROM reservations WHERE requester_id = $1 ORDER BY created_at DESC",
        )
        .bind(requester_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LedgerError::Storage(format!("Failed to read reservations: {e}")))?;
        decode_reservations(rows)
    }

    async fn transact(
        &self,
        event_id: EventId,
        decide: DecideFn<'_>,
    ) -> Result<WriteSet, LedgerError> {
        let mut attempt = 0;
        loop {
            match self.try_transact(event_id, decide).await {
                Ok(writes) => return Ok(writes),
                Err(TxError::Ledger(error)) => return Err(error),
                Err(TxError::Retryable(reason)) => {
                    if attempt >= self.retry.max_retries {
                        return Err(LedgerError::Storage(format!(
                            "transaction for event {event_id} did not commit after {} attempts: {reason}",
                            attempt + 1
                        )));
                    }
                    let delay = self.retry.jittered_delay(attempt);
                    tracing::debug!(
                        %event_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        %reason,
                        "retrying serializable transaction"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

// ============================================================================
// Transaction plumbing
// ============================================================================

/// Internal transaction outcome: retryable conflicts versus final errors.
enum TxError {
    /// Serialization conflict; safe to re-run the decision
    Retryable(String),
    /// Final, typed outcome
    Ledger(LedgerError),
}

fn tx_error(context: &str, error: &sqlx::Error) -> TxError {
    if let sqlx::Error::Database(db) = error {
        if matches!(
            db.code().as_deref(),
            Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED)
        ) {
            return TxError::Retryable(format!("{context}: {error}"));
        }
    }
    TxError::Ledger(LedgerError::Storage(format!("{context}: {error}")))
}

async fn apply_reservation_write(
    tx: &mut Transaction<'_, Postgres>,
    write: &ReservationWrite,
) -> Result<(), TxError> {
    match write {
        ReservationWrite::Insert(r) => {
            let json = encode_reservation(r).map_err(TxError::Ledger)?;
            sqlx::query(
                "INSERT INTO reservations
                     (id, event_id, requester_id, attendee_count, payment_status,
                      data, created_at, updated_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(r.id.as_uuid())
            .bind(r.event_id.as_uuid())
            .bind(r.requester_id.as_uuid())
            .bind(i32::try_from(slotbook_ledger::capacity::attendee_count(r)).unwrap_or(i32::MAX))
            .bind(r.payment_status.as_str())
            .bind(&json)
            .bind(r.created_at)
            .bind(r.updated_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| insert_error(r, &e))?;
        }
        ReservationWrite::Update(r) => {
            let json = encode_reservation(r).map_err(TxError::Ledger)?;
            sqlx::query(
                "UPDATE reservations
                 SET attendee_count = $2, payment_status = $3, data = $4, updated_at = $5
                 WHERE id = $1",
            )
            .bind(r.id.as_uuid())
            .bind(i32::try_from(slotbook_ledger::capacity::attendee_count(r)).unwrap_or(i32::MAX))
            .bind(r.payment_status.as_str())
            .bind(&json)
            .bind(r.updated_at)
            .execute(&mut **tx)
            .await
            .map_err(|e| tx_error("Failed to update reservation", &e))?;
        }
        ReservationWrite::Remove(id) => {
            sqlx::query("DELETE FROM reservations WHERE id = $1")
                .bind(id.as_uuid())
                .execute(&mut **tx)
                .await
                .map_err(|e| tx_error("Failed to delete reservation", &e))?;
        }
        ReservationWrite::None => {}
    }
    Ok(())
}

/// The unique (`event_id`, `requester_id`) index backstops the duplicate
/// check for writers that raced past the snapshot read.
fn insert_error(reservation: &Reservation, error: &sqlx::Error) -> TxError {
    if let sqlx::Error::Database(db) = error {
        if db.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return TxError::Ledger(LedgerError::AlreadyExists {
                event_id: reservation.event_id,
                requester_id: reservation.requester_id,
            });
        }
    }
    tx_error("Failed to insert reservation", error)
}

// ============================================================================
// Row mapping
// ============================================================================

#[derive(sqlx::FromRow)]
struct EventRow {
    id: Uuid,
    title: String,
    capacity: Option<i32>,
    closed: bool,
    cached_count: i32,
    payment_required: bool,
    payment_amount_cents: Option<i64>,
    payment_currency: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<EventRow> for EventRecord {
    fn from(row: EventRow) -> Self {
        Self {
            id: EventId::from_uuid(row.id),
            title: row.title,
            capacity: row.capacity.and_then(|c| u32::try_from(c).ok()),
            closed: row.closed,
            cached_count: u32::try_from(row.cached_count).unwrap_or(0),
            payment_required: row.payment_required,
            payment_amount_cents: row.payment_amount_cents,
            payment_currency: row.payment_currency,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct StatsRow {
    event_id: Uuid,
    reservation_count: i64,
    attendee_count: i64,
    updated_at: DateTime<Utc>,
}

impl StatsRow {
    fn into_rollup(self) -> StatsRollup {
        StatsRollup {
            event_id: EventId::from_uuid(self.event_id),
            reservation_count: u64::try_from(self.reservation_count).unwrap_or(0),
            attendee_count: u64::try_from(self.attendee_count).unwrap_or(0),
            updated_at: self.updated_at,
        }
    }
}

fn encode_reservation(reservation: &Reservation) -> Result<JsonValue, LedgerError> {
    serde_json::to_value(reservation)
        .map_err(|e| LedgerError::Storage(format!("Failed to serialize reservation: {e}")))
}

fn decode_reservation(json: JsonValue) -> Result<Reservation, LedgerError> {
    serde_json::from_value(json)
        .map_err(|e| LedgerError::Storage(format!("Failed to deserialize reservation: {e}")))
}

fn decode_reservations(rows: Vec<(JsonValue,)>) -> Result<Vec<Reservation>, LedgerError> {
    rows.into_iter()
        .map(|(json,)| decode_reservation(json))
        .collect()
}
