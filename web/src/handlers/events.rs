//! Event-descriptor ingress.
//!
//! Thin glue for the external event-management collaborator:
//! - POST /api/events - create or replace an event descriptor (capability-gated)
//! - GET /api/events/:id - look up an event
//!
//! The ledger only ever writes two event fields itself (`cached_count` and
//! `closed`, inside booking transactions); everything else enters here.

use crate::error::AppError;
use crate::extractors::Identity;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use slotbook_ledger::{Capability, EventId, EventRecord};
use uuid::Uuid;

/// Request to create or replace an event descriptor.
#[derive(Debug, Deserialize)]
pub struct PutEventRequest {
    /// Existing event id to replace; omitted to create
    pub id: Option<Uuid>,
    /// Event title
    pub title: String,
    /// Maximum countable attendees; omitted for unlimited
    pub capacity: Option<u32>,
    /// Whether the event accepts reservations; an explicit reopen after an
    /// auto-close happens here, never inside the booking coordinator
    #[serde(default)]
    pub closed: bool,
    /// Whether reservations must complete payment to count
    #[serde(default)]
    pub payment_required: bool,
    /// Payment amount in minor units
    pub payment_amount_cents: Option<i64>,
    /// ISO currency code
    pub payment_currency: Option<String>,
}

/// Create or replace an event descriptor.
pub async fn put_event(
    identity: Identity,
    State(state): State<AppState>,
    Json(request): Json<PutEventRequest>,
) -> Result<(StatusCode, Json<EventRecord>), AppError> {
    let caller = identity
        .caller()
        .ok_or_else(|| AppError::unauthorized("a verified caller identity is required"))?;
    if !caller.capabilities.allows(Capability::ManageEvents) {
        return Err(AppError::forbidden("Only event managers can manage events"));
    }
    if request.title.trim().is_empty() {
        return Err(AppError::bad_request("Event title is required"));
    }

    let now = Utc::now();
    let id = request.id.map_or_else(EventId::new, EventId::from_uuid);
    let existing = state.store.event(id).await?;

    let event = EventRecord {
        id,
        title: request.title,
        capacity: request.capacity,
        closed: request.closed,
        // Preserved on replace; the coordinator owns this field.
        cached_count: existing.as_ref().map_or(0, |e| e.cached_count),
        payment_required: request.payment_required,
        payment_amount_cents: request.payment_amount_cents,
        payment_currency: request.payment_currency,
        created_at: existing.as_ref().map_or(now, |e| e.created_at),
        updated_at: now,
    };

    state.store.put_event(event.clone()).await?;

    let status = if existing.is_some() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    Ok((status, Json(event)))
}

/// Look up an event descriptor.
pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<EventRecord>, AppError> {
    let event_id = EventId::from_uuid(event_id);
    state
        .store
        .event(event_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::not_found("Event", event_id))
}
