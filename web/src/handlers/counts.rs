//! Attendance count endpoints.
//!
//! Read-only lookups of freshly recomputed countable totals:
//! - GET /api/events/:id/attendance - single event
//! - POST /api/events/attendance - batch, one scan across the given events
//! - POST /api/events/:id/reconcile - repair the advisory cached count
//!
//! The countability rule (payment gating) applies identically to the
//! single and batch paths, so displayed counts always agree with admission
//! decisions.

use crate::error::AppError;
use crate::extractors::Identity;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use slotbook_ledger::{Capability, EventId};
use std::collections::HashMap;
use uuid::Uuid;

/// Attendance for one event.
#[derive(Debug, Serialize)]
pub struct AttendanceResponse {
    /// The event
    pub event_id: Uuid,
    /// Freshly recomputed countable attendee total
    pub count: u32,
}

/// Request for batch attendance counts.
#[derive(Debug, Deserialize)]
pub struct BatchAttendanceRequest {
    /// Events to count
    pub event_ids: Vec<Uuid>,
}

/// Batch attendance counts; every requested id is present, unknown events
/// map to 0.
#[derive(Debug, Serialize)]
pub struct BatchAttendanceResponse {
    /// Countable totals keyed by event id
    pub counts: HashMap<Uuid, u32>,
}

/// Single-event attendance count.
pub async fn get_attendance(
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<AttendanceResponse>, AppError> {
    let event_id = EventId::from_uuid(event_id);
    let count = state.queries.get_count(event_id).await?;
    Ok(Json(AttendanceResponse {
        event_id: *event_id.as_uuid(),
        count,
    }))
}

/// Batch attendance counts for event list pages.
pub async fn get_batch_attendance(
    State(state): State<AppState>,
    Json(request): Json<BatchAttendanceRequest>,
) -> Result<Json<BatchAttendanceResponse>, AppError> {
    let event_ids: Vec<EventId> = request
        .event_ids
        .iter()
        .copied()
        .map(EventId::from_uuid)
        .collect();
    let counts = state.queries.get_batch_counts(&event_ids).await?;
    Ok(Json(BatchAttendanceResponse {
        counts: counts
            .into_iter()
            .map(|(id, count)| (*id.as_uuid(), count))
            .collect(),
    }))
}

/// Recompute an event's countable total and repair its advisory snapshot.
/// Requires the manage-events capability.
pub async fn reconcile_attendance(
    identity: Identity,
    State(state): State<AppState>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<AttendanceResponse>, AppError> {
    let caller = identity
        .caller()
        .ok_or_else(|| AppError::unauthorized("a verified caller identity is required"))?;
    if !caller.capabilities.allows(Capability::ManageEvents) {
        return Err(AppError::forbidden(
            "Only event managers can reconcile attendance counts",
        ));
    }

    let event_id = EventId::from_uuid(event_id);
    let count = state.coordinator.reconcile_cached_count(event_id).await?;
    Ok(Json(AttendanceResponse {
        event_id: *event_id.as_uuid(),
        count,
    }))
}
