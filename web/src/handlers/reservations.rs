//! Reservation management API endpoints.
//!
//! Provides the booking surface for the reservation ledger:
//! - POST /api/reservations - create a reservation (requires identity)
//! - GET /api/reservations - list the caller's reservations
//! - PATCH /api/reservations/:id - change attendees or contact (owner only)
//! - DELETE /api/reservations/:id - withdraw (owner or admin)
//! - POST /api/reservations/:id/payment - record completed payment
//!
//! # Capacity Flow
//!
//! Every create/update/payment runs validate → recompute → check → commit
//! as one serializable unit inside the store; a commit that reaches
//! capacity closes the event in the same transaction. Capacity rejections
//! carry the exact remaining-spot count.

use crate::error::AppError;
use crate::extractors::Identity;
use crate::state::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use slotbook_ledger::{
    Attendee, ContactInfo, EventId, NewReservation, RequesterId, Reservation, ReservationChange,
    ReservationId,
};
use uuid::Uuid;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Request to create a new reservation.
#[derive(Debug, Deserialize)]
pub struct CreateReservationRequest {
    /// Event to reserve against
    pub event_id: Uuid,
    /// Attendee group (1–20 members)
    pub attendees: Vec<Attendee>,
    /// Family or group name
    pub family_name: String,
    /// Contact email
    pub email: String,
    /// Optional contact phone
    pub phone: Option<String>,
    /// Dietary restrictions free text
    pub dietary_restrictions: Option<String>,
    /// Special needs free text
    pub special_needs: Option<String>,
    /// Additional notes
    pub notes: Option<String>,
}

/// Response after a booking commit.
#[derive(Debug, Serialize)]
pub struct BookingResponse {
    /// Always true on the success path
    pub success: bool,
    /// The reservation the commit touched
    pub reservation_id: Uuid,
    /// Countable attendee total after the commit
    pub new_count: u32,
    /// Whether this commit closed the event
    pub event_closed: bool,
    /// Message for the user
    pub message: String,
}

/// Response after a withdrawal.
#[derive(Debug, Serialize)]
pub struct WithdrawalResponse {
    /// Always true on the success path
    pub success: bool,
    /// The deleted reservation
    pub reservation_id: Uuid,
    /// Countable attendee total after the commit
    pub new_count: u32,
}

/// Query parameters for listing reservations.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Requester to list; defaults to the caller
    pub requester_id: Option<Uuid>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Create a new reservation.
///
/// # Example
///
/// ```bash
/// curl -X POST http://localhost:8080/api/reservations \
///   -H "x-requester-id: 770e8400-e29b-41d4-a716-446655440002" \
///   -H "Content-Type: application/json" \
///   -d '{
///     "event_id": "550e8400-e29b-41d4-a716-446655440000",
///     "attendees": [{"name": "Dana Johnson", "age": 38, "is_adult": true}],
///     "family_name": "Johnson",
///     "email": "johnson@example.com"
///   }'
/// ```
pub async fn create_reservation(
    identity: Identity,
    State(state): State<AppState>,
    Json(request): Json<CreateReservationRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let submission = NewReservation {
        event_id: EventId::from_uuid(request.event_id),
        attendees: request.attendees,
        contact: ContactInfo {
            family_name: request.family_name,
            email: request.email,
            phone: request.phone,
        },
        dietary_restrictions: request.dietary_restrictions,
        special_needs: request.special_needs,
        notes: request.notes,
    };

    let receipt = state
        .coordinator
        .create_reservation(identity.caller(), submission)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(BookingResponse {
            success: true,
            reservation_id: *receipt.reservation_id.as_uuid(),
            new_count: receipt.new_count,
            event_closed: receipt.event_closed,
            message: receipt.message,
        }),
    ))
}

/// List reservations for the caller (or, with the view-any capability, for
/// any requester via `?requester_id=`).
pub async fn list_reservations(
    identity: Identity,
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Reservation>>, AppError> {
    let requester_id = match query.requester_id {
        Some(id) => RequesterId::from_uuid(id),
        None => {
            identity
                .caller()
                .ok_or_else(|| AppError::unauthorized("a verified caller identity is required"))?
                .requester_id
        }
    };
    let reservations = state
        .queries
        .list_reservations(identity.caller(), requester_id)
        .await?;
    Ok(Json(reservations))
}

/// Update a reservation's attendee group or contact details.
///
/// The body is a partial change; omitted fields are left untouched. A
/// change that would exceed capacity is rejected and the prior reservation
/// stays fully intact.
pub async fn update_reservation(
    identity: Identity,
    State(state): State<AppState>,
    Path(reservation_id): Path<Uuid>,
    Json(change): Json<ReservationChange>,
) -> Result<Json<BookingResponse>, AppError> {
    let receipt = state
        .coordinator
        .update_reservation(
            identity.caller(),
            ReservationId::from_uuid(reservation_id),
            change,
        )
        .await?;

    Ok(Json(BookingResponse {
        success: true,
        reservation_id: *receipt.reservation_id.as_uuid(),
        new_count: receipt.new_count,
        event_closed: receipt.event_closed,
        message: receipt.message,
    }))
}

/// Withdraw a reservation. Owners may withdraw their own; admins anyone's.
/// Withdrawal never reopens a closed event.
pub async fn delete_reservation(
    identity: Identity,
    State(state): State<AppState>,
    Path(reservation_id): Path<Uuid>,
) -> Result<Json<WithdrawalResponse>, AppError> {
    let receipt = state
        .coordinator
        .delete_reservation(identity.caller(), ReservationId::from_uuid(reservation_id))
        .await?;

    Ok(Json(WithdrawalResponse {
        success: true,
        reservation_id: *receipt.reservation_id.as_uuid(),
        new_count: receipt.new_count,
    }))
}

/// Record that payment completed for a pending reservation.
///
/// Invoked by the payment collaborator's webhook glue after it verifies a
/// charge; only the ledger transition happens here.
pub async fn record_payment(
    identity: Identity,
    State(state): State<AppState>,
    Path(reservation_id): Path<Uuid>,
) -> Result<Json<BookingResponse>, AppError> {
    let receipt = state
        .coordinator
        .record_payment_completed(identity.caller(), ReservationId::from_uuid(reservation_id))
        .await?;

    Ok(Json(BookingResponse {
        success: true,
        reservation_id: *receipt.reservation_id.as_uuid(),
        new_count: receipt.new_count,
        event_closed: receipt.event_closed,
        message: receipt.message,
    }))
}
