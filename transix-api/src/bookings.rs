use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use transix_booking::{Booking, BookingStatus, CreateBooking, Gender, PassengerDetails};
use transix_core::{Money, UserId};
use transix_shared::models::events::{SeatEvent, SeatReleasedEvent, SeatReservedEvent};
use transix_shared::pii::Masked;
use uuid::Uuid;

use crate::error::AppError;
use crate::identity::CurrentUser;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct PassengerRequest {
    pub name: Masked<String>,
    pub age: i32,
    pub gender: Gender,
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub schedule_id: Uuid,
    pub seat_ids: Vec<Uuid>,
    pub passengers: Vec<PassengerRequest>,
    pub special_requests: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub booking_ref: String,
    pub schedule_id: Uuid,
    pub status: BookingStatus,
    pub total_amount: Money,
    pub special_requests: Option<String>,
    pub created_at: chrono::DateTime<Utc>,
}

impl From<Booking> for BookingResponse {
    fn from(booking: Booking) -> Self {
        Self {
            booking_ref: booking.booking_ref,
            schedule_id: booking.schedule_id,
            status: booking.status,
            total_amount: booking.total_amount,
            special_requests: booking.special_requests,
            created_at: booking.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BookingSeatResponse {
    pub seat_id: Uuid,
    pub seat_number: Option<String>,
    pub passenger_name: String,
    pub passenger_age: i32,
    pub passenger_gender: Gender,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub status_change: String,
    pub changed_by: Option<UserId>,
    pub change_reason: Option<String>,
    pub timestamp: chrono::DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct BookingDetailResponse {
    #[serde(flatten)]
    pub booking: BookingResponse,
    pub seats: Vec<BookingSeatResponse>,
    pub history: Vec<HistoryResponse>,
}

// ============================================================================
// Handlers
// ============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings", post(create_booking).get(list_bookings))
        .route("/v1/bookings/{booking_ref}", get(get_booking))
        .route("/v1/bookings/{booking_ref}/cancel", post(cancel_booking))
}

/// POST /v1/bookings
async fn create_booking(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<BookingResponse>), AppError> {
    let passengers: Vec<PassengerDetails> = req
        .passengers
        .into_iter()
        .map(|p| PassengerDetails {
            name: p.name.into_inner(),
            age: p.age,
            gender: p.gender,
        })
        .collect();

    let seat_ids = req.seat_ids.clone();
    let booking = state
        .bookings
        .create_booking(CreateBooking {
            user,
            schedule_id: req.schedule_id,
            seat_ids: req.seat_ids,
            passengers,
            special_requests: req.special_requests,
        })
        .await?;

    state.metrics.bookings_created.inc();
    publish_seat_events(&state, booking.schedule_id, &seat_ids, Some(&booking)).await;

    Ok((StatusCode::CREATED, Json(booking.into())))
}

/// GET /v1/bookings
async fn list_bookings(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<BookingResponse>>, AppError> {
    let bookings = state.booking_store.list_bookings(&user).await?;
    Ok(Json(bookings.into_iter().map(Into::into).collect()))
}

/// GET /v1/bookings/:booking_ref
async fn get_booking(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(booking_ref): Path<String>,
) -> Result<Json<BookingDetailResponse>, AppError> {
    let booking = state.bookings.get_owned(&user, &booking_ref).await?;

    let mut seats = Vec::new();
    for seat in state.booking_store.booking_seats(booking.id).await? {
        let seat_number = state
            .catalog
            .get_seat(seat.seat_id)
            .await?
            .map(|s| s.seat_number);
        seats.push(BookingSeatResponse {
            seat_id: seat.seat_id,
            seat_number,
            passenger_name: seat.passenger_name,
            passenger_age: seat.passenger_age,
            passenger_gender: seat.passenger_gender,
        });
    }

    let history = state
        .booking_store
        .booking_history(booking.id)
        .await?
        .into_iter()
        .map(|entry| HistoryResponse {
            status_change: entry.status_change,
            changed_by: entry.changed_by,
            change_reason: entry.change_reason,
            timestamp: entry.timestamp,
        })
        .collect();

    Ok(Json(BookingDetailResponse {
        booking: booking.into(),
        seats,
        history,
    }))
}

/// POST /v1/bookings/:booking_ref/cancel
async fn cancel_booking(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(booking_ref): Path<String>,
) -> Result<Json<BookingResponse>, AppError> {
    let booking = state.bookings.get_owned(&user, &booking_ref).await?;
    let seat_ids: Vec<Uuid> = state
        .booking_store
        .booking_seats(booking.id)
        .await?
        .into_iter()
        .map(|seat| seat.seat_id)
        .collect();

    state.bookings.cancel_booking(&user, &booking_ref).await?;
    state.metrics.bookings_cancelled.inc();
    publish_seat_events(&state, booking.schedule_id, &seat_ids, None).await;

    let cancelled = state.bookings.get_owned(&user, &booking_ref).await?;
    Ok(Json(cancelled.into()))
}

/// Broadcast one event per affected seat; with a booking the seats were
/// reserved, without one they were released.
pub(crate) async fn publish_seat_events(
    state: &AppState,
    schedule_id: Uuid,
    seat_ids: &[Uuid],
    booking: Option<&Booking>,
) {
    let now = Utc::now().timestamp();
    for seat_id in seat_ids {
        let seat_number = match state.catalog.get_seat(*seat_id).await {
            Ok(Some(seat)) => seat.seat_number,
            _ => continue,
        };
        let event = match booking {
            Some(booking) => SeatEvent::Reserved(SeatReservedEvent {
                schedule_id,
                seat_number,
                booking_ref: booking.booking_ref.clone(),
                reserved_at: now,
            }),
            None => SeatEvent::Released(SeatReleasedEvent {
                schedule_id,
                seat_number,
                released_at: now,
            }),
        };
        let _ = state.events.send(event);
    }
}
