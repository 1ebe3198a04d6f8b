use axum::{
    extract::{Path, Query, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Json, Router,
};
use chrono::NaiveDate;
use futures_util::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use tokio_stream::wrappers::BroadcastStream;
use transix_catalog::{ScheduleOption, ScheduleStatus, SeatState, SeatType, TransportMode};
use transix_core::Money;
use uuid::Uuid;

use crate::error::AppError;
use crate::identity::CurrentUser;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub origin: String,
    pub destination: String,
    pub date: NaiveDate,
}

#[derive(Debug, Serialize)]
pub struct ScheduleDetailResponse {
    pub schedule_id: Uuid,
    pub origin: String,
    pub destination: String,
    pub mode: TransportMode,
    pub vehicle_number: String,
    pub departure_date: NaiveDate,
    pub departure_time: chrono::NaiveTime,
    pub arrival_time: chrono::NaiveTime,
    pub price: Money,
    pub status: ScheduleStatus,
    pub remaining_seats: i64,
}

#[derive(Debug, Serialize)]
pub struct SeatMapEntry {
    pub seat_id: Uuid,
    pub seat_number: String,
    pub seat_type: SeatType,
    pub state: SeatState,
}

// ============================================================================
// Handlers
// ============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/schedules/search", get(search_schedules))
        .route("/v1/schedules/{id}", get(get_schedule))
        .route("/v1/schedules/{id}/seats", get(get_seat_map))
        .route("/v1/schedules/{id}/stream", get(stream_seat_events))
}

/// GET /v1/schedules/search?origin=..&destination=..&date=..
async fn search_schedules(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<ScheduleOption>>, AppError> {
    let options = state
        .catalog
        .search_schedules(&query.origin, &query.destination, query.date)
        .await?;
    Ok(Json(options))
}

/// GET /v1/schedules/:id
async fn get_schedule(
    State(state): State<AppState>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<ScheduleDetailResponse>, AppError> {
    let schedule = state
        .catalog
        .get_schedule(schedule_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("Schedule not found: {schedule_id}")))?;
    let route = state
        .catalog
        .get_route(schedule.route_id)
        .await?
        .ok_or_else(|| AppError::InternalServerError("schedule without route".to_string()))?;
    let vehicle = state
        .catalog
        .get_vehicle(schedule.vehicle_id)
        .await?
        .ok_or_else(|| AppError::InternalServerError("schedule without vehicle".to_string()))?;
    let remaining_seats = state.catalog.available_seat_count(schedule.id).await?;

    Ok(Json(ScheduleDetailResponse {
        schedule_id: schedule.id,
        origin: route.origin,
        destination: route.destination,
        mode: route.mode,
        vehicle_number: vehicle.vehicle_number,
        departure_date: schedule.departure_date,
        departure_time: schedule.departure_time,
        arrival_time: schedule.arrival_time,
        price: schedule.price,
        status: schedule.status,
        remaining_seats,
    }))
}

/// GET /v1/schedules/:id/seats
/// Seat map with live per-trip availability.
async fn get_seat_map(
    State(state): State<AppState>,
    Path(schedule_id): Path<Uuid>,
) -> Result<Json<Vec<SeatMapEntry>>, AppError> {
    let schedule = state
        .catalog
        .get_schedule(schedule_id)
        .await?
        .ok_or_else(|| AppError::NotFoundError(format!("Schedule not found: {schedule_id}")))?;

    let seats = state.catalog.list_seats(schedule.vehicle_id).await?;
    let assignments = state.catalog.seat_assignments(schedule.id).await?;

    let entries = seats
        .into_iter()
        .filter_map(|seat| {
            assignments
                .iter()
                .find(|assignment| assignment.seat_id == seat.id)
                .map(|assignment| SeatMapEntry {
                    seat_id: seat.id,
                    seat_number: seat.seat_number,
                    seat_type: seat.seat_type,
                    state: assignment.state,
                })
        })
        .collect();

    Ok(Json(entries))
}

/// GET /v1/schedules/:id/stream
/// Live seat reservation/release events for one schedule, as SSE.
async fn stream_seat_events(
    State(state): State<AppState>,
    CurrentUser(_user): CurrentUser,
    Path(schedule_id): Path<Uuid>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.events.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        futures_util::future::ready(match result {
            Ok(event) if event.schedule_id() == schedule_id => Event::default()
                .event("seat_update")
                .json_data(&event)
                .ok()
                .map(Ok),
            _ => None,
        })
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
