use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use transix_core::{CoreError, Money};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransportMode {
    Bus,
    Train,
    Flight,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScheduleStatus {
    Scheduled,
    Delayed,
    Cancelled,
    Completed,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatType {
    Window,
    Aisle,
    Middle,
}

/// Per-trip reservation state of one seat.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatState {
    Available,
    Reserved,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Route {
    pub id: Uuid,
    pub origin: String,
    pub destination: String,
    pub distance_km: f64,
    pub estimated_minutes: i64,
    pub mode: TransportMode,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: Uuid,
    pub vehicle_number: String,
    pub mode: TransportMode,
    pub capacity: i32,
    pub amenities: serde_json::Value,
    pub is_active: bool,
}

/// One bookable departure of a vehicle on a route. The source system carried
/// a cached `available_seats` counter here; availability is instead derived
/// from the seat assignments so it cannot drift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    pub id: Uuid,
    pub route_id: Uuid,
    pub vehicle_id: Uuid,
    pub departure_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub arrival_time: NaiveTime,
    pub price: Money,
    pub status: ScheduleStatus,
    pub created_at: DateTime<Utc>,
}

impl Schedule {
    pub fn is_bookable(&self) -> bool {
        matches!(self.status, ScheduleStatus::Scheduled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Seat {
    pub id: Uuid,
    pub vehicle_id: Uuid,
    pub seat_number: String,
    pub seat_type: SeatType,
}

/// Reservation state keyed by (schedule, seat). Seat identity is per-vehicle;
/// reservation state is per-trip, so one vehicle serving many schedules never
/// shares an availability flag between them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeatAssignment {
    pub schedule_id: Uuid,
    pub seat_id: Uuid,
    pub state: SeatState,
    pub booking_id: Option<Uuid>,
}

impl SeatAssignment {
    pub fn open(schedule_id: Uuid, seat_id: Uuid) -> Self {
        Self {
            schedule_id,
            seat_id,
            state: SeatState::Available,
            booking_id: None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self.state, SeatState::Available)
    }
}

/// Search result row: a schedule joined with its route/vehicle context and
/// the live seat count.
#[derive(Debug, Clone, Serialize)]
pub struct ScheduleOption {
    pub schedule_id: Uuid,
    pub origin: String,
    pub destination: String,
    pub mode: TransportMode,
    pub vehicle_number: String,
    pub departure_date: NaiveDate,
    pub departure_time: NaiveTime,
    pub arrival_time: NaiveTime,
    pub price: Money,
    pub remaining_seats: i64,
    pub status: ScheduleStatus,
}

impl TransportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportMode::Bus => "BUS",
            TransportMode::Train => "TRAIN",
            TransportMode::Flight => "FLIGHT",
        }
    }
}

impl ScheduleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScheduleStatus::Scheduled => "SCHEDULED",
            ScheduleStatus::Delayed => "DELAYED",
            ScheduleStatus::Cancelled => "CANCELLED",
            ScheduleStatus::Completed => "COMPLETED",
        }
    }
}

impl SeatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatType::Window => "WINDOW",
            SeatType::Aisle => "AISLE",
            SeatType::Middle => "MIDDLE",
        }
    }
}

impl SeatState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeatState::Available => "AVAILABLE",
            SeatState::Reserved => "RESERVED",
        }
    }
}

impl fmt::Display for ScheduleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUS" => Ok(TransportMode::Bus),
            "TRAIN" => Ok(TransportMode::Train),
            "FLIGHT" => Ok(TransportMode::Flight),
            other => Err(CoreError::Storage(format!("unknown transport mode {other}"))),
        }
    }
}

impl FromStr for ScheduleStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SCHEDULED" => Ok(ScheduleStatus::Scheduled),
            "DELAYED" => Ok(ScheduleStatus::Delayed),
            "CANCELLED" => Ok(ScheduleStatus::Cancelled),
            "COMPLETED" => Ok(ScheduleStatus::Completed),
            other => Err(CoreError::Storage(format!("unknown schedule status {other}"))),
        }
    }
}

impl FromStr for SeatType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "WINDOW" => Ok(SeatType::Window),
            "AISLE" => Ok(SeatType::Aisle),
            "MIDDLE" => Ok(SeatType::Middle),
            other => Err(CoreError::Storage(format!("unknown seat type {other}"))),
        }
    }
}

impl FromStr for SeatState {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "AVAILABLE" => Ok(SeatState::Available),
            "RESERVED" => Ok(SeatState::Reserved),
            other => Err(CoreError::Storage(format!("unknown seat state {other}"))),
        }
    }
}
