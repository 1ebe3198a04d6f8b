use async_trait::async_trait;
use chrono::NaiveDate;
use transix_core::CoreResult;
use uuid::Uuid;

use crate::schedule::{Route, Schedule, ScheduleOption, Seat, SeatAssignment, Vehicle};

/// Catalog data access: read-mostly reference data plus the per-schedule
/// seat-assignment state, which is the one piece of mutable shared state in
/// the system.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn get_route(&self, id: Uuid) -> CoreResult<Option<Route>>;

    async fn get_vehicle(&self, id: Uuid) -> CoreResult<Option<Vehicle>>;

    async fn get_schedule(&self, id: Uuid) -> CoreResult<Option<Schedule>>;

    async fn search_schedules(
        &self,
        origin: &str,
        destination: &str,
        date: NaiveDate,
    ) -> CoreResult<Vec<ScheduleOption>>;

    async fn get_seat(&self, id: Uuid) -> CoreResult<Option<Seat>>;

    async fn list_seats(&self, vehicle_id: Uuid) -> CoreResult<Vec<Seat>>;

    async fn seat_assignments(&self, schedule_id: Uuid) -> CoreResult<Vec<SeatAssignment>>;

    /// Live availability, derived from assignment state (never a cached
    /// counter on the schedule row).
    async fn available_seat_count(&self, schedule_id: Uuid) -> CoreResult<i64>;

    /// Atomically flip one seat from available to reserved. Exactly one of
    /// any set of concurrent callers wins; the rest get
    /// `CoreError::SeatUnavailable`.
    async fn reserve_seat(
        &self,
        schedule_id: Uuid,
        seat_id: Uuid,
        booking_id: Uuid,
    ) -> CoreResult<()>;

    /// Return a reserved seat to the pool.
    async fn release_seat(&self, schedule_id: Uuid, seat_id: Uuid) -> CoreResult<()>;
}
