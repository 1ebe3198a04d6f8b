use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use transix_booking::{Booking, BookingHistory, BookingSeat, BookingStatus, BookingStore};
use transix_catalog::{
    CatalogStore, Route, Schedule, ScheduleOption, Seat, SeatAssignment, Vehicle,
};
use transix_core::{CoreError, CoreResult, Money, UserId};
use transix_payment::{Payment, PaymentHistory, PaymentMethod, PaymentStatus, PaymentStore};

use crate::redis_cache::AvailabilityCache;

// ============================================================================
// Row types
// ============================================================================

#[derive(sqlx::FromRow)]
struct RouteRow {
    id: Uuid,
    origin: String,
    destination: String,
    distance_km: f64,
    estimated_minutes: i64,
    mode: String,
    is_active: bool,
}

impl RouteRow {
    fn into_route(self) -> CoreResult<Route> {
        Ok(Route {
            id: self.id,
            origin: self.origin,
            destination: self.destination,
            distance_km: self.distance_km,
            estimated_minutes: self.estimated_minutes,
            mode: self.mode.parse()?,
            is_active: self.is_active,
        })
    }
}

#[derive(sqlx::FromRow)]
struct VehicleRow {
    id: Uuid,
    vehicle_number: String,
    mode: String,
    capacity: i32,
    amenities: serde_json::Value,
    is_active: bool,
}

impl VehicleRow {
    fn into_vehicle(self) -> CoreResult<Vehicle> {
        Ok(Vehicle {
            id: self.id,
            vehicle_number: self.vehicle_number,
            mode: self.mode.parse()?,
            capacity: self.capacity,
            amenities: self.amenities,
            is_active: self.is_active,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ScheduleRow {
    id: Uuid,
    route_id: Uuid,
    vehicle_id: Uuid,
    departure_date: NaiveDate,
    departure_time: NaiveTime,
    arrival_time: NaiveTime,
    price: Decimal,
    status: String,
    created_at: DateTime<Utc>,
}

impl ScheduleRow {
    fn into_schedule(self) -> CoreResult<Schedule> {
        Ok(Schedule {
            id: self.id,
            route_id: self.route_id,
            vehicle_id: self.vehicle_id,
            departure_date: self.departure_date,
            departure_time: self.departure_time,
            arrival_time: self.arrival_time,
            price: Money::from_decimal(self.price)?,
            status: self.status.parse()?,
            created_at: self.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SeatRow {
    id: Uuid,
    vehicle_id: Uuid,
    seat_number: String,
    seat_type: String,
}

impl SeatRow {
    fn into_seat(self) -> CoreResult<Seat> {
        Ok(Seat {
            id: self.id,
            vehicle_id: self.vehicle_id,
            seat_number: self.seat_number,
            seat_type: self.seat_type.parse()?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct AssignmentRow {
    schedule_id: Uuid,
    seat_id: Uuid,
    state: String,
    booking_id: Option<Uuid>,
}

impl AssignmentRow {
    fn into_assignment(self) -> CoreResult<SeatAssignment> {
        Ok(SeatAssignment {
            schedule_id: self.schedule_id,
            seat_id: self.seat_id,
            state: self.state.parse()?,
            booking_id: self.booking_id,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ScheduleOptionRow {
    schedule_id: Uuid,
    origin: String,
    destination: String,
    mode: String,
    vehicle_number: String,
    departure_date: NaiveDate,
    departure_time: NaiveTime,
    arrival_time: NaiveTime,
    price: Decimal,
    status: String,
    remaining_seats: i64,
}

impl ScheduleOptionRow {
    fn into_option(self) -> CoreResult<ScheduleOption> {
        Ok(ScheduleOption {
            schedule_id: self.schedule_id,
            origin: self.origin,
            destination: self.destination,
            mode: self.mode.parse()?,
            vehicle_number: self.vehicle_number,
            departure_date: self.departure_date,
            departure_time: self.departure_time,
            arrival_time: self.arrival_time,
            price: Money::from_decimal(self.price)?,
            remaining_seats: self.remaining_seats,
            status: self.status.parse()?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BookingRow {
    id: Uuid,
    booking_ref: String,
    user_id: String,
    schedule_id: Uuid,
    total_amount: Decimal,
    status: String,
    special_requests: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BookingRow {
    fn into_booking(self) -> CoreResult<Booking> {
        Ok(Booking {
            id: self.id,
            booking_ref: self.booking_ref,
            user: UserId::new(self.user_id),
            schedule_id: self.schedule_id,
            total_amount: Money::from_decimal(self.total_amount)?,
            status: self.status.parse()?,
            special_requests: self.special_requests,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BookingSeatRow {
    booking_id: Uuid,
    seat_id: Uuid,
    passenger_name: String,
    passenger_age: i32,
    passenger_gender: String,
}

impl BookingSeatRow {
    fn into_seat(self) -> CoreResult<BookingSeat> {
        Ok(BookingSeat {
            booking_id: self.booking_id,
            seat_id: self.seat_id,
            passenger_name: self.passenger_name,
            passenger_age: self.passenger_age,
            passenger_gender: self.passenger_gender.parse()?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct BookingHistoryRow {
    id: Uuid,
    booking_id: Uuid,
    status_change: String,
    changed_by: Option<String>,
    change_reason: Option<String>,
    timestamp: DateTime<Utc>,
}

impl BookingHistoryRow {
    fn into_history(self) -> BookingHistory {
        BookingHistory {
            id: self.id,
            booking_id: self.booking_id,
            status_change: self.status_change,
            changed_by: self.changed_by.map(UserId::new),
            change_reason: self.change_reason,
            timestamp: self.timestamp,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    payment_ref: String,
    booking_id: Uuid,
    amount: Decimal,
    method: String,
    status: String,
    transaction_id: Option<String>,
    gateway: String,
    refund_amount: Decimal,
    refund_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl PaymentRow {
    fn into_payment(self) -> CoreResult<Payment> {
        Ok(Payment {
            id: self.id,
            payment_ref: self.payment_ref,
            booking_id: self.booking_id,
            amount: Money::from_decimal(self.amount)?,
            method: self.method.parse()?,
            status: self.status.parse()?,
            transaction_id: self.transaction_id,
            gateway: self.gateway,
            refund_amount: Money::from_decimal(self.refund_amount)?,
            refund_reason: self.refund_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct PaymentHistoryRow {
    id: Uuid,
    payment_id: Uuid,
    status_change: String,
    changed_by: Option<String>,
    change_reason: Option<String>,
    timestamp: DateTime<Utc>,
}

impl PaymentHistoryRow {
    fn into_history(self) -> PaymentHistory {
        PaymentHistory {
            id: self.id,
            payment_id: self.payment_id,
            status_change: self.status_change,
            changed_by: self.changed_by.map(UserId::new),
            change_reason: self.change_reason,
            timestamp: self.timestamp,
        }
    }
}

// ============================================================================
// Catalog store
// ============================================================================

pub struct PostgresCatalogStore {
    pool: PgPool,
    cache: AvailabilityCache,
}

impl PostgresCatalogStore {
    pub fn new(pool: PgPool, cache: AvailabilityCache) -> Self {
        Self { pool, cache }
    }

    async fn count_available(&self, schedule_id: Uuid) -> CoreResult<i64> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS remaining FROM seat_assignments WHERE schedule_id = $1 AND state = 'AVAILABLE'",
        )
        .bind(schedule_id)
        .fetch_one(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        Ok(row.get::<i64, _>("remaining"))
    }
}

#[async_trait]
impl CatalogStore for PostgresCatalogStore {
    async fn get_route(&self, id: Uuid) -> CoreResult<Option<Route>> {
        let row = sqlx::query_as::<_, RouteRow>(
            "SELECT id, origin, destination, distance_km, estimated_minutes, mode, is_active FROM routes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        row.map(RouteRow::into_route).transpose()
    }

    async fn get_vehicle(&self, id: Uuid) -> CoreResult<Option<Vehicle>> {
        let row = sqlx::query_as::<_, VehicleRow>(
            "SELECT id, vehicle_number, mode, capacity, amenities, is_active FROM vehicles WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        row.map(VehicleRow::into_vehicle).transpose()
    }

    async fn get_schedule(&self, id: Uuid) -> CoreResult<Option<Schedule>> {
        let row = sqlx::query_as::<_, ScheduleRow>(
            "SELECT id, route_id, vehicle_id, departure_date, departure_time, arrival_time, price, status, created_at FROM schedules WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        row.map(ScheduleRow::into_schedule).transpose()
    }

    async fn search_schedules(
        &self,
        origin: &str,
        destination: &str,
        date: NaiveDate,
    ) -> CoreResult<Vec<ScheduleOption>> {
        let rows = sqlx::query_as::<_, ScheduleOptionRow>(
            r#"
            SELECT
                s.id AS schedule_id,
                r.origin,
                r.destination,
                r.mode,
                v.vehicle_number,
                s.departure_date,
                s.departure_time,
                s.arrival_time,
                s.price,
                s.status,
                (SELECT COUNT(*) FROM seat_assignments sa
                  WHERE sa.schedule_id = s.id AND sa.state = 'AVAILABLE') AS remaining_seats
            FROM schedules s
            JOIN routes r ON s.route_id = r.id
            JOIN vehicles v ON s.vehicle_id = v.id
            WHERE LOWER(r.origin) = LOWER($1)
              AND LOWER(r.destination) = LOWER($2)
              AND s.departure_date = $3
            ORDER BY s.departure_time
            "#,
        )
        .bind(origin)
        .bind(destination)
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::storage)?;

        rows.into_iter().map(ScheduleOptionRow::into_option).collect()
    }

    async fn get_seat(&self, id: Uuid) -> CoreResult<Option<Seat>> {
        let row = sqlx::query_as::<_, SeatRow>(
            "SELECT id, vehicle_id, seat_number, seat_type FROM seats WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        row.map(SeatRow::into_seat).transpose()
    }

    async fn list_seats(&self, vehicle_id: Uuid) -> CoreResult<Vec<Seat>> {
        let rows = sqlx::query_as::<_, SeatRow>(
            "SELECT id, vehicle_id, seat_number, seat_type FROM seats WHERE vehicle_id = $1 ORDER BY seat_number",
        )
        .bind(vehicle_id)
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        rows.into_iter().map(SeatRow::into_seat).collect()
    }

    async fn seat_assignments(&self, schedule_id: Uuid) -> CoreResult<Vec<SeatAssignment>> {
        let rows = sqlx::query_as::<_, AssignmentRow>(
            "SELECT schedule_id, seat_id, state, booking_id FROM seat_assignments WHERE schedule_id = $1",
        )
        .bind(schedule_id)
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        rows.into_iter().map(AssignmentRow::into_assignment).collect()
    }

    async fn available_seat_count(&self, schedule_id: Uuid) -> CoreResult<i64> {
        // Cache-aside: serve the cached count when present, otherwise count
        // from the assignments and seed the cache for the next caller.
        if let Ok(Some(count)) = self.cache.get_count(&schedule_id).await {
            return Ok(count);
        }

        let count = self.count_available(schedule_id).await?;
        let _ = self.cache.set_count(&schedule_id, count).await;
        Ok(count)
    }

    async fn reserve_seat(
        &self,
        schedule_id: Uuid,
        seat_id: Uuid,
        booking_id: Uuid,
    ) -> CoreResult<()> {
        // Single conditional write: the WHERE clause is the availability
        // check, so racing reservations cannot both succeed.
        let result = sqlx::query(
            "UPDATE seat_assignments SET state = 'RESERVED', booking_id = $3
             WHERE schedule_id = $1 AND seat_id = $2 AND state = 'AVAILABLE'",
        )
        .bind(schedule_id)
        .bind(seat_id)
        .bind(booking_id)
        .execute(&self.pool)
        .await
        .map_err(CoreError::storage)?;

        if result.rows_affected() == 0 {
            let exists = sqlx::query(
                "SELECT 1 FROM seat_assignments WHERE schedule_id = $1 AND seat_id = $2",
            )
            .bind(schedule_id)
            .bind(seat_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(CoreError::storage)?;

            return Err(if exists.is_some() {
                CoreError::SeatUnavailable {
                    seat: seat_id.to_string(),
                }
            } else {
                CoreError::SeatNotFound(seat_id.to_string())
            });
        }

        let _ = self.cache.decr(&schedule_id).await;
        Ok(())
    }

    async fn release_seat(&self, schedule_id: Uuid, seat_id: Uuid) -> CoreResult<()> {
        let result = sqlx::query(
            "UPDATE seat_assignments SET state = 'AVAILABLE', booking_id = NULL
             WHERE schedule_id = $1 AND seat_id = $2 AND state = 'RESERVED'",
        )
        .bind(schedule_id)
        .bind(seat_id)
        .execute(&self.pool)
        .await
        .map_err(CoreError::storage)?;

        if result.rows_affected() > 0 {
            let _ = self.cache.incr(&schedule_id).await;
        }
        Ok(())
    }
}

// ============================================================================
// Booking store
// ============================================================================

pub struct PostgresBookingStore {
    pool: PgPool,
}

impl PostgresBookingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const SELECT_BOOKING: &str = "SELECT id, booking_ref, user_id, schedule_id, total_amount, status, special_requests, created_at, updated_at FROM bookings";

#[async_trait]
impl BookingStore for PostgresBookingStore {
    async fn insert_booking(&self, booking: &Booking, seats: &[BookingSeat]) -> CoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(CoreError::storage)?;

        sqlx::query(
            "INSERT INTO bookings (id, booking_ref, user_id, schedule_id, total_amount, status, special_requests, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
        )
        .bind(booking.id)
        .bind(&booking.booking_ref)
        .bind(booking.user.as_str())
        .bind(booking.schedule_id)
        .bind(booking.total_amount.amount())
        .bind(booking.status.as_str())
        .bind(&booking.special_requests)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(CoreError::storage)?;

        for seat in seats {
            sqlx::query(
                "INSERT INTO booking_seats (booking_id, seat_id, passenger_name, passenger_age, passenger_gender)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(seat.booking_id)
            .bind(seat.seat_id)
            .bind(&seat.passenger_name)
            .bind(seat.passenger_age)
            .bind(seat.passenger_gender.as_str())
            .execute(&mut *tx)
            .await
            .map_err(CoreError::storage)?;
        }

        tx.commit().await.map_err(CoreError::storage)
    }

    async fn get_booking(&self, booking_ref: &str) -> CoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!("{SELECT_BOOKING} WHERE booking_ref = $1"))
            .bind(booking_ref)
            .fetch_optional(&self.pool)
            .await
            .map_err(CoreError::storage)?;
        row.map(BookingRow::into_booking).transpose()
    }

    async fn get_booking_by_id(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, BookingRow>(&format!("{SELECT_BOOKING} WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(CoreError::storage)?;
        row.map(BookingRow::into_booking).transpose()
    }

    async fn list_bookings(&self, user: &UserId) -> CoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, BookingRow>(&format!(
            "{SELECT_BOOKING} WHERE user_id = $1 ORDER BY created_at DESC"
        ))
        .bind(user.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        rows.into_iter().map(BookingRow::into_booking).collect()
    }

    async fn booking_seats(&self, booking_id: Uuid) -> CoreResult<Vec<BookingSeat>> {
        let rows = sqlx::query_as::<_, BookingSeatRow>(
            "SELECT booking_id, seat_id, passenger_name, passenger_age, passenger_gender FROM booking_seats WHERE booking_id = $1",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        rows.into_iter().map(BookingSeatRow::into_seat).collect()
    }

    async fn update_status(
        &self,
        booking_id: Uuid,
        expected: &[BookingStatus],
        next: BookingStatus,
    ) -> CoreResult<BookingStatus> {
        // Row lock, then compare-and-set inside the same transaction.
        let mut tx = self.pool.begin().await.map_err(CoreError::storage)?;

        let row = sqlx::query("SELECT status FROM bookings WHERE id = $1 FOR UPDATE")
            .bind(booking_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(CoreError::storage)?
            .ok_or_else(|| CoreError::BookingNotFound(booking_id.to_string()))?;

        let prior: BookingStatus = row.get::<String, _>("status").parse()?;
        if !expected.contains(&prior) {
            return Err(CoreError::InvalidStateTransition {
                from: prior.to_string(),
                to: next.to_string(),
            });
        }

        sqlx::query("UPDATE bookings SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(next.as_str())
            .bind(booking_id)
            .execute(&mut *tx)
            .await
            .map_err(CoreError::storage)?;

        tx.commit().await.map_err(CoreError::storage)?;
        Ok(prior)
    }

    async fn append_history(&self, entry: &BookingHistory) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO booking_history (id, booking_id, status_change, changed_by, change_reason, timestamp)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(entry.id)
        .bind(entry.booking_id)
        .bind(&entry.status_change)
        .bind(entry.changed_by.as_ref().map(|u| u.as_str().to_string()))
        .bind(&entry.change_reason)
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        Ok(())
    }

    async fn booking_history(&self, booking_id: Uuid) -> CoreResult<Vec<BookingHistory>> {
        let rows = sqlx::query_as::<_, BookingHistoryRow>(
            "SELECT id, booking_id, status_change, changed_by, change_reason, timestamp FROM booking_history WHERE booking_id = $1 ORDER BY timestamp",
        )
        .bind(booking_id)
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        Ok(rows.into_iter().map(BookingHistoryRow::into_history).collect())
    }
}

// ============================================================================
// Payment store
// ============================================================================

pub struct PostgresPaymentStore {
    pool: PgPool,
}

impl PostgresPaymentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn locked_payment(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        payment_id: Uuid,
    ) -> CoreResult<Payment> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!(
            "{SELECT_PAYMENT} WHERE id = $1 FOR UPDATE"
        ))
        .bind(payment_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(CoreError::storage)?
        .ok_or_else(|| CoreError::PaymentNotFound(payment_id.to_string()))?;
        row.into_payment()
    }
}

const SELECT_PAYMENT: &str = "SELECT id, payment_ref, booking_id, amount, method, status, transaction_id, gateway, refund_amount, refund_reason, created_at, updated_at FROM payments";

#[async_trait]
impl PaymentStore for PostgresPaymentStore {
    async fn insert_payment(&self, payment: &Payment) -> CoreResult<Payment> {
        let mut tx = self.pool.begin().await.map_err(CoreError::storage)?;

        // The unique index on booking_id plus DO NOTHING makes creation
        // first-writer-wins; the loser reads back the surviving row.
        let result = sqlx::query(
            "INSERT INTO payments (id, payment_ref, booking_id, amount, method, status, transaction_id, gateway, refund_amount, refund_reason, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (booking_id) DO NOTHING",
        )
        .bind(payment.id)
        .bind(&payment.payment_ref)
        .bind(payment.booking_id)
        .bind(payment.amount.amount())
        .bind(payment.method.as_str())
        .bind(payment.status.as_str())
        .bind(&payment.transaction_id)
        .bind(&payment.gateway)
        .bind(payment.refund_amount.amount())
        .bind(&payment.refund_reason)
        .bind(payment.created_at)
        .bind(payment.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(CoreError::storage)?;

        let stored = if result.rows_affected() == 0 {
            sqlx::query_as::<_, PaymentRow>(&format!("{SELECT_PAYMENT} WHERE booking_id = $1"))
                .bind(payment.booking_id)
                .fetch_optional(&mut *tx)
                .await
                .map_err(CoreError::storage)?
                .ok_or_else(|| CoreError::Storage("payment insert raced but no row found".to_string()))?
                .into_payment()?
        } else {
            payment.clone()
        };

        tx.commit().await.map_err(CoreError::storage)?;
        Ok(stored)
    }

    async fn get_payment(&self, payment_ref: &str) -> CoreResult<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!("{SELECT_PAYMENT} WHERE payment_ref = $1"))
            .bind(payment_ref)
            .fetch_optional(&self.pool)
            .await
            .map_err(CoreError::storage)?;
        row.map(PaymentRow::into_payment).transpose()
    }

    async fn payment_for_booking(&self, booking_id: Uuid) -> CoreResult<Option<Payment>> {
        let row = sqlx::query_as::<_, PaymentRow>(&format!("{SELECT_PAYMENT} WHERE booking_id = $1"))
            .bind(booking_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(CoreError::storage)?;
        row.map(PaymentRow::into_payment).transpose()
    }

    async fn reopen_for_retry(
        &self,
        payment_id: Uuid,
        method: PaymentMethod,
        transaction_id: &str,
    ) -> CoreResult<Payment> {
        let mut tx = self.pool.begin().await.map_err(CoreError::storage)?;
        let mut payment = Self::locked_payment(&mut tx, payment_id).await?;

        if payment.status != PaymentStatus::Failed {
            return Err(CoreError::InvalidStateTransition {
                from: payment.status.to_string(),
                to: PaymentStatus::Processing.to_string(),
            });
        }

        sqlx::query(
            "UPDATE payments SET status = $1, method = $2, transaction_id = $3, updated_at = NOW() WHERE id = $4",
        )
        .bind(PaymentStatus::Processing.as_str())
        .bind(method.as_str())
        .bind(transaction_id)
        .bind(payment_id)
        .execute(&mut *tx)
        .await
        .map_err(CoreError::storage)?;

        tx.commit().await.map_err(CoreError::storage)?;

        payment.status = PaymentStatus::Processing;
        payment.method = method;
        payment.transaction_id = Some(transaction_id.to_string());
        payment.updated_at = Utc::now();
        Ok(payment)
    }

    async fn complete(&self, payment_id: Uuid, transaction_id: &str) -> CoreResult<Payment> {
        let mut tx = self.pool.begin().await.map_err(CoreError::storage)?;
        let mut payment = Self::locked_payment(&mut tx, payment_id).await?;

        if payment.status != PaymentStatus::Processing {
            return Err(CoreError::InvalidStateTransition {
                from: payment.status.to_string(),
                to: PaymentStatus::Completed.to_string(),
            });
        }

        sqlx::query(
            "UPDATE payments SET status = $1, transaction_id = $2, updated_at = NOW() WHERE id = $3",
        )
        .bind(PaymentStatus::Completed.as_str())
        .bind(transaction_id)
        .bind(payment_id)
        .execute(&mut *tx)
        .await
        .map_err(CoreError::storage)?;

        tx.commit().await.map_err(CoreError::storage)?;

        payment.status = PaymentStatus::Completed;
        payment.transaction_id = Some(transaction_id.to_string());
        payment.updated_at = Utc::now();
        Ok(payment)
    }

    async fn fail(&self, payment_id: Uuid) -> CoreResult<Payment> {
        let mut tx = self.pool.begin().await.map_err(CoreError::storage)?;
        let mut payment = Self::locked_payment(&mut tx, payment_id).await?;

        if payment.status != PaymentStatus::Processing {
            return Err(CoreError::InvalidStateTransition {
                from: payment.status.to_string(),
                to: PaymentStatus::Failed.to_string(),
            });
        }

        sqlx::query("UPDATE payments SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(PaymentStatus::Failed.as_str())
            .bind(payment_id)
            .execute(&mut *tx)
            .await
            .map_err(CoreError::storage)?;

        tx.commit().await.map_err(CoreError::storage)?;

        payment.status = PaymentStatus::Failed;
        payment.updated_at = Utc::now();
        Ok(payment)
    }

    async fn record_refund(
        &self,
        payment_id: Uuid,
        amount: Money,
        reason: &str,
    ) -> CoreResult<Payment> {
        let mut tx = self.pool.begin().await.map_err(CoreError::storage)?;
        let mut payment = Self::locked_payment(&mut tx, payment_id).await?;

        if payment.status != PaymentStatus::Completed {
            return Err(CoreError::RefundNotAllowed(payment.status.to_string()));
        }

        sqlx::query(
            "UPDATE payments SET status = $1, refund_amount = $2, refund_reason = $3, updated_at = NOW() WHERE id = $4",
        )
        .bind(PaymentStatus::Refunded.as_str())
        .bind(amount.amount())
        .bind(reason)
        .bind(payment_id)
        .execute(&mut *tx)
        .await
        .map_err(CoreError::storage)?;

        tx.commit().await.map_err(CoreError::storage)?;

        payment.status = PaymentStatus::Refunded;
        payment.refund_amount = amount;
        payment.refund_reason = Some(reason.to_string());
        payment.updated_at = Utc::now();
        Ok(payment)
    }

    async fn append_history(&self, entry: &PaymentHistory) -> CoreResult<()> {
        sqlx::query(
            "INSERT INTO payment_history (id, payment_id, status_change, changed_by, change_reason, timestamp)
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(entry.id)
        .bind(entry.payment_id)
        .bind(&entry.status_change)
        .bind(entry.changed_by.as_ref().map(|u| u.as_str().to_string()))
        .bind(&entry.change_reason)
        .bind(entry.timestamp)
        .execute(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        Ok(())
    }

    async fn payment_history(&self, payment_id: Uuid) -> CoreResult<Vec<PaymentHistory>> {
        let rows = sqlx::query_as::<_, PaymentHistoryRow>(
            "SELECT id, payment_id, status_change, changed_by, change_reason, timestamp FROM payment_history WHERE payment_id = $1 ORDER BY timestamp",
        )
        .bind(payment_id)
        .fetch_all(&self.pool)
        .await
        .map_err(CoreError::storage)?;
        Ok(rows.into_iter().map(PaymentHistoryRow::into_history).collect())
    }
}
