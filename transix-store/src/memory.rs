use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use transix_booking::{Booking, BookingHistory, BookingSeat, BookingStatus, BookingStore};
use transix_catalog::{
    CatalogStore, InventoryError, Route, Schedule, ScheduleOption, Seat, SeatAssignment,
    SeatInventory, Vehicle,
};
use transix_core::{CoreError, CoreResult, Money, UserId};
use transix_payment::{Payment, PaymentHistory, PaymentMethod, PaymentStatus, PaymentStore};

/// In-memory implementation of every store trait.
///
/// Backs the test suites and local runs without a database. Each area sits
/// behind one async mutex, so a seat reserve or a conditional payment insert
/// is check-and-write under a single lock, the same atomicity the Postgres
/// store gets from conditional UPDATEs and unique indexes.
pub struct MemoryStore {
    catalog: Mutex<CatalogState>,
    bookings: Mutex<BookingState>,
    payments: Mutex<PaymentState>,
}

#[derive(Default)]
struct CatalogState {
    routes: HashMap<Uuid, Route>,
    vehicles: HashMap<Uuid, Vehicle>,
    schedules: HashMap<Uuid, Schedule>,
    seats: HashMap<Uuid, Seat>,
    inventory: SeatInventory,
}

#[derive(Default)]
struct BookingState {
    bookings: HashMap<Uuid, Booking>,
    by_ref: HashMap<String, Uuid>,
    seats: HashMap<Uuid, Vec<BookingSeat>>,
    history: HashMap<Uuid, Vec<BookingHistory>>,
}

#[derive(Default)]
struct PaymentState {
    payments: HashMap<Uuid, Payment>,
    by_ref: HashMap<String, Uuid>,
    by_booking: HashMap<Uuid, Uuid>,
    history: HashMap<Uuid, Vec<PaymentHistory>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            catalog: Mutex::new(CatalogState::default()),
            bookings: Mutex::new(BookingState::default()),
            payments: Mutex::new(PaymentState::default()),
        }
    }

    pub async fn add_route(&self, route: Route) {
        self.catalog.lock().await.routes.insert(route.id, route);
    }

    pub async fn add_vehicle(&self, vehicle: Vehicle) {
        self.catalog.lock().await.vehicles.insert(vehicle.id, vehicle);
    }

    pub async fn add_seat(&self, seat: Seat) {
        self.catalog.lock().await.seats.insert(seat.id, seat);
    }

    /// Register a schedule and open an assignment for every seat of its
    /// vehicle.
    pub async fn add_schedule(&self, schedule: Schedule) {
        let mut state = self.catalog.lock().await;
        let seat_ids: Vec<Uuid> = state
            .seats
            .values()
            .filter(|seat| seat.vehicle_id == schedule.vehicle_id)
            .map(|seat| seat.id)
            .collect();
        for seat_id in seat_ids {
            state.inventory.open(schedule.id, seat_id);
        }
        state.schedules.insert(schedule.id, schedule);
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn map_inventory_err(err: InventoryError) -> CoreError {
    match err {
        InventoryError::NotOpen { seat_id, .. } => CoreError::SeatNotFound(seat_id.to_string()),
        InventoryError::AlreadyReserved { seat_id, .. } => CoreError::SeatUnavailable {
            seat: seat_id.to_string(),
        },
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn get_route(&self, id: Uuid) -> CoreResult<Option<Route>> {
        Ok(self.catalog.lock().await.routes.get(&id).cloned())
    }

    async fn get_vehicle(&self, id: Uuid) -> CoreResult<Option<Vehicle>> {
        Ok(self.catalog.lock().await.vehicles.get(&id).cloned())
    }

    async fn get_schedule(&self, id: Uuid) -> CoreResult<Option<Schedule>> {
        Ok(self.catalog.lock().await.schedules.get(&id).cloned())
    }

    async fn search_schedules(
        &self,
        origin: &str,
        destination: &str,
        date: NaiveDate,
    ) -> CoreResult<Vec<ScheduleOption>> {
        let state = self.catalog.lock().await;
        let mut options = Vec::new();

        for schedule in state.schedules.values() {
            if schedule.departure_date != date {
                continue;
            }
            let route = match state.routes.get(&schedule.route_id) {
                Some(route) => route,
                None => continue,
            };
            if !route.origin.eq_ignore_ascii_case(origin)
                || !route.destination.eq_ignore_ascii_case(destination)
            {
                continue;
            }
            let vehicle = match state.vehicles.get(&schedule.vehicle_id) {
                Some(vehicle) => vehicle,
                None => continue,
            };

            options.push(ScheduleOption {
                schedule_id: schedule.id,
                origin: route.origin.clone(),
                destination: route.destination.clone(),
                mode: route.mode,
                vehicle_number: vehicle.vehicle_number.clone(),
                departure_date: schedule.departure_date,
                departure_time: schedule.departure_time,
                arrival_time: schedule.arrival_time,
                price: schedule.price,
                remaining_seats: state.inventory.available_count(schedule.id),
                status: schedule.status,
            });
        }

        options.sort_by_key(|option| option.departure_time);
        Ok(options)
    }

    async fn get_seat(&self, id: Uuid) -> CoreResult<Option<Seat>> {
        Ok(self.catalog.lock().await.seats.get(&id).cloned())
    }

    async fn list_seats(&self, vehicle_id: Uuid) -> CoreResult<Vec<Seat>> {
        let state = self.catalog.lock().await;
        let mut seats: Vec<Seat> = state
            .seats
            .values()
            .filter(|seat| seat.vehicle_id == vehicle_id)
            .cloned()
            .collect();
        seats.sort_by(|a, b| a.seat_number.cmp(&b.seat_number));
        Ok(seats)
    }

    async fn seat_assignments(&self, schedule_id: Uuid) -> CoreResult<Vec<SeatAssignment>> {
        Ok(self.catalog.lock().await.inventory.assignments_for(schedule_id))
    }

    async fn available_seat_count(&self, schedule_id: Uuid) -> CoreResult<i64> {
        Ok(self.catalog.lock().await.inventory.available_count(schedule_id))
    }

    async fn reserve_seat(
        &self,
        schedule_id: Uuid,
        seat_id: Uuid,
        booking_id: Uuid,
    ) -> CoreResult<()> {
        self.catalog
            .lock()
            .await
            .inventory
            .reserve(schedule_id, seat_id, booking_id)
            .map_err(map_inventory_err)
    }

    async fn release_seat(&self, schedule_id: Uuid, seat_id: Uuid) -> CoreResult<()> {
        self.catalog
            .lock()
            .await
            .inventory
            .release(schedule_id, seat_id)
            .map_err(map_inventory_err)
    }
}

#[async_trait]
impl BookingStore for MemoryStore {
    async fn insert_booking(&self, booking: &Booking, seats: &[BookingSeat]) -> CoreResult<()> {
        let mut state = self.bookings.lock().await;
        state.by_ref.insert(booking.booking_ref.clone(), booking.id);
        state.bookings.insert(booking.id, booking.clone());
        state.seats.insert(booking.id, seats.to_vec());
        state.history.entry(booking.id).or_default();
        Ok(())
    }

    async fn get_booking(&self, booking_ref: &str) -> CoreResult<Option<Booking>> {
        let state = self.bookings.lock().await;
        Ok(state
            .by_ref
            .get(booking_ref)
            .and_then(|id| state.bookings.get(id))
            .cloned())
    }

    async fn get_booking_by_id(&self, id: Uuid) -> CoreResult<Option<Booking>> {
        Ok(self.bookings.lock().await.bookings.get(&id).cloned())
    }

    async fn list_bookings(&self, user: &UserId) -> CoreResult<Vec<Booking>> {
        let state = self.bookings.lock().await;
        let mut bookings: Vec<Booking> = state
            .bookings
            .values()
            .filter(|booking| booking.user == *user)
            .cloned()
            .collect();
        bookings.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bookings)
    }

    async fn booking_seats(&self, booking_id: Uuid) -> CoreResult<Vec<BookingSeat>> {
        Ok(self
            .bookings
            .lock()
            .await
            .seats
            .get(&booking_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn update_status(
        &self,
        booking_id: Uuid,
        expected: &[BookingStatus],
        next: BookingStatus,
    ) -> CoreResult<BookingStatus> {
        let mut state = self.bookings.lock().await;
        let booking = state
            .bookings
            .get_mut(&booking_id)
            .ok_or_else(|| CoreError::BookingNotFound(booking_id.to_string()))?;

        let prior = booking.status;
        if !expected.contains(&prior) {
            return Err(CoreError::InvalidStateTransition {
                from: prior.to_string(),
                to: next.to_string(),
            });
        }

        booking.status = next;
        booking.updated_at = Utc::now();
        Ok(prior)
    }

    async fn append_history(&self, entry: &BookingHistory) -> CoreResult<()> {
        self.bookings
            .lock()
            .await
            .history
            .entry(entry.booking_id)
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn booking_history(&self, booking_id: Uuid) -> CoreResult<Vec<BookingHistory>> {
        Ok(self
            .bookings
            .lock()
            .await
            .history
            .get(&booking_id)
            .cloned()
            .unwrap_or_default())
    }
}

#[async_trait]
impl PaymentStore for MemoryStore {
    async fn insert_payment(&self, payment: &Payment) -> CoreResult<Payment> {
        let mut state = self.payments.lock().await;

        if let Some(existing_id) = state.by_booking.get(&payment.booking_id) {
            let existing = state
                .payments
                .get(existing_id)
                .cloned()
                .ok_or_else(|| CoreError::Storage("payment index out of sync".to_string()))?;
            return Ok(existing);
        }

        state.by_booking.insert(payment.booking_id, payment.id);
        state.by_ref.insert(payment.payment_ref.clone(), payment.id);
        state.payments.insert(payment.id, payment.clone());
        state.history.entry(payment.id).or_default();
        Ok(payment.clone())
    }

    async fn get_payment(&self, payment_ref: &str) -> CoreResult<Option<Payment>> {
        let state = self.payments.lock().await;
        Ok(state
            .by_ref
            .get(payment_ref)
            .and_then(|id| state.payments.get(id))
            .cloned())
    }

    async fn payment_for_booking(&self, booking_id: Uuid) -> CoreResult<Option<Payment>> {
        let state = self.payments.lock().await;
        Ok(state
            .by_booking
            .get(&booking_id)
            .and_then(|id| state.payments.get(id))
            .cloned())
    }

    async fn reopen_for_retry(
        &self,
        payment_id: Uuid,
        method: PaymentMethod,
        transaction_id: &str,
    ) -> CoreResult<Payment> {
        let mut state = self.payments.lock().await;
        let payment = state
            .payments
            .get_mut(&payment_id)
            .ok_or_else(|| CoreError::PaymentNotFound(payment_id.to_string()))?;

        if payment.status != PaymentStatus::Failed {
            return Err(CoreError::InvalidStateTransition {
                from: payment.status.to_string(),
                to: PaymentStatus::Processing.to_string(),
            });
        }

        payment.status = PaymentStatus::Processing;
        payment.method = method;
        payment.transaction_id = Some(transaction_id.to_string());
        payment.updated_at = Utc::now();
        Ok(payment.clone())
    }

    async fn complete(&self, payment_id: Uuid, transaction_id: &str) -> CoreResult<Payment> {
        let mut state = self.payments.lock().await;
        let payment = state
            .payments
            .get_mut(&payment_id)
            .ok_or_else(|| CoreError::PaymentNotFound(payment_id.to_string()))?;

        if payment.status != PaymentStatus::Processing {
            return Err(CoreError::InvalidStateTransition {
                from: payment.status.to_string(),
                to: PaymentStatus::Completed.to_string(),
            });
        }

        payment.status = PaymentStatus::Completed;
        payment.transaction_id = Some(transaction_id.to_string());
        payment.updated_at = Utc::now();
        Ok(payment.clone())
    }

    async fn fail(&self, payment_id: Uuid) -> CoreResult<Payment> {
        let mut state = self.payments.lock().await;
        let payment = state
            .payments
            .get_mut(&payment_id)
            .ok_or_else(|| CoreError::PaymentNotFound(payment_id.to_string()))?;

        if payment.status != PaymentStatus::Processing {
            return Err(CoreError::InvalidStateTransition {
                from: payment.status.to_string(),
                to: PaymentStatus::Failed.to_string(),
            });
        }

        payment.status = PaymentStatus::Failed;
        payment.updated_at = Utc::now();
        Ok(payment.clone())
    }

    async fn record_refund(
        &self,
        payment_id: Uuid,
        amount: Money,
        reason: &str,
    ) -> CoreResult<Payment> {
        let mut state = self.payments.lock().await;
        let payment = state
            .payments
            .get_mut(&payment_id)
            .ok_or_else(|| CoreError::PaymentNotFound(payment_id.to_string()))?;

        if payment.status != PaymentStatus::Completed {
            return Err(CoreError::RefundNotAllowed(payment.status.to_string()));
        }

        payment.status = PaymentStatus::Refunded;
        payment.refund_amount = amount;
        payment.refund_reason = Some(reason.to_string());
        payment.updated_at = Utc::now();
        Ok(payment.clone())
    }

    async fn append_history(&self, entry: &PaymentHistory) -> CoreResult<()> {
        self.payments
            .lock()
            .await
            .history
            .entry(entry.payment_id)
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn payment_history(&self, payment_id: Uuid) -> CoreResult<Vec<PaymentHistory>> {
        Ok(self
            .payments
            .lock()
            .await
            .history
            .get(&payment_id)
            .cloned()
            .unwrap_or_default())
    }
}
