use std::sync::Arc;

use tracing::{info, warn};
use transix_catalog::{CatalogStore, FareCalculator};
use transix_core::{CoreError, CoreResult, UserId};
use uuid::Uuid;

use crate::models::{Booking, BookingHistory, BookingSeat, BookingStatus, PassengerDetails};
use crate::repository::BookingStore;

/// Booking creation request. Passengers pair positionally with `seat_ids`.
#[derive(Debug, Clone)]
pub struct CreateBooking {
    pub user: UserId,
    pub schedule_id: Uuid,
    pub seat_ids: Vec<Uuid>,
    pub passengers: Vec<PassengerDetails>,
    pub special_requests: Option<String>,
}

/// Creates and cancels bookings, owning the seat-reservation invariant: the
/// availability check and the reservation write happen as one conditional
/// operation in the store, per seat.
pub struct BookingEngine {
    catalog: Arc<dyn CatalogStore>,
    bookings: Arc<dyn BookingStore>,
    fares: FareCalculator,
}

impl BookingEngine {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        bookings: Arc<dyn BookingStore>,
        fares: FareCalculator,
    ) -> Self {
        Self {
            catalog,
            bookings,
            fares,
        }
    }

    pub async fn create_booking(&self, req: CreateBooking) -> CoreResult<Booking> {
        let schedule = self
            .catalog
            .get_schedule(req.schedule_id)
            .await?
            .ok_or_else(|| CoreError::ScheduleNotFound(req.schedule_id.to_string()))?;

        if !schedule.is_bookable() {
            return Err(CoreError::ScheduleNotBookable(schedule.id.to_string()));
        }

        if req.seat_ids.is_empty() {
            return Err(CoreError::EmptySeatSelection);
        }

        if req.passengers.len() != req.seat_ids.len() {
            return Err(CoreError::PassengerCountMismatch {
                passengers: req.passengers.len(),
                seats: req.seat_ids.len(),
            });
        }

        // Validate seat identity up front; the availability check itself is
        // deferred to the conditional reserve below.
        for seat_id in &req.seat_ids {
            let seat = self
                .catalog
                .get_seat(*seat_id)
                .await?
                .ok_or_else(|| CoreError::SeatNotFound(seat_id.to_string()))?;
            if seat.vehicle_id != schedule.vehicle_id {
                return Err(CoreError::SeatVehicleMismatch {
                    seat: seat.seat_number,
                });
            }
        }

        let fare = self.fares.quote(schedule.price, req.seat_ids.len() as u32)?;
        let booking = Booking::new(
            req.user.clone(),
            schedule.id,
            fare.total,
            req.special_requests,
        );

        // Reserve seat by seat. Each reserve is a compare-and-set in the
        // store; losing a race surfaces as SeatUnavailable and undoes any
        // seats this attempt already took.
        let mut reserved: Vec<Uuid> = Vec::with_capacity(req.seat_ids.len());
        for seat_id in &req.seat_ids {
            if let Err(err) = self
                .catalog
                .reserve_seat(schedule.id, *seat_id, booking.id)
                .await
            {
                self.release_reserved(schedule.id, &reserved).await;
                return Err(err);
            }
            reserved.push(*seat_id);
        }

        let seats: Vec<BookingSeat> = req
            .seat_ids
            .iter()
            .zip(req.passengers.into_iter())
            .map(|(seat_id, passenger)| BookingSeat {
                booking_id: booking.id,
                seat_id: *seat_id,
                passenger_name: passenger.name,
                passenger_age: passenger.age,
                passenger_gender: passenger.gender,
            })
            .collect();

        if let Err(err) = self.bookings.insert_booking(&booking, &seats).await {
            self.release_reserved(schedule.id, &reserved).await;
            return Err(err);
        }

        self.bookings
            .append_history(&BookingHistory::record(
                booking.id,
                BookingStatus::Pending.as_str(),
                Some(booking.user.clone()),
                Some("booking created".to_string()),
            ))
            .await?;

        info!(
            booking_ref = %booking.booking_ref,
            schedule = %schedule.id,
            seats = seats.len(),
            total = %booking.total_amount,
            "booking created"
        );

        Ok(booking)
    }

    /// Cancel a pending or confirmed booking, returning its seats to the
    /// pool. Terminal bookings reject with InvalidStateTransition.
    pub async fn cancel_booking(&self, user: &UserId, booking_ref: &str) -> CoreResult<()> {
        let booking = self.get_owned(user, booking_ref).await?;

        let prior = self
            .bookings
            .update_status(
                booking.id,
                &[BookingStatus::Pending, BookingStatus::Confirmed],
                BookingStatus::Cancelled,
            )
            .await?;

        for seat in self.bookings.booking_seats(booking.id).await? {
            self.catalog
                .release_seat(booking.schedule_id, seat.seat_id)
                .await?;
        }

        self.bookings
            .append_history(&BookingHistory::record(
                booking.id,
                format!("{} -> {}", prior, BookingStatus::Cancelled),
                Some(user.clone()),
                Some("cancelled by user".to_string()),
            ))
            .await?;

        info!(booking_ref = %booking.booking_ref, "booking cancelled");
        Ok(())
    }

    /// Fetch a booking scoped to its owner. Other users' bookings are
    /// indistinguishable from missing ones.
    pub async fn get_owned(&self, user: &UserId, booking_ref: &str) -> CoreResult<Booking> {
        let booking = self
            .bookings
            .get_booking(booking_ref)
            .await?
            .ok_or_else(|| CoreError::BookingNotFound(booking_ref.to_string()))?;
        if booking.user != *user {
            return Err(CoreError::BookingNotFound(booking_ref.to_string()));
        }
        Ok(booking)
    }

    async fn release_reserved(&self, schedule_id: Uuid, seat_ids: &[Uuid]) {
        for seat_id in seat_ids {
            if let Err(err) = self.catalog.release_seat(schedule_id, *seat_id).await {
                warn!(schedule = %schedule_id, seat = %seat_id, error = %err, "failed to release seat during rollback");
            }
        }
    }
}
