use async_trait::async_trait;
use transix_core::{CoreResult, UserId};
use uuid::Uuid;

use crate::models::{Booking, BookingHistory, BookingSeat, BookingStatus};

/// Booking persistence. Status updates are compare-and-set so concurrent
/// cancel/pay races cannot produce lost updates.
#[async_trait]
pub trait BookingStore: Send + Sync {
    /// Persist a booking together with its seat rows.
    async fn insert_booking(&self, booking: &Booking, seats: &[BookingSeat]) -> CoreResult<()>;

    async fn get_booking(&self, booking_ref: &str) -> CoreResult<Option<Booking>>;

    async fn get_booking_by_id(&self, id: Uuid) -> CoreResult<Option<Booking>>;

    async fn list_bookings(&self, user: &UserId) -> CoreResult<Vec<Booking>>;

    async fn booking_seats(&self, booking_id: Uuid) -> CoreResult<Vec<BookingSeat>>;

    /// Compare-and-set status update. Succeeds only if the current status is
    /// one of `expected`, returning the prior status; otherwise
    /// `CoreError::InvalidStateTransition`.
    async fn update_status(
        &self,
        booking_id: Uuid,
        expected: &[BookingStatus],
        next: BookingStatus,
    ) -> CoreResult<BookingStatus>;

    async fn append_history(&self, entry: &BookingHistory) -> CoreResult<()>;

    async fn booking_history(&self, booking_id: Uuid) -> CoreResult<Vec<BookingHistory>>;
}
