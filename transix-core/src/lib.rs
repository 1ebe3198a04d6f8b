pub mod gateway;
pub mod identity;
pub mod money;

pub use identity::UserId;
pub use money::Money;

/// Error taxonomy shared by the booking and payment engines. Every operation
/// surfaces one of these kinds to the caller; nothing is swallowed.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Schedule not found: {0}")]
    ScheduleNotFound(String),
    #[error("Booking not found: {0}")]
    BookingNotFound(String),
    #[error("Payment not found: {0}")]
    PaymentNotFound(String),
    #[error("Seat not found: {0}")]
    SeatNotFound(String),
    #[error("Schedule {0} is not open for booking")]
    ScheduleNotBookable(String),
    #[error("Seat {seat} is no longer available")]
    SeatUnavailable { seat: String },
    #[error("Seat {seat} does not belong to the schedule's vehicle")]
    SeatVehicleMismatch { seat: String },
    #[error("Got {passengers} passengers for {seats} seats")]
    PassengerCountMismatch { passengers: usize, seats: usize },
    #[error("At least one seat must be selected")]
    EmptySeatSelection,
    #[error("A payment method is required")]
    PaymentMethodRequired,
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },
    #[error("Amount is not a positive value: {0}")]
    AmountInvalid(String),
    #[error("Amount could not be normalized: {0}")]
    AmountNormalization(String),
    #[error("Payment gateway error: {0}")]
    GatewayError(String),
    #[error("Refund not allowed from payment status {0}")]
    RefundNotAllowed(String),
    #[error("Storage error: {0}")]
    Storage(String),
}

impl CoreError {
    pub fn storage(err: impl std::fmt::Display) -> Self {
        CoreError::Storage(err.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
