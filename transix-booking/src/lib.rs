pub mod engine;
pub mod models;
pub mod repository;

pub use engine::{BookingEngine, CreateBooking};
pub use models::{Booking, BookingHistory, BookingSeat, BookingStatus, Gender, PassengerDetails};
pub use repository::BookingStore;
