pub mod inventory;
pub mod pricing;
pub mod repository;
pub mod schedule;

pub use inventory::{InventoryError, SeatInventory};
pub use pricing::{Fare, FareCalculator, FareConfig};
pub use repository::CatalogStore;
pub use schedule::{
    Route, Schedule, ScheduleOption, ScheduleStatus, Seat, SeatAssignment, SeatState, SeatType,
    TransportMode, Vehicle,
};
