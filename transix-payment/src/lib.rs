pub mod engine;
pub mod gateway;
pub mod models;
pub mod repository;

pub use engine::PaymentEngine;
pub use gateway::{GatewayBehavior, MockGateway};
pub use models::{Payment, PaymentHistory, PaymentMethod, PaymentStatus};
pub use repository::PaymentStore;
