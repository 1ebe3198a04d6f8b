use std::sync::Arc;

use tokio::sync::broadcast;
use transix_booking::{BookingEngine, BookingStore};
use transix_catalog::CatalogStore;
use transix_payment::{PaymentEngine, PaymentStore};
use transix_shared::models::events::SeatEvent;

use crate::metrics::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<dyn CatalogStore>,
    pub booking_store: Arc<dyn BookingStore>,
    pub payment_store: Arc<dyn PaymentStore>,
    pub bookings: Arc<BookingEngine>,
    pub payments: Arc<PaymentEngine>,
    pub events: broadcast::Sender<SeatEvent>,
    pub metrics: Arc<Metrics>,
}
