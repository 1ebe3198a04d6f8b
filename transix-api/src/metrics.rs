use axum::extract::State;
use prometheus::{Encoder, IntCounter, Registry, TextEncoder};

use crate::state::AppState;

pub struct Metrics {
    registry: Registry,
    pub bookings_created: IntCounter,
    pub bookings_cancelled: IntCounter,
    pub payments_completed: IntCounter,
    pub payments_failed: IntCounter,
    pub refunds_processed: IntCounter,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let bookings_created = register_counter(
            &registry,
            "transix_bookings_created_total",
            "Bookings created",
        );
        let bookings_cancelled = register_counter(
            &registry,
            "transix_bookings_cancelled_total",
            "Bookings cancelled",
        );
        let payments_completed = register_counter(
            &registry,
            "transix_payments_completed_total",
            "Payments completed",
        );
        let payments_failed = register_counter(
            &registry,
            "transix_payments_failed_total",
            "Payments failed or declined",
        );
        let refunds_processed = register_counter(
            &registry,
            "transix_refunds_processed_total",
            "Refunds processed",
        );

        Self {
            registry,
            bookings_created,
            bookings_cancelled,
            payments_completed,
            payments_failed,
            refunds_processed,
        }
    }

    pub fn encode(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(err) = encoder.encode(&self.registry.gather(), &mut buffer) {
            tracing::error!("failed to encode metrics: {}", err);
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

fn register_counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
    let counter = IntCounter::new(name, help).expect("valid counter spec");
    registry
        .register(Box::new(counter.clone()))
        .expect("counter registered once");
    counter
}

pub async fn metrics_handler(State(state): State<AppState>) -> String {
    state.metrics.encode()
}
