use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transix_api::{app, AppState};
use transix_booking::{BookingEngine, BookingStore};
use transix_catalog::{CatalogStore, FareCalculator};
use transix_core::gateway::PaymentGateway;
use transix_payment::{MockGateway, PaymentEngine, PaymentStore};
use transix_store::{
    AvailabilityCache, DbClient, MemoryStore, PostgresBookingStore, PostgresCatalogStore,
    PostgresPaymentStore,
};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "transix_api=debug,tower_http=debug,axum::rejection=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = transix_store::Config::load().expect("Failed to load config");
    tracing::info!("Starting Transix API on port {}", config.server.port);

    let fares = FareCalculator::new(
        config
            .business_rules
            .fare_config()
            .expect("Invalid service fee in config"),
    );
    let gateway: Arc<dyn PaymentGateway> =
        Arc::new(MockGateway::approving(config.gateway.name.clone()));
    let gateway_timeout = Duration::from_millis(config.gateway.timeout_ms);

    let (catalog, booking_store, payment_store): (
        Arc<dyn CatalogStore>,
        Arc<dyn BookingStore>,
        Arc<dyn PaymentStore>,
    ) = match &config.database.url {
        Some(url) => {
            let db = DbClient::new(url).await.expect("Failed to connect to Postgres");
            db.migrate().await.expect("Failed to run migrations");

            let redis_url = config
                .redis
                .url
                .clone()
                .expect("redis.url is required when database.url is set");
            let cache = AvailabilityCache::new(&redis_url).expect("Failed to connect to Redis");

            (
                Arc::new(PostgresCatalogStore::new(db.pool.clone(), cache)),
                Arc::new(PostgresBookingStore::new(db.pool.clone())),
                Arc::new(PostgresPaymentStore::new(db.pool.clone())),
            )
        }
        None => {
            tracing::warn!("No database configured; using the in-memory store");
            let store = Arc::new(MemoryStore::new());
            (
                store.clone() as Arc<dyn CatalogStore>,
                store.clone() as Arc<dyn BookingStore>,
                store as Arc<dyn PaymentStore>,
            )
        }
    };

    let bookings = Arc::new(BookingEngine::new(
        catalog.clone(),
        booking_store.clone(),
        fares.clone(),
    ));
    let payments = Arc::new(PaymentEngine::new(
        booking_store.clone(),
        payment_store.clone(),
        catalog.clone(),
        gateway,
        fares,
        gateway_timeout,
    ));

    let (events, _) = tokio::sync::broadcast::channel(100);

    let state = AppState {
        catalog,
        booking_store,
        payment_store,
        bookings,
        payments,
        events,
        metrics: Arc::new(transix_api::metrics::Metrics::new()),
    };

    let router = app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind listener");
    axum::serve(listener, router).await.expect("Server error");
}
