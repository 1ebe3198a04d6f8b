//! Engine tests exercised against the in-memory store.
//!
//! These live as an integration test (rather than an inline `#[cfg(test)]`
//! module) because the fixture uses `transix_store::MemoryStore`, which depends
//! on this crate. As a unit test that cyclic dev-dependency pulls in a second
//! copy of `transix-payment`, so the store's trait impls would not match the
//! traits under test. An integration test links this crate as an ordinary
//! dependency, the same copy the store was built against, so the impls line up.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, NaiveTime, Utc};
use rust_decimal_macros::dec;
use transix_booking::{
    Booking, BookingEngine, BookingSeat, BookingStatus, BookingStore, CreateBooking, Gender,
    PassengerDetails,
};
use transix_catalog::{
    CatalogStore, FareCalculator, Route, Schedule, ScheduleStatus, Seat, SeatType, TransportMode,
    Vehicle,
};
use transix_core::{CoreError, Money, UserId};
use transix_payment::gateway::{GatewayBehavior, MockGateway};
use transix_payment::{PaymentEngine, PaymentMethod, PaymentStatus, PaymentStore};
use transix_store::MemoryStore;
use uuid::Uuid;

struct Fixture {
    store: Arc<MemoryStore>,
    bookings: BookingEngine,
    schedule: Schedule,
    seats: Vec<Seat>,
}

async fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());

    let route = Route {
        id: Uuid::new_v4(),
        origin: "Springfield".to_string(),
        destination: "Shelbyville".to_string(),
        distance_km: 120.0,
        estimated_minutes: 90,
        mode: TransportMode::Train,
        is_active: true,
    };
    let vehicle = Vehicle {
        id: Uuid::new_v4(),
        vehicle_number: "TRN-7".to_string(),
        mode: TransportMode::Train,
        capacity: 4,
        amenities: serde_json::json!(["ac"]),
        is_active: true,
    };
    let seats: Vec<Seat> = ["C1", "C2", "D1", "D2"]
        .iter()
        .map(|number| Seat {
            id: Uuid::new_v4(),
            vehicle_id: vehicle.id,
            seat_number: number.to_string(),
            seat_type: SeatType::Aisle,
        })
        .collect();
    let schedule = Schedule {
        id: Uuid::new_v4(),
        route_id: route.id,
        vehicle_id: vehicle.id,
        departure_date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
        departure_time: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        arrival_time: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
        price: Money::parse("45.00").unwrap(),
        status: ScheduleStatus::Scheduled,
        created_at: Utc::now(),
    };

    store.add_route(route).await;
    store.add_vehicle(vehicle).await;
    for seat in &seats {
        store.add_seat(seat.clone()).await;
    }
    store.add_schedule(schedule.clone()).await;

    let bookings = BookingEngine::new(
        store.clone(),
        store.clone(),
        FareCalculator::default(),
    );

    Fixture {
        store,
        bookings,
        schedule,
        seats,
    }
}

impl Fixture {
    fn engine_with(&self, gateway: MockGateway, timeout: Duration) -> PaymentEngine {
        PaymentEngine::new(
            self.store.clone(),
            self.store.clone(),
            self.store.clone(),
            Arc::new(gateway),
            FareCalculator::default(),
            timeout,
        )
    }

    fn engine(&self) -> PaymentEngine {
        self.engine_with(
            MockGateway::approving("Mock Gateway"),
            Duration::from_secs(5),
        )
    }

    async fn book_two_seats(&self, user: &UserId) -> Booking {
        self.bookings
            .create_booking(CreateBooking {
                user: user.clone(),
                schedule_id: self.schedule.id,
                seat_ids: vec![self.seats[0].id, self.seats[1].id],
                passengers: vec![
                    PassengerDetails {
                        name: "Rosa Diaz".to_string(),
                        age: 34,
                        gender: Gender::Female,
                    },
                    PassengerDetails {
                        name: "Jake Peralta".to_string(),
                        age: 36,
                        gender: Gender::Male,
                    },
                ],
                special_requests: None,
            })
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn test_successful_payment_confirms_booking() {
    let fx = fixture().await;
    let user = UserId::new("user-1");
    let booking = fx.book_two_seats(&user).await;
    let engine = fx.engine();

    let payment = engine
        .process_payment(&user, &booking.booking_ref, Some(PaymentMethod::CreditCard))
        .await
        .unwrap();

    assert_eq!(payment.status, PaymentStatus::Completed);
    assert_eq!(payment.amount.amount(), dec!(92.00));
    assert!(payment.transaction_id.as_deref().unwrap().starts_with("TXN"));
    assert_eq!(payment.gateway, "Mock Gateway");

    let stored = fx
        .store
        .get_booking(&booking.booking_ref)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, BookingStatus::Confirmed);

    let history = fx.store.payment_history(payment.id).await.unwrap();
    let changes: Vec<&str> = history.iter().map(|h| h.status_change.as_str()).collect();
    assert_eq!(changes, vec!["PROCESSING", "PROCESSING -> COMPLETED"]);
}

#[tokio::test]
async fn test_payment_method_is_required() {
    let fx = fixture().await;
    let user = UserId::new("user-1");
    let booking = fx.book_two_seats(&user).await;
    let engine = fx.engine();

    let err = engine
        .process_payment(&user, &booking.booking_ref, None)
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::PaymentMethodRequired));
}

#[tokio::test]
async fn test_processing_is_idempotent_for_completed_payment() {
    let fx = fixture().await;
    let user = UserId::new("user-1");
    let booking = fx.book_two_seats(&user).await;
    let engine = fx.engine();

    let first = engine
        .process_payment(&user, &booking.booking_ref, Some(PaymentMethod::Paypal))
        .await
        .unwrap();
    let history_len = fx.store.payment_history(first.id).await.unwrap().len();

    let second = engine
        .process_payment(&user, &booking.booking_ref, Some(PaymentMethod::Wallet))
        .await
        .unwrap();

    // Same payment, no second charge, no new history.
    assert_eq!(second.id, first.id);
    assert_eq!(second.payment_ref, first.payment_ref);
    assert_eq!(second.method, PaymentMethod::Paypal);
    assert_eq!(
        fx.store.payment_history(first.id).await.unwrap().len(),
        history_len
    );
}

#[tokio::test]
async fn test_declined_payment_leaves_booking_pending_and_is_retryable() {
    let fx = fixture().await;
    let user = UserId::new("user-1");
    let booking = fx.book_two_seats(&user).await;

    let declining = fx.engine_with(
        MockGateway::with_behavior(
            "Mock Gateway",
            GatewayBehavior::Decline("insufficient funds".to_string()),
        ),
        Duration::from_secs(5),
    );
    let failed = declining
        .process_payment(&user, &booking.booking_ref, Some(PaymentMethod::DebitCard))
        .await
        .unwrap();
    assert_eq!(failed.status, PaymentStatus::Failed);

    let stored = fx
        .store
        .get_booking(&booking.booking_ref)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, BookingStatus::Pending);

    // Retry reuses the same payment row rather than creating a second one.
    let approving = fx.engine();
    let retried = approving
        .process_payment(&user, &booking.booking_ref, Some(PaymentMethod::CreditCard))
        .await
        .unwrap();
    assert_eq!(retried.id, failed.id);
    assert_eq!(retried.status, PaymentStatus::Completed);
    assert_eq!(retried.method, PaymentMethod::CreditCard);

    let history = fx.store.payment_history(retried.id).await.unwrap();
    let changes: Vec<&str> = history.iter().map(|h| h.status_change.as_str()).collect();
    assert_eq!(
        changes,
        vec![
            "PROCESSING",
            "PROCESSING -> FAILED",
            "FAILED -> PROCESSING",
            "PROCESSING -> COMPLETED"
        ]
    );
}

#[tokio::test]
async fn test_gateway_timeout_fails_payment_and_surfaces_error() {
    let fx = fixture().await;
    let user = UserId::new("user-1");
    let booking = fx.book_two_seats(&user).await;

    let slow = fx.engine_with(
        MockGateway::with_behavior(
            "Mock Gateway",
            GatewayBehavior::Delay(Duration::from_millis(200)),
        ),
        Duration::from_millis(20),
    );
    let err = slow
        .process_payment(&user, &booking.booking_ref, Some(PaymentMethod::Wallet))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::GatewayError(_)));

    let payment = fx
        .store
        .payment_for_booking(booking.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(payment.status, PaymentStatus::Failed);

    let stored = fx
        .store
        .get_booking(&booking.booking_ref)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, BookingStatus::Pending);
}

#[tokio::test]
async fn test_refund_round_trip() {
    let fx = fixture().await;
    let user = UserId::new("user-1");
    let booking = fx.book_two_seats(&user).await;
    let engine = fx.engine();

    let payment = engine
        .process_payment(&user, &booking.booking_ref, Some(PaymentMethod::CreditCard))
        .await
        .unwrap();

    let refunded = engine
        .refund(&user, &payment.payment_ref, "plans changed")
        .await
        .unwrap();
    assert_eq!(refunded.status, PaymentStatus::Refunded);
    assert_eq!(refunded.refund_amount.amount(), dec!(92.00));
    assert_eq!(refunded.refund_reason.as_deref(), Some("plans changed"));

    let stored = fx
        .store
        .get_booking(&booking.booking_ref)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, BookingStatus::Cancelled);

    // Both seats returned to the pool.
    assert_eq!(
        fx.store.available_seat_count(fx.schedule.id).await.unwrap(),
        4
    );

    let err = engine
        .refund(&user, &payment.payment_ref, "again")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::RefundNotAllowed(_)));
}

#[tokio::test]
async fn test_refund_requires_completed_payment() {
    let fx = fixture().await;
    let user = UserId::new("user-1");
    let booking = fx.book_two_seats(&user).await;

    let declining = fx.engine_with(
        MockGateway::with_behavior(
            "Mock Gateway",
            GatewayBehavior::Decline("card expired".to_string()),
        ),
        Duration::from_secs(5),
    );
    let failed = declining
        .process_payment(&user, &booking.booking_ref, Some(PaymentMethod::CreditCard))
        .await
        .unwrap();

    let err = declining
        .refund(&user, &failed.payment_ref, "never charged")
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::RefundNotAllowed(_)));
}

#[tokio::test]
async fn test_unusable_stored_total_is_recomputed_from_fare() {
    let fx = fixture().await;
    let user = UserId::new("user-1");

    // A legacy row persisted under the old zero-fallback policy: the
    // stored total is 0.00 even though two seats were sold.
    let booking = Booking::new(user.clone(), fx.schedule.id, Money::zero(), None);
    let seats: Vec<BookingSeat> = fx.seats[..2]
        .iter()
        .map(|seat| BookingSeat {
            booking_id: booking.id,
            seat_id: seat.id,
            passenger_name: "Terry Jeffords".to_string(),
            passenger_age: 40,
            passenger_gender: Gender::Male,
        })
        .collect();
    fx.store.insert_booking(&booking, &seats).await.unwrap();
    for seat in &fx.seats[..2] {
        fx.store
            .reserve_seat(fx.schedule.id, seat.id, booking.id)
            .await
            .unwrap();
    }

    let payment = fx
        .engine()
        .process_payment(&user, &booking.booking_ref, Some(PaymentMethod::BankTransfer))
        .await
        .unwrap();

    assert_eq!(payment.amount.amount(), dec!(92.00));
    assert_eq!(payment.status, PaymentStatus::Completed);
}

#[tokio::test]
async fn test_processing_after_refund_is_rejected() {
    let fx = fixture().await;
    let user = UserId::new("user-1");
    let booking = fx.book_two_seats(&user).await;
    let engine = fx.engine();

    let payment = engine
        .process_payment(&user, &booking.booking_ref, Some(PaymentMethod::CreditCard))
        .await
        .unwrap();
    engine
        .refund(&user, &payment.payment_ref, "plans changed")
        .await
        .unwrap();

    let err = engine
        .process_payment(&user, &booking.booking_ref, Some(PaymentMethod::CreditCard))
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::InvalidStateTransition { .. }));
}
