use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{NaiveDate, NaiveTime, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use transix_api::{app, AppState};
use transix_booking::BookingEngine;
use transix_catalog::{
    FareCalculator, Route, Schedule, ScheduleStatus, Seat, SeatType, TransportMode, Vehicle,
};
use transix_core::gateway::PaymentGateway;
use transix_core::Money;
use transix_payment::{GatewayBehavior, MockGateway, PaymentEngine};
use transix_store::MemoryStore;

struct TestApp {
    router: Router,
    schedule_id: Uuid,
    seat_ids: Vec<Uuid>,
}

async fn test_app(gateway: MockGateway) -> TestApp {
    let store = Arc::new(MemoryStore::new());

    let route = Route {
        id: Uuid::new_v4(),
        origin: "Springfield".to_string(),
        destination: "Shelbyville".to_string(),
        distance_km: 120.0,
        estimated_minutes: 90,
        mode: TransportMode::Bus,
        is_active: true,
    };
    let vehicle = Vehicle {
        id: Uuid::new_v4(),
        vehicle_number: "BUS-100".to_string(),
        mode: TransportMode::Bus,
        capacity: 4,
        amenities: json!(["wifi"]),
        is_active: true,
    };
    let seats: Vec<Seat> = ["A1", "A2", "B1", "B2"]
        .iter()
        .map(|number| Seat {
            id: Uuid::new_v4(),
            vehicle_id: vehicle.id,
            seat_number: number.to_string(),
            seat_type: SeatType::Window,
        })
        .collect();
    let schedule = Schedule {
        id: Uuid::new_v4(),
        route_id: route.id,
        vehicle_id: vehicle.id,
        departure_date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
        departure_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        arrival_time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
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

    let fares = FareCalculator::default();
    let bookings = Arc::new(BookingEngine::new(
        store.clone(),
        store.clone(),
        fares.clone(),
    ));
    let payments = Arc::new(PaymentEngine::new(
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(gateway) as Arc<dyn PaymentGateway>,
        fares,
        Duration::from_secs(5),
    ));

    let (events, _) = tokio::sync::broadcast::channel(100);

    let state = AppState {
        catalog: store.clone(),
        booking_store: store.clone(),
        payment_store: store.clone(),
        bookings,
        payments,
        events,
        metrics: Arc::new(transix_api::metrics::Metrics::new()),
    };

    TestApp {
        router: app(state),
        schedule_id: schedule.id,
        seat_ids: seats.iter().map(|seat| seat.id).collect(),
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn post_json(uri: &str, user: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .header("x-user-id", user)
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get_as(uri: &str, user: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("x-user-id", user)
        .body(Body::empty())
        .unwrap()
}

fn booking_payload(app: &TestApp, seats: usize) -> Value {
    json!({
        "schedule_id": app.schedule_id,
        "seat_ids": app.seat_ids[..seats].to_vec(),
        "passengers": (0..seats).map(|i| json!({
            "name": format!("Passenger {}", i + 1),
            "age": 30 + i,
            "gender": "OTHER",
        })).collect::<Vec<_>>(),
    })
}

#[tokio::test]
async fn test_requests_without_identity_are_rejected() {
    let app = test_app(MockGateway::approving("Mock Gateway")).await;

    let request = Request::builder()
        .method("POST")
        .uri("/v1/bookings")
        .header("content-type", "application/json")
        .body(Body::from(booking_payload(&app, 1).to_string()))
        .unwrap();

    let (status, body) = send(&app.router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].as_str().unwrap().contains("X-User-Id"));
}

#[tokio::test]
async fn test_schedule_search_returns_live_availability() {
    let app = test_app(MockGateway::approving("Mock Gateway")).await;

    let (status, body) = send(
        &app.router,
        get_as(
            "/v1/schedules/search?origin=springfield&destination=Shelbyville&date=2025-06-01",
            "user-1",
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let options = body.as_array().unwrap();
    assert_eq!(options.len(), 1);
    assert_eq!(options[0]["price"], "45.00");
    assert_eq!(options[0]["remaining_seats"], 4);
    assert_eq!(options[0]["status"], "SCHEDULED");
}

#[tokio::test]
async fn test_booking_payment_refund_flow() {
    let app = test_app(MockGateway::approving("Mock Gateway")).await;
    let user = "user-1";

    // Book two seats at 45.00 each; total includes the 2.00 service fee.
    let (status, booking) = send(
        &app.router,
        post_json("/v1/bookings", user, booking_payload(&app, 2)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(booking["status"], "PENDING");
    assert_eq!(booking["total_amount"], "92.00");
    let booking_ref = booking["booking_ref"].as_str().unwrap().to_string();

    // Seat map shows the two seats held.
    let (_, seat_map) = send(
        &app.router,
        get_as(&format!("/v1/schedules/{}/seats", app.schedule_id), user),
    )
    .await;
    let reserved = seat_map
        .as_array()
        .unwrap()
        .iter()
        .filter(|entry| entry["state"] == "RESERVED")
        .count();
    assert_eq!(reserved, 2);

    // Pay.
    let (status, payment) = send(
        &app.router,
        post_json(
            &format!("/v1/bookings/{booking_ref}/payment"),
            user,
            json!({"payment_method": "CREDIT_CARD"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payment["status"], "COMPLETED");
    assert_eq!(payment["amount"], "92.00");
    let payment_ref = payment["payment_ref"].as_str().unwrap().to_string();

    let (_, detail) = send(
        &app.router,
        get_as(&format!("/v1/bookings/{booking_ref}"), user),
    )
    .await;
    assert_eq!(detail["status"], "CONFIRMED");

    // The payment's audit trail is visible on its detail view.
    let (_, payment_detail) = send(
        &app.router,
        get_as(&format!("/v1/payments/{payment_ref}"), user),
    )
    .await;
    let changes: Vec<&str> = payment_detail["history"]
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["status_change"].as_str().unwrap())
        .collect();
    assert_eq!(changes, vec!["PROCESSING", "PROCESSING -> COMPLETED"]);

    // Paying again returns the same payment, unchanged.
    let (status, second) = send(
        &app.router,
        post_json(
            &format!("/v1/bookings/{booking_ref}/payment"),
            user,
            json!({"payment_method": "WALLET"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["payment_ref"], payment_ref.as_str());
    assert_eq!(second["method"], "CREDIT_CARD");

    // Refund: full amount back, booking cancelled, seats released.
    let (status, refunded) = send(
        &app.router,
        post_json(
            &format!("/v1/payments/{payment_ref}/refund"),
            user,
            json!({"reason": "plans changed"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(refunded["status"], "REFUNDED");
    assert_eq!(refunded["refund_amount"], "92.00");

    let (_, detail) = send(
        &app.router,
        get_as(&format!("/v1/bookings/{booking_ref}"), user),
    )
    .await;
    assert_eq!(detail["status"], "CANCELLED");

    let (_, seat_map) = send(
        &app.router,
        get_as(&format!("/v1/schedules/{}/seats", app.schedule_id), user),
    )
    .await;
    assert!(seat_map
        .as_array()
        .unwrap()
        .iter()
        .all(|entry| entry["state"] == "AVAILABLE"));

    // A second refund is rejected.
    let (status, body) = send(
        &app.router,
        post_json(
            &format!("/v1/payments/{payment_ref}/refund"),
            user,
            json!({"reason": "again"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("Refund not allowed"));
}

#[tokio::test]
async fn test_declined_payment_maps_to_payment_required() {
    let app = test_app(MockGateway::with_behavior(
        "Mock Gateway",
        GatewayBehavior::Decline("insufficient funds".to_string()),
    ))
    .await;
    let user = "user-2";

    let (_, booking) = send(
        &app.router,
        post_json("/v1/bookings", user, booking_payload(&app, 1)),
    )
    .await;
    let booking_ref = booking["booking_ref"].as_str().unwrap().to_string();

    let (status, payment) = send(
        &app.router,
        post_json(
            &format!("/v1/bookings/{booking_ref}/payment"),
            user,
            json!({"payment_method": "DEBIT_CARD"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert_eq!(payment["status"], "FAILED");

    let (_, detail) = send(
        &app.router,
        get_as(&format!("/v1/bookings/{booking_ref}"), user),
    )
    .await;
    assert_eq!(detail["status"], "PENDING");
}

#[tokio::test]
async fn test_missing_payment_method_is_a_validation_error() {
    let app = test_app(MockGateway::approving("Mock Gateway")).await;
    let user = "user-3";

    let (_, booking) = send(
        &app.router,
        post_json("/v1/bookings", user, booking_payload(&app, 1)),
    )
    .await;
    let booking_ref = booking["booking_ref"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app.router,
        post_json(
            &format!("/v1/bookings/{booking_ref}/payment"),
            user,
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_taken_seat_is_a_conflict() {
    let app = test_app(MockGateway::approving("Mock Gateway")).await;

    let (status, _) = send(
        &app.router,
        post_json("/v1/bookings", "user-1", booking_payload(&app, 1)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = send(
        &app.router,
        post_json("/v1/bookings", "user-2", booking_payload(&app, 1)),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["error"].as_str().unwrap().contains("no longer available"));
}

#[tokio::test]
async fn test_health_and_metrics_endpoints() {
    let app = test_app(MockGateway::approving("Mock Gateway")).await;

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (_, booking) = send(
        &app.router,
        post_json("/v1/bookings", "user-1", booking_payload(&app, 1)),
    )
    .await;
    assert_eq!(booking["status"], "PENDING");

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("transix_bookings_created_total 1"));
}
