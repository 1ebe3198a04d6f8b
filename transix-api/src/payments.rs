use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use transix_core::Money;
use transix_payment::{Payment, PaymentMethod, PaymentStatus};

use crate::bookings::publish_seat_events;
use crate::error::AppError;
use crate::identity::CurrentUser;
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ProcessPaymentRequest {
    pub payment_method: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub payment_ref: String,
    pub status: PaymentStatus,
    pub amount: Money,
    pub method: PaymentMethod,
    pub transaction_id: Option<String>,
    pub gateway: String,
    pub refund_amount: Money,
    pub refund_reason: Option<String>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            payment_ref: payment.payment_ref,
            status: payment.status,
            amount: payment.amount,
            method: payment.method,
            transaction_id: payment.transaction_id,
            gateway: payment.gateway,
            refund_amount: payment.refund_amount,
            refund_reason: payment.refund_reason,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentDetailResponse {
    #[serde(flatten)]
    pub payment: PaymentResponse,
    pub history: Vec<crate::bookings::HistoryResponse>,
}

// ============================================================================
// Handlers
// ============================================================================

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/bookings/{booking_ref}/payment", post(process_payment))
        .route("/v1/payments/{payment_ref}", get(get_payment))
        .route("/v1/payments/{payment_ref}/refund", post(refund_payment))
}

/// POST /v1/bookings/:booking_ref/payment
async fn process_payment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(booking_ref): Path<String>,
    Json(req): Json<ProcessPaymentRequest>,
) -> Result<(StatusCode, Json<PaymentResponse>), AppError> {
    let method = match req.payment_method.as_deref() {
        None => None,
        Some(raw) => Some(raw.parse::<PaymentMethod>().map_err(|_| {
            AppError::ValidationError(format!("Unknown payment method: {raw}"))
        })?),
    };

    let payment = state
        .payments
        .process_payment(&user, &booking_ref, method)
        .await?;

    let status = match payment.status {
        PaymentStatus::Completed => {
            state.metrics.payments_completed.inc();
            StatusCode::OK
        }
        PaymentStatus::Failed => {
            state.metrics.payments_failed.inc();
            // The charge was declined; the booking is untouched and another
            // attempt may be made.
            StatusCode::PAYMENT_REQUIRED
        }
        _ => StatusCode::OK,
    };

    Ok((status, Json(payment.into())))
}

/// GET /v1/payments/:payment_ref
async fn get_payment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(payment_ref): Path<String>,
) -> Result<Json<PaymentDetailResponse>, AppError> {
    let payment = state.payments.get_payment(&user, &payment_ref).await?;

    let history = state
        .payment_store
        .payment_history(payment.id)
        .await?
        .into_iter()
        .map(|entry| crate::bookings::HistoryResponse {
            status_change: entry.status_change,
            changed_by: entry.changed_by,
            change_reason: entry.change_reason,
            timestamp: entry.timestamp,
        })
        .collect();

    Ok(Json(PaymentDetailResponse {
        payment: payment.into(),
        history,
    }))
}

/// POST /v1/payments/:payment_ref/refund
async fn refund_payment(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(payment_ref): Path<String>,
    Json(req): Json<RefundRequest>,
) -> Result<Json<PaymentResponse>, AppError> {
    let reason = req.reason.unwrap_or_else(|| "requested by user".to_string());
    let payment = state.payments.refund(&user, &payment_ref, &reason).await?;
    state.metrics.refunds_processed.inc();

    // The cascade released the booking's seats; let stream watchers know.
    if let Some(booking) = state
        .booking_store
        .get_booking_by_id(payment.booking_id)
        .await?
    {
        let seat_ids: Vec<uuid::Uuid> = state
            .booking_store
            .booking_seats(booking.id)
            .await?
            .into_iter()
            .map(|seat| seat.seat_id)
            .collect();
        publish_seat_events(&state, booking.schedule_id, &seat_ids, None).await;
    }

    Ok(Json(payment.into()))
}
