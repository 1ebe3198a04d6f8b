use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use transix_core::CoreError;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    ValidationError(String),
    NotFoundError(String),
    ConflictError(String),
    BadGateway(String),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::ConflictError(msg) => (StatusCode::CONFLICT, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        let msg = err.to_string();
        match err {
            CoreError::ScheduleNotFound(_)
            | CoreError::BookingNotFound(_)
            | CoreError::PaymentNotFound(_)
            | CoreError::SeatNotFound(_) => AppError::NotFoundError(msg),
            CoreError::SeatUnavailable { .. }
            | CoreError::InvalidStateTransition { .. }
            | CoreError::RefundNotAllowed(_) => AppError::ConflictError(msg),
            CoreError::ScheduleNotBookable(_)
            | CoreError::SeatVehicleMismatch { .. }
            | CoreError::PassengerCountMismatch { .. }
            | CoreError::EmptySeatSelection
            | CoreError::PaymentMethodRequired
            | CoreError::AmountInvalid(_)
            | CoreError::AmountNormalization(_) => AppError::ValidationError(msg),
            CoreError::GatewayError(_) => AppError::BadGateway(msg),
            CoreError::Storage(_) => AppError::InternalServerError(msg),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}
