use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use transix_core::UserId;

use crate::error::AppError;

/// Authenticated caller, as established by the upstream identity layer.
///
/// Authentication itself lives outside this service; the gateway in front of
/// it injects the opaque user id as the `X-User-Id` header. Requests without
/// it are rejected.
pub struct CurrentUser(pub UserId);

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = parts
            .headers
            .get("x-user-id")
            .and_then(|value| value.to_str().ok())
            .filter(|value| !value.is_empty())
            .ok_or_else(|| {
                AppError::AuthenticationError("Missing X-User-Id header".to_string())
            })?;

        Ok(CurrentUser(UserId::new(user)))
    }
}
