use axum::{extract::FromRequestParts, http::request::Parts};
use bupda_core::ServiceError;
use bupda_paylater::RequestContext;
use tracing::warn;
use uuid::Uuid;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Authenticated caller. The auth proxy in front of the gateway puts the
/// user id in `x-user-id`; requests without it never reach a handler.
#[derive(Debug, Clone)]
pub struct Caller(pub RequestContext);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let request_id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| Uuid::parse_str(value.trim()).ok());

        match user_id {
            Some(user_id) => Ok(Caller(RequestContext::new(request_id, user_id))),
            None => {
                warn!(request_id = %request_id, uri = %parts.uri, "request without valid caller");
                Err(ApiError(ServiceError::Unauthorized(
                    "missing or invalid x-user-id".to_string(),
                )))
            }
        }
    }
}
