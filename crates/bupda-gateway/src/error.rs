use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use bupda_core::ServiceError;
use bupda_platform::ApiEnvelope;
use tracing::{error, warn};

#[derive(Debug)]
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self.0 {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ServiceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self.0 {
            ServiceError::Internal(detail) => error!("internal error: {detail}"),
            ServiceError::Upstream(message) | ServiceError::Unavailable(message) => {
                warn!("{}: {message}", self.0.kind())
            }
            _ => {}
        }

        let body: ApiEnvelope<()> =
            ApiEnvelope::failure(status.as_u16(), self.0.kind(), self.0.public_messages());
        (status, Json(body)).into_response()
    }
}
