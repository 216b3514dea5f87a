//! Maps the shared error taxonomy onto the HTTP/JSON envelope.

use std::time::Duration;

use axum::{Json, response::IntoResponse};
use http::StatusCode;

use moltis_common::Error;
use moltis_protocol::{ErrorBody, ResponseEnvelope};

/// Newtype so the gateway can impl `IntoResponse` for a foreign error type.
#[derive(Debug, Clone)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = StatusCode::from_u16(self.0.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut body = ErrorBody::new(self.0.code.clone(), self.0.message.clone());
        body.details = self.0.details.clone();
        let envelope = ResponseEnvelope::err(body, Duration::ZERO);
        (status, Json(envelope)).into_response()
    }
}
