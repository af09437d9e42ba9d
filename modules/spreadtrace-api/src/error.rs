use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde_json::json;
use spreadtrace_common::TraceError;
use tracing::warn;

/// Handler error. Maps the shared error taxonomy onto HTTP status codes.
#[derive(Debug)]
pub struct ApiError(pub TraceError);

impl From<TraceError> for ApiError {
    fn from(err: TraceError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            TraceError::Validation(_) => StatusCode::BAD_REQUEST,
            TraceError::NotFound(_) => StatusCode::NOT_FOUND,
            TraceError::Query(e) if e.is_timeout() => StatusCode::GATEWAY_TIMEOUT,
            TraceError::Query(_)
            | TraceError::ConnectionInit { .. }
            | TraceError::Config(_)
            | TraceError::Attribution(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self.0 {
            TraceError::Query(e) => json!(e),
            other => json!({ "error": other.to_string() }),
        };
        if status.is_server_error() {
            warn!(status = status.as_u16(), error = %self.0, "Request failed");
        }
        (status, Json(body)).into_response()
    }
}
