use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::AppError;

/// Errors answer `{"error": "<message>"}` with the matching status.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({ "error": self.public_message() });
        (status, Json(body)).into_response()
    }
}
