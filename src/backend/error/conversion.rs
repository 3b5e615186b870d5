/**
 * Error Conversion
 *
 * `BackendError` implements Axum's `IntoResponse`, so handlers return it
 * directly. Responses are JSON:
 *
 * ```json
 * {
 *   "error": "rate limit exceeded, slow down",
 *   "status": 429
 * }
 * ```
 */
use crate::backend::error::types::BackendError;
use axum::response::{IntoResponse, Response};
use axum::Json;

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("[HTTP] {} ({})", self, status);
        }

        let body = serde_json::json!({
            "error": self.message(),
            "status": status.as_u16(),
        });
        (status, Json(body)).into_response()
    }
}
