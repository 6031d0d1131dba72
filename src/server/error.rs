use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::error;

use crate::kv::StoreError;

/// Errors returned by the HTTP handlers
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing page identifier")]
    MissingPageId,
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::MissingPageId => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "message": self.to_string() })),
            )
                .into_response(),
            ApiError::Store(e) => {
                error!(error = %e, "counter store failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "message": format!("Cannot process the request: {}", e) })),
                )
                    .into_response()
            }
        }
    }
}
