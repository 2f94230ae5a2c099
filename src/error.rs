use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

// ── Request pipeline errors ──────────────────────────────────────────────────

/// Every failure a `/calculate` request can end in. The `Display` text is
/// what the caller sees under `"error"`.
#[derive(Debug, thiserror::Error)]
pub enum CalculateError {
    #[error("Invalid request body: {0}")]
    InvalidBody(String),
    #[error("Request body has no 'image' field")]
    MissingImage,
    #[error("Malformed image payload: expected '<media-type>,<base64 data>'")]
    MalformedPayload,
    #[error("Invalid base64 image data: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("Unsupported or corrupt image: {0}")]
    UnsupportedImageFormat(String),
    #[error("Failed to encode image for upload: {0}")]
    Encode(String),
    #[error("{0}")]
    Upstream(String),
}

impl IntoResponse for CalculateError {
    fn into_response(self) -> Response {
        tracing::warn!(error = %self, "calculate request failed");
        (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": self.to_string()})),
        )
            .into_response()
    }
}

// ── Startup configuration errors ─────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got {value:?}")]
    NotPositiveInteger { var: &'static str, value: String },
    #[error("{var} is not a valid socket address: {value:?}")]
    InvalidAddr { var: &'static str, value: String },
    #[error("{var} contains an invalid origin: {value:?}")]
    InvalidOrigin { var: &'static str, value: String },
}
