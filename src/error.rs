//! Common error type and alias.
//!
//! Every failure the relay can report maps onto one `AppError` variant. The
//! axum `IntoResponse` impl turns it into a `{"error": ...}` body with a 400
//! for caller mistakes and a 500 for everything upstream of the handler.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("No authentication data available. Please send cookies via webhook first.")]
    NoCredentials,

    #[error("Image generation service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Image generation rejected: {0}")]
    GenerationRejected(String),

    #[error("Image generation still busy after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    #[error("Failed to download generated image: {0}")]
    DownloadFailed(String),

    #[error("Failed to upload image: {0}")]
    PublishFailed(String),

    #[error("{0}")]
    InvalidRequest(String),
}

pub type AppResult<T> = Result<T, AppError>;

/// Caller-facing summary of a reqwest failure. The full error is logged with
/// its URL stripped; request URLs carry the user key in their query.
pub fn transport_summary(context: &str, e: reqwest::Error) -> String {
    let summary = if e.is_timeout() {
        "timed out"
    } else if e.is_connect() {
        "connection failed"
    } else if e.is_decode() {
        "unreadable response"
    } else {
        "request failed"
    };
    tracing::error!("{} {}: {}", context, summary, e.without_url());
    format!("{} {}", context, summary)
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::InvalidRequest(_) | AppError::NoCredentials => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        } else {
            tracing::warn!(error = %self, "rejected request");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
