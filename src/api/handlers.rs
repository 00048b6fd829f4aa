//! Axum request handlers for the HTTP API.
use std::sync::Arc;

use axum::extract::State;
use axum::http::Method;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::api::routes::AppState;
use crate::credentials::{now_iso8601, SessionUpdate, UpdateOutcome};
use crate::error::{AppError, AppResult};

pub async fn root() -> &'static str {
    "Perchance Relay"
}

/// Webhook receiving fresh cookies and user key. Accepts the credential
/// fields directly or wrapped under `data`.
pub async fn receive_credentials(
    State(state): State<Arc<AppState>>,
    method: Method,
    body: Option<Json<Value>>,
) -> AppResult<Json<Value>> {
    let Json(body) = body.ok_or_else(|| AppError::InvalidRequest("No data provided".into()))?;
    tracing::debug!(%method, wrapped = body.get("data").is_some(), "Webhook received");

    let update = SessionUpdate::from_webhook(&body)?;
    let (outcome, timestamp) = state.credentials.set(update).await;

    let message = match outcome {
        UpdateOutcome::Updated => {
            tracing::info!("Updated auth data at {}", timestamp);
            "Authentication data updated successfully"
        }
        UpdateOutcome::Unchanged => {
            tracing::info!("Auth data unchanged, skipping update");
            "Authentication data is already up to date"
        }
    };

    Ok(Json(json!({
        "status": outcome.as_str(),
        "message": message,
        "timestamp": timestamp,
    })))
}

#[derive(Debug, Deserialize)]
pub struct GenerateBody {
    #[serde(default)]
    pub prompt: Option<String>,
}

/// Generate an image for `prompt` and publish it.
pub async fn generate(
    State(state): State<Arc<AppState>>,
    body: Option<Json<GenerateBody>>,
) -> AppResult<Json<Value>> {
    let prompt = body
        .and_then(|Json(b)| b.prompt)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| AppError::InvalidRequest("Prompt is required".into()))?;

    let image = state.generator.generate(&state.credentials, &prompt).await?;
    let uploaded = state.publisher.publish(image, &prompt).await?;
    tracing::info!("Image uploaded successfully: {}", uploaded.url);

    Ok(Json(json!({
        "success": true,
        "prompt": prompt,
        "image_url": uploaded.url,
        "file_key": uploaded.key,
        "size": uploaded.size,
        "generated_at": now_iso8601(),
    })))
}

pub async fn status(State(state): State<Arc<AppState>>) -> Json<Value> {
    let session = state.credentials.get().await;
    Json(json!({
        "status": "online",
        "auth_available": session.is_some(),
        "auth_timestamp": session.map(|s| s.timestamp),
        "uploadthing_configured": state.uploadthing_configured,
    }))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}
