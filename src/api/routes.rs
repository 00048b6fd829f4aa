//! Shared state and router assembly.
use std::any::Any;
use std::sync::Arc;

use axum::body::{Bytes, Full};
use axum::http::{header, HeaderValue, Response, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::api::handlers;
use crate::credentials::CredentialStore;
use crate::perchance::Generator;
use crate::publish::Publisher;

pub struct AppState {
    pub credentials: CredentialStore,
    pub generator: Generator,
    pub publisher: Publisher,
    pub uploadthing_configured: bool,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/webhook/cookies", post(handlers::receive_credentials))
        .route(
            "/api/webhook/cookie-token",
            get(handlers::receive_credentials).post(handlers::receive_credentials),
        )
        .route("/generate", post(handlers::generate))
        .route("/status", get(handlers::status))
        .route("/health", get(handlers::health))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// A panicking handler still answers with the usual `{"error": ...}` shape.
fn panic_response(err: Box<dyn Any + Send + 'static>) -> Response<Full<Bytes>> {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    tracing::error!("Handler panicked: {}", detail);

    let body = serde_json::json!({ "error": "Internal server error" }).to_string();
    let mut response = Response::new(Full::from(body));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
