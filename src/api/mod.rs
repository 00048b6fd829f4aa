//! HTTP surface: webhook, generation, status and health endpoints.
pub mod handlers;
pub mod routes;

pub use routes::{router, AppState};
