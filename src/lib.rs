//! Perchance relay library
//!
//! Modules:
//! - `api`: Axum HTTP handlers and router setup used by the binary.
//! - `credentials`: In-memory holder for the webhook-supplied session.
//! - `perchance`: Client and retrying workflow for the generation API.
//! - `publish`: Temp-file staging and the blob-store seam.
//! - `uploadthing`: UploadThing blob-store client.
//! - `utils`: Clock abstraction used by the retry policy.
//! - `config`: Env-driven configuration loader.
//! - `error`: Common error type and alias.
pub mod api;
pub mod config;
pub mod credentials;
pub mod error;
pub mod perchance;
pub mod publish;
pub mod uploadthing;
pub mod utils;

pub use config::Config;
pub use credentials::CredentialStore;
pub use error::{AppError, AppResult};
pub use perchance::{Generator, PerchanceClient};
pub use publish::Publisher;
pub use uploadthing::UploadThingClient;

use std::sync::Arc;

use api::AppState;
use utils::clock::TokioClock;

/// Wire the production clients into application state.
pub fn build_state(config: &Config) -> Result<Arc<AppState>, reqwest::Error> {
    let perchance = PerchanceClient::new(config.perchance_url.clone(), config.http_timeout)?;
    let uploadthing = UploadThingClient::new(
        config.uploadthing_api_url.clone(),
        &config.uploadthing_token,
        config.http_timeout,
    )?;

    Ok(Arc::new(AppState {
        credentials: CredentialStore::new(),
        generator: Generator::new(Arc::new(perchance), Arc::new(TokioClock)),
        publisher: Publisher::new(Arc::new(uploadthing), config.staging_dir.clone()),
        uploadthing_configured: config.uploadthing_configured(),
    }))
}
