//! Decoding of the `UPLOADTHING_TOKEN` value.
//!
//! The token is base64-encoded JSON: `{"apiKey": ..., "appId": ..., "regions": [...]}`.
use base64::engine::general_purpose::{STANDARD, STANDARD_NO_PAD};
use base64::Engine;
use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadThingToken {
    pub api_key: String,
    pub app_id: String,
    #[serde(default)]
    pub regions: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("token is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("token has an empty apiKey")]
    EmptyApiKey,
}

impl UploadThingToken {
    pub fn decode(raw: &str) -> Result<Self, TokenError> {
        let raw = raw.trim();
        let bytes = match STANDARD.decode(raw) {
            Ok(bytes) => bytes,
            Err(_) => STANDARD_NO_PAD.decode(raw.trim_end_matches('='))?,
        };
        let token: UploadThingToken = serde_json::from_slice(&bytes)?;
        if token.api_key.is_empty() {
            return Err(TokenError::EmptyApiKey);
        }
        Ok(token)
    }
}
