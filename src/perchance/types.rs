//! Wire types for the Perchance image-generation API.
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const CHANNEL: &str = "ai-text-to-image-generator";
pub const SUB_CHANNEL: &str = "public";
pub const RESOLUTION: &str = "768x512";
pub const GUIDANCE_SCALE: u32 = 7;
/// Let the upstream pick a random seed.
pub const RANDOM_SEED: i64 = -1;

pub const STATUS_SUCCESS: &str = "success";
pub const STATUS_BUSY: &str = "waiting_for_prev_request_to_finish";

/// Body of `POST /api/generate`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateRequest {
    pub prompt: String,
    pub negative_prompt: String,
    pub seed: i64,
    pub resolution: String,
    pub guidance_scale: u32,
    pub channel: String,
    pub sub_channel: String,
    pub user_key: String,
    pub ad_access_code: String,
    pub request_id: String,
}

impl GenerateRequest {
    pub fn new(prompt: &str, user_key: &str) -> Self {
        GenerateRequest {
            prompt: prompt.to_string(),
            negative_prompt: String::new(),
            seed: RANDOM_SEED,
            resolution: RESOLUTION.to_string(),
            guidance_scale: GUIDANCE_SCALE,
            channel: CHANNEL.to_string(),
            sub_channel: SUB_CHANNEL.to_string(),
            user_key: user_key.to_string(),
            ad_access_code: String::new(),
            request_id: request_id(),
        }
    }
}

/// Time-derived id the upstream uses for deduplication and tracing only.
pub fn request_id() -> String {
    let now = Utc::now();
    format!("0.{}.{:06}", now.timestamp(), now.timestamp_subsec_micros())
}

/// Body returned by `POST /api/generate`. Every field is optional; the
/// upstream omits whatever does not apply to the status it reports.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub image_id: Option<String>,
    #[serde(default)]
    pub error: Option<Value>,
}

/// What a submit response means for the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Another request under the same identity is still running.
    Busy,
    Ready { image_id: String },
    Rejected(String),
}

impl SubmitResponse {
    pub fn outcome(self) -> SubmitOutcome {
        match self.status.as_deref() {
            Some(STATUS_BUSY) => SubmitOutcome::Busy,
            Some(STATUS_SUCCESS) => match self.image_id.filter(|id| !id.is_empty()) {
                Some(image_id) => SubmitOutcome::Ready { image_id },
                None => SubmitOutcome::Rejected("success response without imageId".to_string()),
            },
            other => {
                let message = match self.error {
                    Some(Value::String(s)) => s,
                    Some(Value::Null) | None => other.unwrap_or("Unknown error").to_string(),
                    Some(v) => v.to_string(),
                };
                SubmitOutcome::Rejected(message)
            }
        }
    }
}
