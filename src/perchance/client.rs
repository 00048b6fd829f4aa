//! Thin HTTP client for the Perchance image-generation endpoints.
//!
//! - `submit` posts a generation request to `/api/generate`.
//! - `download` fetches the finished image from `/api/downloadTemporaryImage`.
//!
//! Both calls authenticate with the stored user key and session cookies and
//! present browser-like headers, which the upstream requires.
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE, COOKIE, ORIGIN, REFERER, USER_AGENT};
use reqwest::Client;

use crate::credentials::Session;
use crate::error::{transport_summary, AppError, AppResult};
use crate::perchance::generator::Upstream;
use crate::perchance::types::{request_id, GenerateRequest, SubmitResponse};

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

#[derive(Clone)]
pub struct PerchanceClient {
    client: Client,
    base_url: String,
}

impl PerchanceClient {
    /// Every request made by this client is bounded by `timeout`.
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, reqwest::Error> {
        let base = base_url.trim_end_matches('/').to_string();
        let client = Client::builder().timeout(timeout).build()?;
        Ok(PerchanceClient { client, base_url: base })
    }

    fn headers(&self, session: &Session) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Ok(v) = HeaderValue::from_str(&format!("{}/embed", self.base_url)) {
            headers.insert(REFERER, v);
        }
        if let Ok(v) = HeaderValue::from_str(&self.base_url) {
            headers.insert(ORIGIN, v);
        }
        match HeaderValue::from_str(&session.cookie_header()) {
            Ok(v) => {
                headers.insert(COOKIE, v);
            }
            Err(_) => tracing::warn!("Session cookies contain characters not allowed in a header, sending none"),
        }
        headers
    }
}

#[async_trait]
impl Upstream for PerchanceClient {
    async fn submit(&self, session: &Session, request: &GenerateRequest) -> AppResult<SubmitResponse> {
        let url = format!("{}/api/generate", self.base_url);
        tracing::debug!(request_id = %request.request_id, "Submitting generation request to {}", url);

        let response = self
            .client
            .post(&url)
            .query(&[
                ("userKey", session.user_key.as_str()),
                ("requestId", request.request_id.as_str()),
                ("adAccessCode", ""),
                ("__cacheBust", request_id().as_str()),
            ])
            .headers(self.headers(session))
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(transport_summary("generate request", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error body".to_string());
            tracing::error!("Generate request failed. Status: {}, Body: {}", status, body);
            return Err(AppError::UpstreamUnavailable(format!("status {}", status)));
        }

        response
            .json::<SubmitResponse>()
            .await
            .map_err(|e| AppError::UpstreamUnavailable(transport_summary("generate response", e)))
    }

    async fn download(&self, session: &Session, image_id: &str) -> AppResult<Vec<u8>> {
        let url = format!("{}/api/downloadTemporaryImage", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("imageId", image_id)])
            .headers(self.headers(session))
            .send()
            .await
            .map_err(|e| AppError::DownloadFailed(transport_summary("download request", e)))?;

        if !response.status().is_success() {
            return Err(AppError::DownloadFailed(format!(
                "image {} returned status {}",
                image_id,
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::DownloadFailed(transport_summary("download body", e)))?;
        if bytes.is_empty() {
            return Err(AppError::DownloadFailed(format!("image {} is empty", image_id)));
        }
        Ok(bytes.to_vec())
    }
}
