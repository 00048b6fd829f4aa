//! Thin HTTP client for the UploadThing REST API.
//!
//! An upload is two calls:
//! - `POST /v7/prepareUpload` registers the file and returns a presigned
//!   ingest URL plus the file key.
//! - `PUT <ingest url>` sends the file as multipart form data.
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{transport_summary, AppError, AppResult};
use crate::publish::{BlobStore, UploadResult};
use crate::uploadthing::token::UploadThingToken;

const API_KEY_HEADER: &str = "x-uploadthing-api-key";
const VERSION_HEADER: &str = "x-uploadthing-version";
const SDK_VERSION: &str = "7.7.2";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrepareUploadRequest<'a> {
    file_name: &'a str,
    file_size: u64,
    file_type: &'a str,
    acl: &'a str,
    content_disposition: &'a str,
}

#[derive(Debug, Deserialize)]
struct PrepareUploadResponse {
    key: String,
    url: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IngestResponse {
    #[serde(default)]
    ufs_url: Option<String>,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Clone)]
pub struct UploadThingClient {
    client: Client,
    api_url: String,
    token: Option<UploadThingToken>,
}

impl UploadThingClient {
    /// An empty or undecodable token still yields a client; its uploads fail
    /// with `PublishFailed`.
    pub fn new(api_url: String, raw_token: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let token = if raw_token.trim().is_empty() {
            None
        } else {
            match UploadThingToken::decode(raw_token) {
                Ok(token) => Some(token),
                Err(e) => {
                    tracing::error!("UPLOADTHING_TOKEN is set but unusable: {}", e);
                    None
                }
            }
        };
        let client = Client::builder().timeout(timeout).build()?;
        Ok(UploadThingClient {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    async fn prepare(&self, token: &UploadThingToken, name: &str, size: u64, content_type: &str) -> AppResult<PrepareUploadResponse> {
        let url = format!("{}/v7/prepareUpload", self.api_url);
        let body = PrepareUploadRequest {
            file_name: name,
            file_size: size,
            file_type: content_type,
            acl: "public-read",
            content_disposition: "inline",
        };
        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &token.api_key)
            .header(VERSION_HEADER, SDK_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::PublishFailed(transport_summary("prepareUpload request", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("prepareUpload failed. Status: {}, Body: {}", status, body);
            return Err(AppError::PublishFailed(format!("prepareUpload returned {}", status)));
        }
        response
            .json()
            .await
            .map_err(|e| AppError::PublishFailed(transport_summary("prepareUpload response", e)))
    }
}

#[async_trait]
impl BlobStore for UploadThingClient {
    async fn upload(&self, file: &Path, name: &str, content_type: &str) -> AppResult<UploadResult> {
        let token = self
            .token
            .as_ref()
            .ok_or_else(|| AppError::PublishFailed("UploadThing token not configured".into()))?;

        let data = tokio::fs::read(file)
            .await
            .map_err(|e| AppError::PublishFailed(format!("could not read staged file: {}", e)))?;
        let size = data.len() as u64;

        let prepared = self.prepare(token, name, size, content_type).await?;
        tracing::debug!("UploadThing assigned key {}", prepared.key);

        let part = Part::bytes(data)
            .file_name(name.to_string())
            .mime_str(content_type)
            .map_err(|e| AppError::PublishFailed(e.to_string()))?;
        let response = self
            .client
            .put(&prepared.url)
            .header(API_KEY_HEADER, &token.api_key)
            .multipart(Form::new().part("file", part))
            .send()
            .await
            .map_err(|e| AppError::PublishFailed(transport_summary("ingest request", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Ingest failed. Status: {}, Body: {}", status, body);
            return Err(AppError::PublishFailed(format!("ingest returned {}", status)));
        }

        let ingest: IngestResponse = response.json().await.unwrap_or_default();
        let url = ingest
            .ufs_url
            .or(ingest.url)
            .unwrap_or_else(|| format!("https://{}.ufs.sh/f/{}", token.app_id, prepared.key));

        Ok(UploadResult {
            url,
            key: prepared.key,
            size,
            name: name.to_string(),
        })
    }
}
