//! Shared fakes and request helpers for the integration tests.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use perchance_relay::api::{router, AppState};
use perchance_relay::credentials::{CredentialStore, Session};
use perchance_relay::error::{AppError, AppResult};
use perchance_relay::perchance::types::{GenerateRequest, SubmitResponse};
use perchance_relay::perchance::{Generator, Upstream};
use perchance_relay::publish::{BlobStore, Publisher, UploadResult};
use perchance_relay::utils::clock::RecordingClock;

/// Upstream that replays a script of submit statuses.
#[derive(Default)]
pub struct FakeUpstream {
    statuses: Mutex<VecDeque<Value>>,
    pub submits: Mutex<Vec<String>>,
    pub downloads: Mutex<Vec<String>>,
    pub image: Vec<u8>,
}

impl FakeUpstream {
    pub fn with_statuses(statuses: Vec<Value>) -> Arc<Self> {
        Arc::new(FakeUpstream {
            statuses: Mutex::new(statuses.into()),
            image: vec![0xFF, 0xD8, 0xFF, 0xE0],
            ..Default::default()
        })
    }

    pub fn succeeding() -> Arc<Self> {
        Self::with_statuses(vec![json!({"status": "success", "imageId": "img-1"})])
    }

    pub fn calls(&self) -> usize {
        self.submits.lock().unwrap().len() + self.downloads.lock().unwrap().len()
    }
}

#[async_trait]
impl Upstream for FakeUpstream {
    async fn submit(&self, session: &Session, request: &GenerateRequest) -> AppResult<SubmitResponse> {
        self.submits.lock().unwrap().push(session.user_key.clone());
        assert_eq!(request.user_key, session.user_key);
        let next = self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| json!({"status": "waiting_for_prev_request_to_finish"}));
        Ok(serde_json::from_value(next).unwrap())
    }

    async fn download(&self, _session: &Session, image_id: &str) -> AppResult<Vec<u8>> {
        self.downloads.lock().unwrap().push(image_id.to_string());
        Ok(self.image.clone())
    }
}

/// Blob store that can be told to fail; records the staged paths it saw.
#[derive(Default)]
pub struct FakeBlobStore {
    pub fail: bool,
    pub staged: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl BlobStore for FakeBlobStore {
    async fn upload(&self, file: &Path, name: &str, _content_type: &str) -> AppResult<UploadResult> {
        assert!(file.exists(), "staged file must exist during upload");
        self.staged.lock().unwrap().push(file.to_path_buf());
        if self.fail {
            return Err(AppError::PublishFailed("blob store said no".into()));
        }
        let size = std::fs::metadata(file).map(|m| m.len()).unwrap_or(0);
        Ok(UploadResult {
            url: format!("https://cdn.test/f/{}", name),
            key: "file-key-1".into(),
            size,
            name: name.to_string(),
        })
    }
}

pub struct Harness {
    pub app: Router,
    pub state: Arc<AppState>,
    pub upstream: Arc<FakeUpstream>,
    pub blobs: Arc<FakeBlobStore>,
    pub clock: RecordingClock,
    pub staging: tempfile::TempDir,
}

impl Harness {
    pub fn new(upstream: Arc<FakeUpstream>, blobs: Arc<FakeBlobStore>) -> Self {
        let staging = tempfile::TempDir::new().unwrap();
        let clock = RecordingClock::new();
        let state = Arc::new(AppState {
            credentials: CredentialStore::new(),
            generator: Generator::new(upstream.clone(), Arc::new(clock.clone())),
            publisher: Publisher::new(blobs.clone(), staging.path().to_path_buf()),
            uploadthing_configured: true,
        });
        Harness {
            app: router(state.clone()),
            state,
            upstream,
            blobs,
            clock,
            staging,
        }
    }

    pub fn standard() -> Self {
        Self::new(FakeUpstream::succeeding(), Arc::new(FakeBlobStore::default()))
    }

    pub async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = hyper::body::to_bytes(response.into_body()).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    pub async fn push_credentials(&self, user_key: &str) -> (StatusCode, Value) {
        self.send(
            "POST",
            "/webhook/cookies",
            Some(json!({"cookies": {"sid": "abc"}, "userKey": user_key})),
        )
        .await
    }

    pub fn staging_is_empty(&self) -> bool {
        std::fs::read_dir(self.staging.path()).unwrap().next().is_none()
    }
}
