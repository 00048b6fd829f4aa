//! Generation workflow: submit, back off while the upstream is busy with a
//! previous request for the same identity, then download the finished image.
//!
//! The submit loop is an explicit state machine:
//!
//! ```text
//! Submitting(n) --busy, n < MAX--> Waiting(n) --backoff--> Submitting(n + 1)
//! Submitting(n) --busy, n = MAX--> Failed(RetriesExhausted)
//! Submitting(n) --success-------> Succeeded(image_id)
//! Submitting(n) --other---------> Failed(GenerationRejected)
//! ```
//!
//! Transport failures abort immediately and are never retried.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::credentials::{CredentialStore, Session};
use crate::error::{AppError, AppResult};
use crate::perchance::types::{GenerateRequest, SubmitOutcome, SubmitResponse};
use crate::utils::clock::Clock;

/// Submit attempts per generation, including the first.
pub const MAX_SUBMIT_ATTEMPTS: u32 = 3;
/// Delay before resubmitting after a busy response.
pub const BUSY_BACKOFF: Duration = Duration::from_secs(10);
/// Delay between a successful submit and the download.
pub const SETTLE_DELAY: Duration = Duration::from_secs(2);

/// The two upstream calls the workflow needs.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// Transport or non-2xx failures must come back as `UpstreamUnavailable`.
    async fn submit(&self, session: &Session, request: &GenerateRequest) -> AppResult<SubmitResponse>;

    /// Any failure must come back as `DownloadFailed`.
    async fn download(&self, session: &Session, image_id: &str) -> AppResult<Vec<u8>>;
}

#[derive(Debug)]
pub enum Step {
    Submitting { attempt: u32 },
    Waiting { attempt: u32 },
    Succeeded { image_id: String },
    Failed(AppError),
}

impl Step {
    /// Next state after the submit for `attempt` produced `outcome`.
    pub fn after_submit(attempt: u32, outcome: SubmitOutcome) -> Step {
        match outcome {
            SubmitOutcome::Busy if attempt >= MAX_SUBMIT_ATTEMPTS => {
                Step::Failed(AppError::RetriesExhausted { attempts: attempt })
            }
            SubmitOutcome::Busy => Step::Waiting { attempt },
            SubmitOutcome::Ready { image_id } => Step::Succeeded { image_id },
            SubmitOutcome::Rejected(message) => Step::Failed(AppError::GenerationRejected(message)),
        }
    }
}

#[derive(Clone)]
pub struct Generator {
    upstream: Arc<dyn Upstream>,
    clock: Arc<dyn Clock>,
}

impl Generator {
    pub fn new(upstream: Arc<dyn Upstream>, clock: Arc<dyn Clock>) -> Self {
        Generator { upstream, clock }
    }

    /// Generate an image for `prompt` with whatever session is current.
    ///
    /// The store is only read once, up front; no lock is held while talking
    /// to the upstream.
    pub async fn generate(&self, store: &CredentialStore, prompt: &str) -> AppResult<Vec<u8>> {
        let session = store.get().await.ok_or(AppError::NoCredentials)?;
        info!("Generating image for prompt '{}' using auth from {}", prompt, session.timestamp);
        self.generate_with(&session, prompt).await
    }

    pub async fn generate_with(&self, session: &Session, prompt: &str) -> AppResult<Vec<u8>> {
        let image_id = self.submit_until_ready(session, prompt).await?;
        info!("Image generated with ID: {}", image_id);

        self.clock.sleep(SETTLE_DELAY).await;
        let bytes = self.upstream.download(session, &image_id).await?;
        debug!("Downloaded image {} ({} bytes)", image_id, bytes.len());
        Ok(bytes)
    }

    async fn submit_until_ready(&self, session: &Session, prompt: &str) -> AppResult<String> {
        let request = GenerateRequest::new(prompt, &session.user_key);
        let mut step = Step::Submitting { attempt: 1 };
        loop {
            step = match step {
                Step::Submitting { attempt } => {
                    let response = self.upstream.submit(session, &request).await?;
                    Step::after_submit(attempt, response.outcome())
                }
                Step::Waiting { attempt } => {
                    info!(
                        "Waiting for previous request (attempt {}/{})...",
                        attempt, MAX_SUBMIT_ATTEMPTS
                    );
                    self.clock.sleep(BUSY_BACKOFF).await;
                    Step::Submitting { attempt: attempt + 1 }
                }
                Step::Succeeded { image_id } => return Ok(image_id),
                Step::Failed(e) => {
                    warn!("Generation failed: {}", e);
                    return Err(e);
                }
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::{Cookies, SessionUpdate};
    use crate::utils::clock::RecordingClock;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedUpstream {
        submits: Mutex<VecDeque<AppResult<SubmitResponse>>>,
        download: Mutex<Option<AppResult<Vec<u8>>>>,
        submit_calls: Mutex<u32>,
        downloaded: Mutex<Vec<String>>,
    }

    impl ScriptedUpstream {
        fn new(submits: Vec<AppResult<SubmitResponse>>, download: AppResult<Vec<u8>>) -> Arc<Self> {
            Arc::new(ScriptedUpstream {
                submits: Mutex::new(submits.into()),
                download: Mutex::new(Some(download)),
                submit_calls: Mutex::new(0),
                downloaded: Mutex::new(Vec::new()),
            })
        }

        fn submit_calls(&self) -> u32 {
            *self.submit_calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl Upstream for ScriptedUpstream {
        async fn submit(&self, _session: &Session, _request: &GenerateRequest) -> AppResult<SubmitResponse> {
            *self.submit_calls.lock().unwrap() += 1;
            self.submits
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(busy()))
        }

        async fn download(&self, _session: &Session, image_id: &str) -> AppResult<Vec<u8>> {
            self.downloaded.lock().unwrap().push(image_id.to_string());
            self.download
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(AppError::DownloadFailed("no script".into())))
        }
    }

    fn busy() -> SubmitResponse {
        serde_json::from_value(json!({"status": "waiting_for_prev_request_to_finish"})).unwrap()
    }

    fn success(id: &str) -> SubmitResponse {
        serde_json::from_value(json!({"status": "success", "imageId": id})).unwrap()
    }

    fn session() -> Session {
        Session {
            cookies: Cookies::from([("sid".to_string(), "1".to_string())]),
            user_key: "uk".into(),
            timestamp: "t".into(),
        }
    }

    fn generator(upstream: Arc<ScriptedUpstream>, clock: &RecordingClock) -> Generator {
        Generator::new(upstream, Arc::new(clock.clone()))
    }

    #[test]
    fn transitions_follow_the_retry_budget() {
        assert!(matches!(
            Step::after_submit(1, SubmitOutcome::Busy),
            Step::Waiting { attempt: 1 }
        ));
        assert!(matches!(
            Step::after_submit(2, SubmitOutcome::Busy),
            Step::Waiting { attempt: 2 }
        ));
        assert!(matches!(
            Step::after_submit(3, SubmitOutcome::Busy),
            Step::Failed(AppError::RetriesExhausted { attempts: 3 })
        ));
        assert!(matches!(
            Step::after_submit(3, SubmitOutcome::Ready { image_id: "x".into() }),
            Step::Succeeded { .. }
        ));
        assert!(matches!(
            Step::after_submit(1, SubmitOutcome::Rejected("bad".into())),
            Step::Failed(AppError::GenerationRejected(_))
        ));
    }

    #[tokio::test]
    async fn immediate_success_downloads_after_settle() {
        let upstream = ScriptedUpstream::new(vec![Ok(success("img-1"))], Ok(vec![1, 2, 3]));
        let clock = RecordingClock::new();
        let bytes = generator(upstream.clone(), &clock)
            .generate_with(&session(), "a cat")
            .await
            .unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert_eq!(upstream.submit_calls(), 1);
        assert_eq!(*upstream.downloaded.lock().unwrap(), vec!["img-1".to_string()]);
        assert_eq!(clock.sleeps(), vec![SETTLE_DELAY]);
    }

    #[tokio::test]
    async fn two_busy_responses_then_success() {
        let upstream = ScriptedUpstream::new(
            vec![Ok(busy()), Ok(busy()), Ok(success("img-2"))],
            Ok(vec![9]),
        );
        let clock = RecordingClock::new();
        let bytes = generator(upstream.clone(), &clock)
            .generate_with(&session(), "a cat")
            .await
            .unwrap();
        assert_eq!(bytes, vec![9]);
        assert_eq!(upstream.submit_calls(), 3);
        assert_eq!(clock.sleeps(), vec![BUSY_BACKOFF, BUSY_BACKOFF, SETTLE_DELAY]);
    }

    #[tokio::test]
    async fn always_busy_exhausts_after_three_attempts() {
        let upstream = ScriptedUpstream::new(vec![], Ok(vec![1]));
        let clock = RecordingClock::new();
        let err = generator(upstream.clone(), &clock)
            .generate_with(&session(), "a cat")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::RetriesExhausted { attempts: 3 }));
        assert_eq!(upstream.submit_calls(), 3);
        assert_eq!(clock.sleeps(), vec![BUSY_BACKOFF, BUSY_BACKOFF]);
        assert!(upstream.downloaded.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn transport_failure_is_not_retried() {
        let upstream = ScriptedUpstream::new(
            vec![Err(AppError::UpstreamUnavailable("status 502".into()))],
            Ok(vec![1]),
        );
        let clock = RecordingClock::new();
        let err = generator(upstream.clone(), &clock)
            .generate_with(&session(), "a cat")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::UpstreamUnavailable(_)));
        assert_eq!(upstream.submit_calls(), 1);
        assert!(clock.sleeps().is_empty());
    }

    #[tokio::test]
    async fn rejection_after_busy_stops_immediately() {
        let rejected: SubmitResponse =
            serde_json::from_value(json!({"status": "invalid_key", "error": "bad key"})).unwrap();
        let upstream = ScriptedUpstream::new(vec![Ok(busy()), Ok(rejected)], Ok(vec![1]));
        let clock = RecordingClock::new();
        let err = generator(upstream.clone(), &clock)
            .generate_with(&session(), "a cat")
            .await
            .unwrap_err();
        match err {
            AppError::GenerationRejected(msg) => assert_eq!(msg, "bad key"),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(upstream.submit_calls(), 2);
    }

    #[tokio::test]
    async fn download_failure_surfaces() {
        let upstream = ScriptedUpstream::new(
            vec![Ok(success("img-3"))],
            Err(AppError::DownloadFailed("status 404".into())),
        );
        let clock = RecordingClock::new();
        let err = generator(upstream, &clock)
            .generate_with(&session(), "a cat")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DownloadFailed(_)));
    }

    #[tokio::test]
    async fn unset_store_fails_before_any_call() {
        let upstream = ScriptedUpstream::new(vec![Ok(success("img"))], Ok(vec![1]));
        let clock = RecordingClock::new();
        let store = CredentialStore::new();
        let err = generator(upstream.clone(), &clock)
            .generate(&store, "a cat")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NoCredentials));
        assert_eq!(upstream.submit_calls(), 0);
    }

    #[tokio::test]
    async fn generate_reads_the_store() {
        let upstream = ScriptedUpstream::new(vec![Ok(success("img"))], Ok(vec![7]));
        let clock = RecordingClock::new();
        let store = CredentialStore::new();
        store
            .set(SessionUpdate {
                cookies: Cookies::from([("sid".to_string(), "1".to_string())]),
                user_key: "uk".into(),
                timestamp: None,
            })
            .await;
        let bytes = generator(upstream, &clock).generate(&store, "a cat").await.unwrap();
        assert_eq!(bytes, vec![7]);
    }
}
