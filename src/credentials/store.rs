//! Process-wide holder for the latest Perchance session.
//!
//! Only the most recent session survives. `set` is a compare-and-replace
//! under a single write lock, so readers never see a half-applied update and
//! two webhook calls cannot interleave.
use std::collections::BTreeMap;

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};

pub type Cookies = BTreeMap<String, String>;

/// A usable session: cookies and user key are always present together.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub cookies: Cookies,
    pub user_key: String,
    pub timestamp: String,
}

impl Session {
    /// Render the cookies as a single `Cookie` request header value.
    pub fn cookie_header(&self) -> String {
        self.cookies
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Credentials as delivered by the webhook, before they are stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionUpdate {
    pub cookies: Cookies,
    pub user_key: String,
    pub timestamp: Option<String>,
}

impl SessionUpdate {
    /// Parse a webhook body. Accepts the fields directly or wrapped one level
    /// under `data`.
    pub fn from_webhook(body: &Value) -> AppResult<Self> {
        let fields = match body.get("data") {
            Some(inner) if inner.is_object() => inner,
            _ => body,
        };

        let missing = || AppError::InvalidRequest("Missing cookies or userKey in webhook data".into());

        let cookies = match fields.get("cookies") {
            Some(Value::Object(map)) if !map.is_empty() => {
                let mut cookies = Cookies::new();
                for (name, value) in map {
                    let value = value.as_str().ok_or_else(|| {
                        AppError::InvalidRequest(format!("Cookie '{}' must be a string", name))
                    })?;
                    cookies.insert(name.clone(), value.to_string());
                }
                cookies
            }
            _ => return Err(missing()),
        };

        let user_key = fields
            .get("userKey")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(missing)?
            .to_string();

        let timestamp = fields
            .get("timestamp")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from);

        Ok(SessionUpdate { cookies, user_key, timestamp })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    Unchanged,
}

impl UpdateOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateOutcome::Updated => "updated",
            UpdateOutcome::Unchanged => "unchanged",
        }
    }
}

#[derive(Debug, Default)]
pub struct CredentialStore {
    current: RwLock<Option<Session>>,
}

impl CredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current session, if any.
    pub async fn get(&self) -> Option<Session> {
        self.current.read().await.clone()
    }

    /// Replace the session if cookies or user key changed.
    ///
    /// Returns the outcome and the timestamp now stored. An unchanged update
    /// keeps the previous timestamp even if the caller supplied a new one.
    pub async fn set(&self, update: SessionUpdate) -> (UpdateOutcome, String) {
        let mut current = self.current.write().await;

        if let Some(existing) = current.as_ref() {
            if existing.cookies == update.cookies && existing.user_key == update.user_key {
                return (UpdateOutcome::Unchanged, existing.timestamp.clone());
            }
        }

        let timestamp = update.timestamp.unwrap_or_else(now_iso8601);
        *current = Some(Session {
            cookies: update.cookies,
            user_key: update.user_key,
            timestamp: timestamp.clone(),
        });
        (UpdateOutcome::Updated, timestamp)
    }
}

pub fn now_iso8601() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}
