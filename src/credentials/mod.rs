//! Session credentials pushed in by the webhook.
mod store;

pub use store::{now_iso8601, Cookies, CredentialStore, Session, SessionUpdate, UpdateOutcome};
