//! Perchance text-to-image integration.
pub mod client;
pub mod generator;
pub mod types;

pub use client::PerchanceClient;
pub use generator::{Generator, Upstream};
