//! UploadThing blob-store integration.
pub mod client;
pub mod token;

pub use client::UploadThingClient;
pub use token::UploadThingToken;
