//! Staging and uploading of generated images.
mod publisher;

pub use publisher::{display_name, BlobStore, Publisher, UploadResult, IMAGE_CONTENT_TYPE};
