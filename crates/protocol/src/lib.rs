//! Wire types for the UPOS upload endpoints and the member-site publish API.
//!
//! Everything here is plain data: request query/body shapes and response
//! payloads, plus the endpoint constants used as defaults by the client.

pub mod constants;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use messages::{
    ChunkQuery, CompleteUploadQuery, CompleteUploadRequest, CompleteUploadResponse,
    InitUploadQuery, InitUploadResponse, PartEntry, PreUploadQuery, PreUploadResponse,
};
pub use types::{
    CookieEntry, CookieFile, CoverUploadResponse, NavResponse, PublishRequest, PublishResponse,
    PublishSubtitle, PublishVideo, UposLocation,
};

/// Errors produced while interpreting wire data.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid upos uri: {0}")]
    InvalidUposUri(String),
}
