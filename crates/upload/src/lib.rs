//! Chunked upload engine.
//!
//! Splits a file into server-sized chunks, sends them through a bounded
//! pool of workers with per-chunk retry, and commits the ordered part
//! manifest once every chunk is acknowledged.
//!
//! # Pipeline
//!
//! 1. **Negotiate**: pre-upload and multipart init yield an upload session
//! 2. **Transfer**: chunks are read sequentially and sent concurrently
//! 3. **Finalize**: the verified manifest commits the upload
//! 4. **Publish** (optional): cover upload and submission
//!
//! All network access goes through [`UposTransport`], so the engine runs
//! unchanged against [`HttpTransport`] or a test double.

pub mod credential;
pub mod error;
pub mod finalizer;
pub mod negotiator;
pub mod pipeline;
pub mod pool;
pub mod publish;
pub mod retry;
pub mod transport;
pub mod types;

#[cfg(test)]
mod mock;

pub use credential::Credential;
pub use error::UploadError;
pub use finalizer::SessionFinalizer;
pub use negotiator::SessionNegotiator;
pub use pipeline::UploadPipeline;
pub use pool::{DEFAULT_WORKERS, TransferPool};
pub use publish::{
    HttpPublisher, PublishFuture, Publisher, build_publish_request, cover_data_uri,
    detect_image_type, normalize_tags,
};
pub use retry::{DEFAULT_MAX_ATTEMPTS, RetryPolicy};
pub use transport::{
    ChunkReceipt, HttpTransport, TransportError, TransportFuture, UposTransport, chunk_query,
};
pub use types::{
    Endpoints, PublishReceipt, UploadCallback, UploadOutcome, UploadRequest, UploadResult,
    VideoMetadata,
};
