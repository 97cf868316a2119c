//! Chunk partitioning, part bookkeeping and progress reporting for
//! chunked uploads.
//!
//! Nothing in this crate touches the network: it turns a file into an
//! ordered stream of [`Chunk`]s, collects [`PartRecord`]s from concurrent
//! workers in a [`PartLedger`], and checks the resulting
//! [`FinalizeManifest`] before it is committed.

mod chunked;
mod ledger;
mod progress;
mod properties;
mod types;

pub use chunked::{ChunkSource, total_chunks};
pub use ledger::{FinalizeManifest, LedgerError, PartLedger, PartRecord};
pub use progress::{
    DEFAULT_WINDOW, LogObserver, NoopObserver, ProgressObserver, RetryEvent, RetryOperation,
    ThroughputWindow,
};
pub use types::{Chunk, SessionParams, UploadSession, UploadState};

/// Default chunk size: 4 MiB.
///
/// Only used when a caller builds a [`ChunkSource`] without a negotiated
/// session; the server-provided chunk size always wins.
pub const DEFAULT_CHUNK_SIZE: u64 = 4 * 1024 * 1024;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("source file is empty")]
    EmptyFile,

    #[error("invalid chunk size: {0}")]
    InvalidChunkSize(i64),

    #[error("{total_size} bytes in chunks of {chunk_size} exceeds the part limit")]
    TooManyChunks { total_size: u64, chunk_size: u64 },

    #[error("failed to read chunk {index} at offset {offset}: {source}")]
    ChunkRead {
        index: u32,
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("source ended early: chunk {index} expected {expected} bytes, got {got}")]
    UnexpectedEof {
        index: u32,
        expected: usize,
        got: usize,
    },

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}
