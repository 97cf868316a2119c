//! Upload error types.

use vidup_transfer::{LedgerError, TransferError};

use crate::transport::TransportError;

/// Errors produced by an upload run.
///
/// Every variant is fatal for the run it comes from. Retries happen only
/// inside chunk transfer and finalize, before one of these is produced.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("negotiation failed: {0}")]
    Negotiation(String),

    #[error("source file is empty")]
    EmptyFile,

    #[error("failed to read source: {0}")]
    ChunkRead(#[source] TransferError),

    #[error("chunk {index} failed after {attempts} attempts: {source}")]
    ChunkTransfer {
        index: u32,
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("ledger integrity check failed: {0}")]
    LedgerIntegrity(#[from] LedgerError),

    #[error("finalize failed after {attempts} attempts: {source}")]
    FinalizeExhausted {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("finalize rejected by server (OK={code})")]
    FinalizeRejected { code: i64 },

    #[error("credential error: {0}")]
    Credential(String),

    #[error("server rejected submission (code {code}): {message}")]
    Publish { code: i64, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("worker task failed: {0}")]
    Worker(String),

    #[error("cancelled")]
    Cancelled,
}

impl UploadError {
    /// Returns `true` for the finalize failure kinds.
    pub fn is_finalize(&self) -> bool {
        matches!(
            self,
            Self::FinalizeExhausted { .. } | Self::FinalizeRejected { .. }
        )
    }
}

impl From<TransferError> for UploadError {
    fn from(err: TransferError) -> Self {
        match err {
            TransferError::EmptyFile => Self::EmptyFile,
            TransferError::InvalidChunkSize(size) => {
                Self::Negotiation(format!("invalid chunk size {size}"))
            }
            TransferError::TooManyChunks { .. } => Self::Negotiation(err.to_string()),
            TransferError::Ledger(e) => Self::LedgerIntegrity(e),
            other => Self::ChunkRead(other),
        }
    }
}
