use std::fmt;

use bytes::Bytes;

use crate::TransferError;
use crate::chunked::total_chunks;

/// A contiguous byte range of the source file, owned by the worker that
/// uploads it.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// 0-based position in the file, contiguous across the upload.
    pub index: u32,
    /// Byte offset of the first byte within the file.
    pub offset: u64,
    /// Number of bytes in `payload`.
    pub length: usize,
    /// Raw chunk data.
    pub payload: Bytes,
}

impl Chunk {
    /// 1-based part number the server knows this chunk by.
    pub fn part_number(&self) -> u32 {
        self.index + 1
    }

    /// Exclusive end offset.
    pub fn end(&self) -> u64 {
        self.offset + self.length as u64
    }
}

/// Inputs for [`UploadSession::new`], as returned by session negotiation.
#[derive(Debug, Clone)]
pub struct SessionParams {
    pub file_name: String,
    pub profile: String,
    pub target_base_url: String,
    pub remote_file_name: String,
    pub auth_token: String,
    pub session_id: String,
    pub chunk_size: i64,
    pub total_size: u64,
    pub biz_id: i64,
}

/// A negotiated upload session.
///
/// Immutable once built and shared read-only by every worker. The chunk
/// count is derived once here and is the reference the finalize manifest
/// is checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    file_name: String,
    profile: String,
    target_base_url: String,
    remote_file_name: String,
    auth_token: String,
    session_id: String,
    chunk_size: u64,
    total_size: u64,
    biz_id: i64,
    total_chunks: u32,
}

impl UploadSession {
    /// Validates `params` and derives the chunk count.
    pub fn new(params: SessionParams) -> Result<Self, TransferError> {
        if params.total_size == 0 {
            return Err(TransferError::EmptyFile);
        }
        if params.chunk_size <= 0 {
            return Err(TransferError::InvalidChunkSize(params.chunk_size));
        }
        let chunk_size = params.chunk_size as u64;
        let total_chunks = total_chunks(params.total_size, chunk_size)?;

        Ok(Self {
            file_name: params.file_name,
            profile: params.profile,
            target_base_url: params.target_base_url,
            remote_file_name: params.remote_file_name,
            auth_token: params.auth_token,
            session_id: params.session_id,
            chunk_size,
            total_size: params.total_size,
            biz_id: params.biz_id,
            total_chunks,
        })
    }

    /// Local file name the session was negotiated for.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Upload profile (e.g. `ugcupos/bup`).
    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// URL chunk PUTs and the finalize POST are sent to.
    pub fn target_base_url(&self) -> &str {
        &self.target_base_url
    }

    /// Server-side file name used by the publish call.
    pub fn remote_file_name(&self) -> &str {
        &self.remote_file_name
    }

    /// Value of the `X-Upos-Auth` header.
    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    /// Multipart upload id.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    pub fn biz_id(&self) -> i64 {
        self.biz_id
    }

    /// `ceil(total_size / chunk_size)`.
    pub fn total_chunks(&self) -> u32 {
        self.total_chunks
    }
}

/// Upload lifecycle.
///
/// `Negotiating → Transferring → Finalizing → Committed → Published`, with
/// `Failed` reachable from every non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UploadState {
    Negotiating,
    Transferring,
    Finalizing,
    Committed,
    Published,
    Failed,
}

impl UploadState {
    /// Returns `true` once no further transition is possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Published | Self::Failed)
    }

    /// Returns `true` if `next` is a legal successor of `self`.
    ///
    /// `Committed` is terminal for upload-only runs; it may still advance
    /// to `Published` (or `Failed` if the publish call fails).
    pub fn can_transition_to(self, next: UploadState) -> bool {
        use UploadState::*;
        match (self, next) {
            (Negotiating, Transferring) => true,
            (Transferring, Finalizing) => true,
            (Finalizing, Committed) => true,
            (Committed, Published) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Negotiating => "negotiating",
            Self::Transferring => "transferring",
            Self::Finalizing => "finalizing",
            Self::Committed => "committed",
            Self::Published => "published",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(total_size: u64, chunk_size: i64) -> SessionParams {
        SessionParams {
            file_name: "clip.mp4".into(),
            profile: "ugcupos/bup".into(),
            target_base_url: "https://upos.example.com/ugcboss/n1.mp4".into(),
            remote_file_name: "n1".into(),
            auth_token: "auth".into(),
            session_id: "upload-1".into(),
            chunk_size,
            total_size,
            biz_id: 7,
        }
    }

    #[test]
    fn session_derives_chunk_count() {
        let s = UploadSession::new(params(10_485_760, 4_194_304)).unwrap();
        assert_eq!(s.total_chunks(), 3);
        assert_eq!(s.chunk_size(), 4_194_304);
        assert_eq!(s.session_id(), "upload-1");
    }

    #[test]
    fn session_exact_multiple() {
        let s = UploadSession::new(params(8, 4)).unwrap();
        assert_eq!(s.total_chunks(), 2);
    }

    #[test]
    fn session_rejects_zero_chunk_size() {
        let err = UploadSession::new(params(10, 0)).unwrap_err();
        assert!(matches!(err, TransferError::InvalidChunkSize(0)));
    }

    #[test]
    fn session_rejects_negative_chunk_size() {
        let err = UploadSession::new(params(10, -1)).unwrap_err();
        assert!(matches!(err, TransferError::InvalidChunkSize(-1)));
    }

    #[test]
    fn session_rejects_empty_file() {
        let err = UploadSession::new(params(0, 4)).unwrap_err();
        assert!(matches!(err, TransferError::EmptyFile));
    }

    #[test]
    fn chunk_part_number_and_end() {
        let c = Chunk {
            index: 2,
            offset: 8,
            length: 2,
            payload: Bytes::from_static(b"EE"),
        };
        assert_eq!(c.part_number(), 3);
        assert_eq!(c.end(), 10);
    }

    #[test]
    fn state_machine_forward_path() {
        use UploadState::*;
        assert!(Negotiating.can_transition_to(Transferring));
        assert!(Transferring.can_transition_to(Finalizing));
        assert!(Finalizing.can_transition_to(Committed));
        assert!(Committed.can_transition_to(Published));
    }

    #[test]
    fn state_machine_rejects_skips_and_terminal_exits() {
        use UploadState::*;
        assert!(!Negotiating.can_transition_to(Finalizing));
        assert!(!Transferring.can_transition_to(Committed));
        assert!(!Failed.can_transition_to(Negotiating));
        assert!(!Failed.can_transition_to(Failed));
        assert!(!Published.can_transition_to(Failed));
    }

    #[test]
    fn failed_reachable_from_non_terminal() {
        use UploadState::*;
        for s in [Negotiating, Transferring, Finalizing, Committed] {
            assert!(s.can_transition_to(Failed), "{s} -> failed");
        }
    }
}
