//! Configuration and result types shared across the upload flow.

use std::path::PathBuf;

use vidup_protocol::constants::{
    COVER_UPLOAD_URL, DEFAULT_UPLOAD_SCHEME, MEMBER_ORIGIN, NAV_URL, PREUPLOAD_URL, PUBLISH_URL,
    UPLOAD_PROFILE,
};

/// Remote endpoints. Defaults point at the production service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub preupload_url: String,
    pub nav_url: String,
    pub cover_upload_url: String,
    pub publish_url: String,
    /// Member-site origin sent as `Origin`/`Referer` on finalize.
    pub member_origin: String,
    /// Scheme prefixed to the scheme-relative upload endpoint.
    pub upload_scheme: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            preupload_url: PREUPLOAD_URL.into(),
            nav_url: NAV_URL.into(),
            cover_upload_url: COVER_UPLOAD_URL.into(),
            publish_url: PUBLISH_URL.into(),
            member_origin: MEMBER_ORIGIN.into(),
            upload_scheme: DEFAULT_UPLOAD_SCHEME.into(),
        }
    }
}

/// Submission metadata for the publish step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: String,
    pub desc: String,
    /// 1 = original, 2 = repost.
    pub copyright: i64,
    /// Category (partition) id.
    pub tid: i64,
    /// Comma-separated tags.
    pub tag: String,
    /// Source URL, required for reposts.
    pub source: String,
    /// Local path or `http(s)` URL of the cover image. Empty for none.
    pub cover: String,
}

impl Default for VideoMetadata {
    fn default() -> Self {
        Self {
            title: String::new(),
            desc: String::new(),
            copyright: 1,
            tid: 0,
            tag: String::new(),
            source: String::new(),
            cover: String::new(),
        }
    }
}

/// One upload run.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub path: PathBuf,
    /// Upload profile, `ugcupos/bup` for regular videos.
    pub profile: String,
    /// Publish after commit. `None` stops at `Committed`.
    pub metadata: Option<VideoMetadata>,
}

impl UploadRequest {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            profile: UPLOAD_PROFILE.into(),
            metadata: None,
        }
    }

    pub fn with_metadata(mut self, metadata: VideoMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Name reported to the server: the final path component.
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// What a successful run produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOutcome {
    pub session_id: String,
    pub remote_file_name: String,
    pub biz_id: i64,
    pub total_size: u64,
    pub parts: u32,
    /// Set when the run included a publish step.
    pub publish: Option<PublishReceipt>,
}

/// Server reply to an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReceipt {
    pub code: i64,
    pub message: String,
    pub ttl: i64,
    pub data: serde_json::Value,
}

/// Final report handed to the result callback, exactly once per run.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadResult {
    pub success: bool,
    pub message: String,
    pub video_size: u64,
    pub video_title: String,
    /// Unix seconds at which the run started.
    pub upload_time: i64,
    /// Publish response code, 0 when not applicable.
    pub code: i64,
    /// Rendered error for failed runs.
    pub error: Option<String>,
    pub data: serde_json::Value,
}

/// Receives the final [`UploadResult`].
pub type UploadCallback = Box<dyn Fn(&UploadResult) + Send + Sync>;
