use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// Resolved upload target derived from a pre-upload response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UposLocation {
    /// Absolute URL chunks and the finalize request are sent to.
    pub base_url: String,
    /// Object path without the `upos://` scheme (e.g. `ugcboss/n2301.mp4`).
    pub path: String,
    /// File name the publish endpoint refers to (`n2301`).
    pub remote_file_name: String,
}

impl UposLocation {
    /// Builds the upload location from the scheme-relative `endpoint`
    /// (`//upos-sz.example.com`) and the `upos://bucket/name.ext` uri.
    pub fn parse(scheme: &str, endpoint: &str, upos_uri: &str) -> Result<Self, ProtocolError> {
        let path = upos_uri.strip_prefix("upos://").unwrap_or(upos_uri);
        let object = path
            .split('/')
            .nth(1)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProtocolError::InvalidUposUri(upos_uri.to_string()))?;
        let remote_file_name = object.split('.').next().unwrap_or(object).to_string();
        if remote_file_name.is_empty() || endpoint.is_empty() {
            return Err(ProtocolError::InvalidUposUri(upos_uri.to_string()));
        }

        Ok(Self {
            base_url: format!("{scheme}:{endpoint}/{path}"),
            path: path.to_string(),
            remote_file_name,
        })
    }
}

// ---------------------------------------------------------------------------
// Credential file
// ---------------------------------------------------------------------------

/// Cookie file written by the QR login flow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CookieFile {
    #[serde(default)]
    pub data: CookieFileData,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CookieFileData {
    #[serde(default)]
    pub cookie_info: CookieInfo,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CookieInfo {
    #[serde(default)]
    pub cookies: Vec<CookieEntry>,
}

/// A single `name=value` cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieEntry {
    pub name: String,
    pub value: String,
}

/// Account info response; only the fields the client checks.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NavResponse {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub data: NavData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NavData {
    #[serde(default)]
    pub uname: String,
}

// ---------------------------------------------------------------------------
// Cover + publish
// ---------------------------------------------------------------------------

/// Cover upload response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoverUploadResponse {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub data: CoverData,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CoverData {
    #[serde(default)]
    pub url: String,
}

/// Submission body for the publish endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishRequest {
    /// 1 = original work, 2 = repost.
    pub copyright: i64,
    pub cover: String,
    pub title: String,
    /// Category (zone) id.
    pub tid: i64,
    /// Comma separated tags.
    pub tag: String,
    pub desc_format_id: i64,
    pub desc: String,
    pub source: String,
    pub dynamic: String,
    pub interactive: i64,
    pub videos: Vec<PublishVideo>,
    pub act_reserve_create: i64,
    pub no_disturbance: i64,
    pub no_reprint: i64,
    pub subtitle: PublishSubtitle,
    pub dolby: i64,
    pub lossless_music: i64,
    pub csrf: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishVideo {
    pub filename: String,
    pub title: String,
    pub desc: String,
    pub cid: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublishSubtitle {
    pub open: i64,
    pub lan: String,
}

/// Publish response envelope.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PublishResponse {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub ttl: i64,
    #[serde(default)]
    pub data: serde_json::Value,
}
