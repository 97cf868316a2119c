use serde::{Deserialize, Serialize};

use crate::constants::{CLIENT_BUILD, CLIENT_VERSION};

// ---------------------------------------------------------------------------
// Pre-upload
// ---------------------------------------------------------------------------

/// Query string of the pre-upload request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PreUploadQuery {
    pub profile: String,
    pub name: String,
    pub size: u64,
    pub r: &'static str,
    pub ssl: u8,
    pub version: &'static str,
    pub build: &'static str,
}

impl PreUploadQuery {
    pub fn new(profile: &str, name: &str, size: u64) -> Self {
        Self {
            profile: profile.to_string(),
            name: name.to_string(),
            size,
            r: "upos",
            ssl: 0,
            version: CLIENT_VERSION,
            build: CLIENT_BUILD,
        }
    }
}

/// Pre-upload response.
///
/// Every field is defaulted so that a sparse response surfaces as a
/// validation error in the negotiator rather than as a JSON error.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreUploadResponse {
    #[serde(rename = "OK", default)]
    pub ok: i64,
    #[serde(default)]
    pub upos_uri: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub chunk_size: i64,
    #[serde(default)]
    pub auth: String,
    #[serde(default)]
    pub biz_id: i64,
}

// ---------------------------------------------------------------------------
// Init (multipart upload id)
// ---------------------------------------------------------------------------

/// Query string of the `?uploads` init request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InitUploadQuery {
    pub profile: String,
    pub filesize: u64,
    pub partsize: u64,
    pub biz_id: i64,
}

/// Init response carrying the multipart upload id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitUploadResponse {
    #[serde(rename = "OK", default)]
    pub ok: i64,
    #[serde(default)]
    pub upload_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bucket: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
}

// ---------------------------------------------------------------------------
// Chunk PUT
// ---------------------------------------------------------------------------

/// Positional query parameters attached to every chunk PUT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChunkQuery {
    #[serde(rename = "partNumber")]
    pub part_number: u32,
    #[serde(rename = "uploadId")]
    pub upload_id: String,
    pub chunk: u32,
    pub chunks: u32,
    pub size: u64,
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

// ---------------------------------------------------------------------------
// Finalize
// ---------------------------------------------------------------------------

/// Query string of the finalize request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompleteUploadQuery {
    pub output: &'static str,
    pub profile: String,
    pub name: String,
    #[serde(rename = "uploadId")]
    pub upload_id: String,
    pub biz_id: i64,
}

/// One entry of the finalize manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartEntry {
    #[serde(rename = "partNumber")]
    pub part_number: u32,
    #[serde(rename = "eTag")]
    pub e_tag: String,
}

/// Finalize request body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompleteUploadRequest {
    pub parts: Vec<PartEntry>,
}

/// Finalize response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompleteUploadResponse {
    #[serde(rename = "OK", default)]
    pub ok: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bucket: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub upload_id: String,
}

impl CompleteUploadResponse {
    /// `true` when the server acknowledged the commit (`OK == 1`).
    pub fn is_ok(&self) -> bool {
        self.ok == 1
    }
}
