//! Post-commit submission: cover upload and publish.

use std::future::Future;
use std::pin::Pin;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use tracing::{debug, info};
use vidup_protocol::constants::{COVER_FETCH_TIMEOUT, DESC_FORMAT_ID};
use vidup_protocol::{
    CoverUploadResponse, PublishRequest, PublishResponse, PublishSubtitle, PublishVideo,
};

use crate::credential::Credential;
use crate::error::UploadError;
use crate::transport::{HttpTransport, TransportError, check_status};
use crate::types::{Endpoints, VideoMetadata};

/// Boxed future returned by [`Publisher`] calls.
pub type PublishFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, UploadError>> + Send + 'a>>;

/// Turns a committed upload into a visible submission.
pub trait Publisher: Send + Sync {
    /// Uploads a cover from a local path or `http(s)` URL and returns the
    /// hosted URL.
    fn upload_cover(&self, source: &str) -> PublishFuture<'_, String>;

    /// Submits `video` with `metadata`. The reply is returned as-is;
    /// callers check `code`.
    fn publish(
        &self,
        metadata: &VideoMetadata,
        cover_url: &str,
        video: PublishVideo,
    ) -> PublishFuture<'_, PublishResponse>;
}

/// Detects JPEG, PNG and GIF by magic bytes.
pub fn detect_image_type(data: &[u8]) -> Option<&'static str> {
    match data {
        [0xFF, 0xD8, 0xFF, ..] => Some("image/jpeg"),
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some("image/png"),
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some("image/gif"),
        _ => None,
    }
}

/// Encodes an image as a base64 `data:` URI.
pub fn cover_data_uri(data: &[u8]) -> Result<String, UploadError> {
    let mime = detect_image_type(data).ok_or_else(|| UploadError::Publish {
        code: -1,
        message: "unsupported cover format".into(),
    })?;
    Ok(format!("data:{mime};base64,{}", STANDARD.encode(data)))
}

/// Splits a comma-separated tag list and drops blanks.
pub fn normalize_tags(tags: &str) -> String {
    tags.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

/// Builds the submission body for one video.
pub fn build_publish_request(
    metadata: &VideoMetadata,
    cover_url: &str,
    video: PublishVideo,
    csrf: &str,
) -> PublishRequest {
    PublishRequest {
        copyright: metadata.copyright,
        cover: cover_url.to_string(),
        title: metadata.title.clone(),
        tid: metadata.tid,
        tag: normalize_tags(&metadata.tag),
        desc_format_id: DESC_FORMAT_ID,
        desc: metadata.desc.clone(),
        source: metadata.source.clone(),
        dynamic: String::new(),
        interactive: 0,
        videos: vec![video],
        act_reserve_create: 0,
        no_disturbance: 0,
        no_reprint: 1,
        subtitle: PublishSubtitle::default(),
        dolby: 0,
        lossless_music: 0,
        csrf: csrf.to_string(),
    }
}

// ---------------------------------------------------------------------------
// HttpPublisher
// ---------------------------------------------------------------------------

/// [`Publisher`] over the member-site HTTP API.
pub struct HttpPublisher {
    http: reqwest::Client,
    endpoints: Endpoints,
    csrf: String,
}

impl HttpPublisher {
    /// Shares `transport`'s client, so requests carry the same cookie.
    pub fn new(transport: &HttpTransport, credential: &Credential) -> Self {
        Self {
            http: transport.http().clone(),
            endpoints: transport.endpoints().clone(),
            csrf: credential.csrf().to_string(),
        }
    }

    async fn read_cover(&self, source: &str) -> Result<Vec<u8>, UploadError> {
        if source.starts_with("http://") || source.starts_with("https://") {
            let resp = self
                .http
                .get(source)
                .timeout(COVER_FETCH_TIMEOUT)
                .send()
                .await
                .map_err(TransportError::from)?;
            let resp = check_status(resp).await?;
            let bytes = resp.bytes().await.map_err(TransportError::from)?;
            Ok(bytes.to_vec())
        } else {
            tokio::fs::read(source).await.map_err(|e| UploadError::Publish {
                code: -1,
                message: format!("cannot read cover {source}: {e}"),
            })
        }
    }
}

impl Publisher for HttpPublisher {
    fn upload_cover(&self, source: &str) -> PublishFuture<'_, String> {
        let source = source.to_string();
        Box::pin(async move {
            let data = self.read_cover(&source).await?;
            let uri = cover_data_uri(&data)?;
            debug!(bytes = data.len(), "uploading cover");

            let resp = self
                .http
                .post(&self.endpoints.cover_upload_url)
                .form(&[("cover", uri.as_str()), ("csrf", self.csrf.as_str())])
                .send()
                .await
                .map_err(TransportError::from)?;
            let body = check_status(resp)
                .await?
                .bytes()
                .await
                .map_err(TransportError::from)?;
            let cover: CoverUploadResponse =
                serde_json::from_slice(&body).map_err(TransportError::from)?;

            if cover.code != 0 || cover.data.url.is_empty() {
                return Err(UploadError::Publish {
                    code: cover.code,
                    message: cover.message,
                });
            }
            info!(url = %cover.data.url, "cover uploaded");
            Ok(cover.data.url)
        })
    }

    fn publish(
        &self,
        metadata: &VideoMetadata,
        cover_url: &str,
        video: PublishVideo,
    ) -> PublishFuture<'_, PublishResponse> {
        let request = build_publish_request(metadata, cover_url, video, &self.csrf);
        let req = self
            .http
            .post(&self.endpoints.publish_url)
            .query(&[("csrf", self.csrf.as_str())])
            .json(&request);

        Box::pin(async move {
            let resp = check_status(req.send().await.map_err(TransportError::from)?).await?;
            let body = resp.bytes().await.map_err(TransportError::from)?;
            let reply: PublishResponse =
                serde_json::from_slice(&body).map_err(TransportError::from)?;
            debug!(code = reply.code, message = %reply.message, "publish reply");
            Ok(reply)
        })
    }
}
