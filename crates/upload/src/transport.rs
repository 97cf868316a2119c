//! Network seam for the upload engine.
//!
//! [`UposTransport`] covers the four calls the engine makes. The engine
//! only ever sees this trait; [`HttpTransport`] is the `reqwest`
//! implementation and tests substitute scripted mocks.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::header::{CONTENT_TYPE, COOKIE, ETAG, HeaderMap, HeaderValue, ORIGIN, REFERER};
use tracing::{debug, info};
use vidup_protocol::constants::{PLACEHOLDER_ETAG, UPOS_AUTH_HEADER, USER_AGENT};
use vidup_protocol::{
    ChunkQuery, CompleteUploadQuery, CompleteUploadRequest, CompleteUploadResponse,
    InitUploadQuery, InitUploadResponse, NavResponse, PreUploadQuery, PreUploadResponse,
};
use vidup_transfer::{Chunk, UploadSession};

use crate::credential::Credential;
use crate::error::UploadError;
use crate::types::Endpoints;

/// Errors from a single request.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid {0} header value")]
    InvalidHeader(&'static str),
}

/// Boxed future returned by transport calls.
pub type TransportFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, TransportError>> + Send + 'a>>;

/// Reply to an accepted chunk PUT.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkReceipt {
    /// `ETag` response header, quotes trimmed.
    pub etag: Option<String>,
}

impl ChunkReceipt {
    /// Part tag for the manifest; the placeholder when no `ETag` came back.
    pub fn into_tag(self) -> String {
        self.etag.unwrap_or_else(|| PLACEHOLDER_ETAG.to_string())
    }
}

/// Requests the upload engine sends.
///
/// Any non-200 reply must surface as [`TransportError::Status`]; callers
/// treat every `Err` as a failed attempt.
pub trait UposTransport: Send + Sync {
    /// Pre-upload: asks where and how to upload a file.
    fn pre_upload(&self, query: &PreUploadQuery) -> TransportFuture<'_, PreUploadResponse>;

    /// Opens a multipart upload at `base_url`.
    fn init_upload(
        &self,
        base_url: &str,
        auth: &str,
        query: &InitUploadQuery,
    ) -> TransportFuture<'_, InitUploadResponse>;

    /// Sends one chunk.
    fn put_chunk(&self, session: &UploadSession, chunk: &Chunk)
    -> TransportFuture<'_, ChunkReceipt>;

    /// Commits the upload with the ordered part list.
    fn complete_upload(
        &self,
        session: &UploadSession,
        request: &CompleteUploadRequest,
    ) -> TransportFuture<'_, CompleteUploadResponse>;
}

/// Positional query parameters for a chunk PUT.
pub fn chunk_query(session: &UploadSession, chunk: &Chunk) -> ChunkQuery {
    ChunkQuery {
        part_number: chunk.part_number(),
        upload_id: session.session_id().to_string(),
        chunk: chunk.index,
        chunks: session.total_chunks(),
        size: chunk.length as u64,
        start: chunk.offset,
        end: chunk.end(),
        total: session.total_size(),
    }
}

// ---------------------------------------------------------------------------
// HttpTransport
// ---------------------------------------------------------------------------

/// `reqwest`-backed transport carrying the session cookie on every request.
pub struct HttpTransport {
    http: reqwest::Client,
    endpoints: Endpoints,
}

impl HttpTransport {
    /// Builds a client with the credential cookie and browser user agent as
    /// default headers. `timeout` bounds each request end to end.
    pub fn new(
        credential: &Credential,
        endpoints: Endpoints,
        timeout: Option<Duration>,
    ) -> Result<Self, TransportError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            COOKIE,
            HeaderValue::from_str(credential.cookie())
                .map_err(|_| TransportError::InvalidHeader("cookie"))?,
        );

        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            endpoints,
        })
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Checks the cookie against the account endpoint and returns the
    /// account name.
    pub async fn verify_login(&self) -> Result<String, UploadError> {
        let resp = self.http.get(&self.endpoints.nav_url).send().await;
        let resp = check_status(resp.map_err(TransportError::from)?).await?;
        let body = resp.bytes().await.map_err(TransportError::from)?;
        let nav: NavResponse = serde_json::from_slice(&body).map_err(TransportError::from)?;

        if nav.data.uname.is_empty() {
            return Err(UploadError::Credential(
                "cookie expired, log in again".into(),
            ));
        }
        info!(user = %nav.data.uname, "logged in");
        Ok(nav.data.uname)
    }
}

/// Turns any status other than 200 into [`TransportError::Status`].
pub(crate) async fn check_status(
    resp: reqwest::Response,
) -> Result<reqwest::Response, TransportError> {
    let status = resp.status();
    if status != StatusCode::OK {
        let body = resp.text().await.unwrap_or_default();
        return Err(TransportError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp)
}

async fn read_json<T: serde::de::DeserializeOwned>(
    req: reqwest::RequestBuilder,
) -> Result<T, TransportError> {
    let resp = check_status(req.send().await?).await?;
    let body = resp.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

impl UposTransport for HttpTransport {
    fn pre_upload(&self, query: &PreUploadQuery) -> TransportFuture<'_, PreUploadResponse> {
        let req = self.http.get(&self.endpoints.preupload_url).query(query);
        Box::pin(read_json(req))
    }

    fn init_upload(
        &self,
        base_url: &str,
        auth: &str,
        query: &InitUploadQuery,
    ) -> TransportFuture<'_, InitUploadResponse> {
        let req = self
            .http
            .post(format!("{base_url}?uploads&output=json"))
            .header(UPOS_AUTH_HEADER, auth)
            .query(query);
        Box::pin(read_json(req))
    }

    fn put_chunk(
        &self,
        session: &UploadSession,
        chunk: &Chunk,
    ) -> TransportFuture<'_, ChunkReceipt> {
        let req = self
            .http
            .put(session.target_base_url())
            .header(UPOS_AUTH_HEADER, session.auth_token())
            .header(CONTENT_TYPE, "application/octet-stream")
            .query(&chunk_query(session, chunk))
            .body(chunk.payload.clone());
        let part = chunk.part_number();

        Box::pin(async move {
            let resp = check_status(req.send().await?).await?;
            let etag = resp
                .headers()
                .get(ETAG)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim_matches('"').to_string())
                .filter(|v| !v.is_empty());
            debug!(part, etag = ?etag, "chunk accepted");
            Ok(ChunkReceipt { etag })
        })
    }

    fn complete_upload(
        &self,
        session: &UploadSession,
        request: &CompleteUploadRequest,
    ) -> TransportFuture<'_, CompleteUploadResponse> {
        let query = CompleteUploadQuery {
            output: "json",
            profile: session.profile().to_string(),
            name: session.file_name().to_string(),
            upload_id: session.session_id().to_string(),
            biz_id: session.biz_id(),
        };
        let origin = &self.endpoints.member_origin;
        let req = self
            .http
            .post(session.target_base_url())
            .header(UPOS_AUTH_HEADER, session.auth_token())
            .header(ORIGIN, origin.as_str())
            .header(REFERER, format!("{origin}/"))
            .query(&query)
            .json(request);
        Box::pin(read_json(req))
    }
}
