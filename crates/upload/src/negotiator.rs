//! Session negotiation: pre-upload followed by multipart init.

use std::sync::Arc;

use tracing::{debug, info};
use vidup_protocol::constants::DEFAULT_UPLOAD_SCHEME;
use vidup_protocol::{InitUploadQuery, PreUploadQuery, UposLocation};
use vidup_transfer::{SessionParams, UploadSession};

use crate::error::UploadError;
use crate::transport::UposTransport;

/// Obtains an [`UploadSession`] for one file.
///
/// Neither round trip is retried; any failure aborts the upload.
pub struct SessionNegotiator {
    transport: Arc<dyn UposTransport>,
    scheme: String,
}

impl SessionNegotiator {
    pub fn new(transport: Arc<dyn UposTransport>) -> Self {
        Self {
            transport,
            scheme: DEFAULT_UPLOAD_SCHEME.to_string(),
        }
    }

    /// Overrides the scheme prefixed to the returned upload endpoint.
    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
        self
    }

    /// Negotiates a session for `file_name` of `total_size` bytes.
    ///
    /// The server's chunk size, endpoint and auth token are taken as given
    /// once they pass basic validation.
    pub async fn negotiate(
        &self,
        file_name: &str,
        total_size: u64,
        profile: &str,
    ) -> Result<UploadSession, UploadError> {
        if total_size == 0 {
            return Err(UploadError::EmptyFile);
        }

        let pre = self
            .transport
            .pre_upload(&PreUploadQuery::new(profile, file_name, total_size))
            .await
            .map_err(|e| UploadError::Negotiation(format!("pre-upload request failed: {e}")))?;
        debug!(upos_uri = %pre.upos_uri, endpoint = %pre.endpoint, chunk_size = pre.chunk_size, "pre-upload reply");

        if pre.chunk_size <= 0 {
            return Err(UploadError::Negotiation(format!(
                "server returned chunk size {}",
                pre.chunk_size
            )));
        }
        if pre.auth.is_empty() {
            return Err(UploadError::Negotiation("server returned no auth token".into()));
        }
        if pre.upos_uri.is_empty() || pre.endpoint.is_empty() {
            return Err(UploadError::Negotiation(
                "server returned no upload target".into(),
            ));
        }

        let location = UposLocation::parse(&self.scheme, &pre.endpoint, &pre.upos_uri)
            .map_err(|e| UploadError::Negotiation(e.to_string()))?;

        let init = self
            .transport
            .init_upload(
                &location.base_url,
                &pre.auth,
                &InitUploadQuery {
                    profile: profile.to_string(),
                    filesize: total_size,
                    partsize: pre.chunk_size as u64,
                    biz_id: pre.biz_id,
                },
            )
            .await
            .map_err(|e| UploadError::Negotiation(format!("upload init failed: {e}")))?;

        if init.upload_id.is_empty() {
            return Err(UploadError::Negotiation("server returned no upload id".into()));
        }

        let session = UploadSession::new(SessionParams {
            file_name: file_name.to_string(),
            profile: profile.to_string(),
            target_base_url: location.base_url,
            remote_file_name: location.remote_file_name,
            auth_token: pre.auth,
            session_id: init.upload_id,
            chunk_size: pre.chunk_size,
            total_size,
            biz_id: pre.biz_id,
        })?;

        info!(
            upload_id = %session.session_id(),
            chunk_size = session.chunk_size(),
            chunks = session.total_chunks(),
            biz_id = session.biz_id(),
            "session negotiated"
        );
        Ok(session)
    }
}
