//! Commits a fully transferred upload.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use vidup_protocol::CompleteUploadResponse;
use vidup_transfer::{FinalizeManifest, NoopObserver, ProgressObserver, RetryOperation, UploadSession};

use crate::error::UploadError;
use crate::retry::{RetryFailure, RetryPolicy, with_retry};
use crate::transport::UposTransport;

/// Submits the ordered part manifest for a session.
pub struct SessionFinalizer {
    transport: Arc<dyn UposTransport>,
    policy: RetryPolicy,
    observer: Arc<dyn ProgressObserver>,
    cancel: CancellationToken,
}

impl SessionFinalizer {
    pub fn new(transport: Arc<dyn UposTransport>) -> Self {
        Self {
            transport,
            policy: RetryPolicy::default(),
            observer: Arc::new(NoopObserver),
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Commits `session` with `manifest`.
    ///
    /// The manifest must name every part `1..=total_chunks` exactly once;
    /// otherwise nothing is sent. Transport failures and non-200 replies
    /// are retried. A reply with `OK != 1` is final.
    pub async fn finalize(
        &self,
        session: &UploadSession,
        manifest: &FinalizeManifest,
    ) -> Result<CompleteUploadResponse, UploadError> {
        manifest.verify(session.total_chunks())?;

        let body = manifest.to_request();
        let result = with_retry(
            &self.policy,
            RetryOperation::Finalize,
            self.observer.as_ref(),
            &self.cancel,
            || self.transport.complete_upload(session, &body),
        )
        .await;

        let resp = match result {
            Ok(resp) => resp,
            Err(RetryFailure::Exhausted { attempts, source }) => {
                error!(upload_id = %session.session_id(), attempts, error = %source, "finalize failed");
                return Err(UploadError::FinalizeExhausted { attempts, source });
            }
            Err(RetryFailure::Cancelled) => return Err(UploadError::Cancelled),
        };

        if !resp.is_ok() {
            error!(upload_id = %session.session_id(), code = resp.ok, "finalize rejected");
            return Err(UploadError::FinalizeRejected { code: resp.ok });
        }

        info!(
            upload_id = %session.session_id(),
            parts = manifest.len(),
            location = %resp.location,
            "upload committed"
        );
        Ok(resp)
    }
}
