//! End-to-end upload run.
//!
//! Drives one file through `Negotiating → Transferring → Finalizing →
//! Committed`, optionally `→ Published`, and reports the outcome to the
//! result callback exactly once.

use std::future::Future;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::fs::File;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use vidup_protocol::PublishVideo;
use vidup_protocol::constants::DEFAULT_UPLOAD_SCHEME;
use vidup_transfer::{
    ChunkSource, FinalizeManifest, NoopObserver, PartLedger, ProgressObserver, TransferError,
    UploadState,
};

use crate::error::UploadError;
use crate::finalizer::SessionFinalizer;
use crate::negotiator::SessionNegotiator;
use crate::pool::{DEFAULT_WORKERS, TransferPool};
use crate::publish::Publisher;
use crate::retry::RetryPolicy;
use crate::transport::UposTransport;
use crate::types::{PublishReceipt, UploadCallback, UploadOutcome, UploadRequest, UploadResult};

/// Tracks the lifecycle state and reports every transition.
struct Lifecycle {
    state: UploadState,
    observer: Arc<dyn ProgressObserver>,
}

impl Lifecycle {
    fn start(observer: Arc<dyn ProgressObserver>) -> Self {
        info!(state = %UploadState::Negotiating, "upload state");
        observer.on_state(UploadState::Negotiating);
        Self {
            state: UploadState::Negotiating,
            observer,
        }
    }

    fn advance(&mut self, next: UploadState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {next}",
            self.state
        );
        self.state = next;
        info!(state = %next, "upload state");
        self.observer.on_state(next);
    }

    /// Moves to `Failed`, returning the state the failure happened in.
    fn fail(&mut self) -> UploadState {
        let from = self.state;
        if !from.is_terminal() {
            self.advance(UploadState::Failed);
        }
        from
    }
}

/// Runs uploads against one transport.
pub struct UploadPipeline {
    transport: Arc<dyn UposTransport>,
    publisher: Option<Arc<dyn Publisher>>,
    workers: usize,
    retry: RetryPolicy,
    scheme: String,
    observer: Arc<dyn ProgressObserver>,
    cancel: CancellationToken,
    callback: Option<UploadCallback>,
}

impl UploadPipeline {
    pub fn new(transport: Arc<dyn UposTransport>) -> Self {
        Self {
            transport,
            publisher: None,
            workers: DEFAULT_WORKERS,
            retry: RetryPolicy::default(),
            scheme: DEFAULT_UPLOAD_SCHEME.to_string(),
            observer: Arc::new(NoopObserver),
            cancel: CancellationToken::new(),
            callback: None,
        }
    }

    pub fn with_publisher(mut self, publisher: Arc<dyn Publisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_scheme(mut self, scheme: impl Into<String>) -> Self {
        self.scheme = scheme.into();
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

    pub fn with_callback(mut self, callback: UploadCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Token that cancels runs of this pipeline.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Uploads `request.path` and, when metadata and a publisher are
    /// present, publishes it.
    ///
    /// Nothing is committed on failure. The callback sees the same outcome
    /// as the return value.
    pub async fn run(&self, request: &UploadRequest) -> Result<UploadOutcome, UploadError> {
        let upload_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs() as i64;
        let video_title = request
            .metadata
            .as_ref()
            .map(|m| m.title.clone())
            .unwrap_or_else(|| request.file_name());

        let mut lifecycle = Lifecycle::start(Arc::clone(&self.observer));
        let mut video_size = 0;
        let result = self.drive(request, &mut lifecycle, &mut video_size).await;

        let report = match &result {
            Ok(outcome) => {
                let (code, message, data) = match &outcome.publish {
                    Some(receipt) => {
                        let message = if receipt.message.is_empty() || receipt.message == "0" {
                            "published".to_string()
                        } else {
                            receipt.message.clone()
                        };
                        (receipt.code, message, receipt.data.clone())
                    }
                    None => (0, "upload committed".to_string(), serde_json::Value::Null),
                };
                UploadResult {
                    success: true,
                    message,
                    video_size,
                    video_title,
                    upload_time,
                    code,
                    error: None,
                    data,
                }
            }
            Err(err) => {
                let failed_in = lifecycle.fail();
                let phase = if failed_in == UploadState::Committed {
                    "publish failed"
                } else {
                    "upload failed"
                };
                error!(state = %failed_in, error = %err, "{phase}");
                let code = match err {
                    UploadError::Publish { code, .. } => *code,
                    _ => 0,
                };
                UploadResult {
                    success: false,
                    message: format!("{phase}: {err}"),
                    video_size,
                    video_title,
                    upload_time,
                    code,
                    error: Some(err.to_string()),
                    data: serde_json::Value::Null,
                }
            }
        };

        if let Some(callback) = &self.callback {
            callback(&report);
        }
        result
    }

    async fn drive(
        &self,
        request: &UploadRequest,
        lifecycle: &mut Lifecycle,
        video_size: &mut u64,
    ) -> Result<UploadOutcome, UploadError> {
        let file_name = request.file_name();
        let file = File::open(&request.path)
            .await
            .map_err(|e| UploadError::ChunkRead(TransferError::Io(e)))?;
        let total_size = file
            .metadata()
            .await
            .map_err(|e| UploadError::ChunkRead(TransferError::Io(e)))?
            .len();
        *video_size = total_size;

        let negotiator =
            SessionNegotiator::new(Arc::clone(&self.transport)).with_scheme(self.scheme.clone());
        let session = self
            .cancellable(negotiator.negotiate(&file_name, total_size, &request.profile))
            .await?;
        let session = Arc::new(session);
        lifecycle.advance(UploadState::Transferring);

        let mut source = ChunkSource::new(file, total_size, session.chunk_size())?;
        let ledger = Arc::new(PartLedger::new());
        let pool = TransferPool::new(
            Arc::clone(&self.transport),
            Arc::clone(&session),
            Arc::clone(&ledger),
            self.workers,
        )
        .with_retry(self.retry.clone())
        .with_observer(Arc::clone(&self.observer))
        .with_cancel(self.cancel.clone());
        pool.transfer_all(&mut source).await?;

        let manifest = FinalizeManifest::from_ledger(&ledger);
        manifest.verify(session.total_chunks())?;
        lifecycle.advance(UploadState::Finalizing);

        SessionFinalizer::new(Arc::clone(&self.transport))
            .with_retry(self.retry.clone())
            .with_observer(Arc::clone(&self.observer))
            .with_cancel(self.cancel.clone())
            .finalize(&session, &manifest)
            .await?;
        lifecycle.advance(UploadState::Committed);

        let mut outcome = UploadOutcome {
            session_id: session.session_id().to_string(),
            remote_file_name: session.remote_file_name().to_string(),
            biz_id: session.biz_id(),
            total_size,
            parts: session.total_chunks(),
            publish: None,
        };

        let Some(metadata) = &request.metadata else {
            return Ok(outcome);
        };
        let Some(publisher) = &self.publisher else {
            warn!("metadata given but no publisher configured, stopping at commit");
            return Ok(outcome);
        };

        let cover_url = if metadata.cover.is_empty() {
            String::new()
        } else {
            match self.cancellable(publisher.upload_cover(&metadata.cover)).await {
                Ok(url) => url,
                Err(UploadError::Cancelled) => return Err(UploadError::Cancelled),
                Err(e) => {
                    warn!(cover = %metadata.cover, error = %e, "cover upload failed, publishing without cover");
                    String::new()
                }
            }
        };

        let video = PublishVideo {
            filename: session.remote_file_name().to_string(),
            title: file_name,
            desc: String::new(),
            cid: session.biz_id(),
        };
        let reply = self
            .cancellable(publisher.publish(metadata, &cover_url, video))
            .await?;
        if reply.code != 0 {
            return Err(UploadError::Publish {
                code: reply.code,
                message: reply.message,
            });
        }
        lifecycle.advance(UploadState::Published);
        info!(title = %metadata.title, "video published");

        outcome.publish = Some(PublishReceipt {
            code: reply.code,
            message: reply.message,
            ttl: reply.ttl,
            data: reply.data,
        });
        Ok(outcome)
    }

    async fn cancellable<T>(
        &self,
        fut: impl Future<Output = Result<T, UploadError>>,
    ) -> Result<T, UploadError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(UploadError::Cancelled),
            result = fut => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use crate::publish::PublishFuture;
    use crate::types::VideoMetadata;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use vidup_protocol::PublishResponse;

    #[derive(Default)]
    struct StateLog(Mutex<Vec<UploadState>>);

    impl ProgressObserver for StateLog {
        fn on_state(&self, state: UploadState) {
            self.0.lock().unwrap().push(state);
        }
    }

    impl StateLog {
        fn states(&self) -> Vec<UploadState> {
            self.0.lock().unwrap().clone()
        }
    }

    struct MockPublisher {
        cover_fails: bool,
        code: i64,
        covers: Mutex<Vec<String>>,
        published: Mutex<Vec<(String, PublishVideo)>>,
    }

    impl MockPublisher {
        fn new(code: i64) -> Self {
            Self {
                cover_fails: false,
                code,
                covers: Mutex::new(Vec::new()),
                published: Mutex::new(Vec::new()),
            }
        }
    }

    impl Publisher for MockPublisher {
        fn upload_cover(&self, source: &str) -> PublishFuture<'_, String> {
            self.covers.lock().unwrap().push(source.to_string());
            Box::pin(async move {
                if self.cover_fails {
                    Err(UploadError::Publish {
                        code: -1,
                        message: "cover down".into(),
                    })
                } else {
                    Ok("https://i0.example.com/c.jpg".to_string())
                }
            })
        }

        fn publish(
            &self,
            _metadata: &VideoMetadata,
            cover_url: &str,
            video: PublishVideo,
        ) -> PublishFuture<'_, PublishResponse> {
            self.published
                .lock()
                .unwrap()
                .push((cover_url.to_string(), video));
            Box::pin(async move {
                Ok(PublishResponse {
                    code: self.code,
                    message: if self.code == 0 { "0".into() } else { "title too long".into() },
                    ttl: 1,
                    data: serde_json::json!({"bvid": "BV1xx"}),
                })
            })
        }
    }

    fn write_file(dir: &TempDir, size: usize) -> PathBuf {
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, vec![0x42u8; size]).unwrap();
        path
    }

    type Reports = Arc<Mutex<Vec<UploadResult>>>;

    fn recording_callback() -> (UploadCallback, Reports) {
        let reports: Reports = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&reports);
        let cb: UploadCallback = Box::new(move |r| sink.lock().unwrap().push(r.clone()));
        (cb, reports)
    }

    fn metadata() -> VideoMetadata {
        VideoMetadata {
            title: "Trip".into(),
            tid: 17,
            cover: "/tmp/cover.jpg".into(),
            ..VideoMetadata::default()
        }
    }

    #[tokio::test]
    async fn ten_mib_end_to_end() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, 10_485_760);
        let mock = Arc::new(MockTransport::new(4_194_304));
        let states = Arc::new(StateLog::default());
        let (cb, reports) = recording_callback();

        let pipeline = UploadPipeline::new(mock.clone())
            .with_workers(2)
            .with_observer(states.clone())
            .with_callback(cb);
        let outcome = pipeline.run(&UploadRequest::new(&path)).await.unwrap();

        assert_eq!(outcome.parts, 3);
        assert_eq!(outcome.session_id, "upload-1");
        assert_eq!(outcome.remote_file_name, "n1");
        assert!(mock.max_in_flight() <= 2);

        let completes = mock.completes();
        assert_eq!(completes.len(), 1);
        let parts: Vec<u32> = completes[0].parts.iter().map(|p| p.part_number).collect();
        assert_eq!(parts, vec![1, 2, 3]);

        use UploadState::*;
        assert_eq!(states.states(), vec![Negotiating, Transferring, Finalizing, Committed]);

        let reports = reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].success);
        assert_eq!(reports[0].video_size, 10_485_760);
        assert_eq!(reports[0].video_title, "clip.mp4");
    }

    #[tokio::test]
    async fn zero_chunk_size_never_transfers() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, 10);
        let mock = Arc::new(MockTransport::new(0));
        let states = Arc::new(StateLog::default());
        let (cb, reports) = recording_callback();

        let err = UploadPipeline::new(mock.clone())
            .with_observer(states.clone())
            .with_callback(cb)
            .run(&UploadRequest::new(&path))
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Negotiation(_)));
        assert!(!states.states().contains(&UploadState::Transferring));
        assert_eq!(states.states().last(), Some(&UploadState::Failed));
        assert_eq!(mock.total_put_attempts(), 0);

        let reports = reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert!(!reports[0].success);
        assert!(reports[0].message.starts_with("upload failed: negotiation failed"));
    }

    #[tokio::test]
    async fn empty_file_fails_without_network() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, 0);
        let mock = Arc::new(MockTransport::new(4));

        let err = UploadPipeline::new(mock.clone())
            .run(&UploadRequest::new(&path))
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::EmptyFile));
        assert_eq!(mock.pre_upload_calls(), 0);
    }

    #[tokio::test]
    async fn missing_file_reports_failure() {
        let dir = TempDir::new().unwrap();
        let mock = Arc::new(MockTransport::new(4));
        let (cb, reports) = recording_callback();

        let err = UploadPipeline::new(mock)
            .with_callback(cb)
            .run(&UploadRequest::new(dir.path().join("missing.mp4")))
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::ChunkRead(_)));
        assert_eq!(reports.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn exhausted_chunk_blocks_finalize() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, 10);
        let mock = Arc::new(MockTransport::new(4).fail_chunk(3, 5));
        let states = Arc::new(StateLog::default());
        let (cb, reports) = recording_callback();

        let err = UploadPipeline::new(mock.clone())
            .with_observer(states.clone())
            .with_callback(cb)
            .run(&UploadRequest::new(&path))
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::ChunkTransfer { index: 2, attempts: 5, .. }));
        assert!(mock.completes().is_empty());
        assert!(!states.states().contains(&UploadState::Finalizing));
        assert_eq!(states.states().last(), Some(&UploadState::Failed));
        assert!(!reports.lock().unwrap()[0].success);
    }

    #[tokio::test]
    async fn chunk_recovers_on_fifth_attempt() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, 10);
        let mock = Arc::new(MockTransport::new(4).fail_chunk(1, 4));

        let outcome = UploadPipeline::new(mock.clone())
            .run(&UploadRequest::new(&path))
            .await
            .unwrap();

        assert_eq!(outcome.parts, 3);
        assert_eq!(mock.put_attempts(1), 5);
        assert_eq!(mock.completes()[0].parts.len(), 3);
    }

    #[tokio::test]
    async fn finalize_rejection_fails_run() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, 10);
        let mock = Arc::new(MockTransport::new(4).with_complete_code(0));
        let states = Arc::new(StateLog::default());

        let err = UploadPipeline::new(mock.clone())
            .with_observer(states.clone())
            .run(&UploadRequest::new(&path))
            .await
            .unwrap_err();

        assert!(err.is_finalize());
        assert_eq!(mock.completes().len(), 1);
        assert!(!states.states().contains(&UploadState::Committed));
    }

    #[tokio::test]
    async fn publishes_after_commit() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, 10);
        let mock = Arc::new(MockTransport::new(4));
        let publisher = Arc::new(MockPublisher::new(0));
        let states = Arc::new(StateLog::default());
        let (cb, reports) = recording_callback();

        let outcome = UploadPipeline::new(mock)
            .with_publisher(publisher.clone())
            .with_observer(states.clone())
            .with_callback(cb)
            .run(&UploadRequest::new(&path).with_metadata(metadata()))
            .await
            .unwrap();

        assert_eq!(outcome.publish.unwrap().code, 0);
        assert_eq!(states.states().last(), Some(&UploadState::Published));

        let published = publisher.published.lock().unwrap();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, "https://i0.example.com/c.jpg");
        assert_eq!(published[0].1.filename, "n1");
        assert_eq!(published[0].1.cid, 7);

        let reports = reports.lock().unwrap();
        assert!(reports[0].success);
        assert_eq!(reports[0].video_title, "Trip");
        assert_eq!(reports[0].data["bvid"], "BV1xx");
    }

    #[tokio::test]
    async fn cover_failure_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, 10);
        let mock = Arc::new(MockTransport::new(4));
        let mut publisher = MockPublisher::new(0);
        publisher.cover_fails = true;
        let publisher = Arc::new(publisher);

        UploadPipeline::new(mock)
            .with_publisher(publisher.clone())
            .run(&UploadRequest::new(&path).with_metadata(metadata()))
            .await
            .unwrap();

        let published = publisher.published.lock().unwrap();
        assert_eq!(published[0].0, "");
    }

    #[tokio::test]
    async fn publish_rejection_reports_publish_phase() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, 10);
        let mock = Arc::new(MockTransport::new(4));
        let publisher = Arc::new(MockPublisher::new(21012));
        let states = Arc::new(StateLog::default());
        let (cb, reports) = recording_callback();

        let err = UploadPipeline::new(mock)
            .with_publisher(publisher)
            .with_observer(states.clone())
            .with_callback(cb)
            .run(&UploadRequest::new(&path).with_metadata(metadata()))
            .await
            .unwrap_err();

        assert!(matches!(err, UploadError::Publish { code: 21012, .. }));
        use UploadState::*;
        assert_eq!(
            states.states(),
            vec![Negotiating, Transferring, Finalizing, Committed, Failed]
        );

        let reports = reports.lock().unwrap();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].message.starts_with("publish failed: "));
        assert_eq!(reports[0].code, 21012);
    }

    #[tokio::test]
    async fn metadata_without_publisher_stops_at_commit() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, 10);
        let mock = Arc::new(MockTransport::new(4));

        let outcome = UploadPipeline::new(mock)
            .run(&UploadRequest::new(&path).with_metadata(metadata()))
            .await
            .unwrap();
        assert!(outcome.publish.is_none());
    }

    #[tokio::test]
    async fn cancelled_run_reports_failure() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, 10);
        let mock = Arc::new(MockTransport::new(4));
        let (cb, reports) = recording_callback();

        let pipeline = UploadPipeline::new(mock.clone()).with_callback(cb);
        pipeline.cancel_token().cancel();
        let err = pipeline.run(&UploadRequest::new(&path)).await.unwrap_err();

        assert!(matches!(err, UploadError::Cancelled));
        assert_eq!(mock.total_put_attempts(), 0);
        assert_eq!(reports.lock().unwrap()[0].message, "upload failed: cancelled");
    }

    #[tokio::test]
    async fn pipelines_run_concurrently() {
        let dir = TempDir::new().unwrap();
        let path = write_file(&dir, 10);
        let a = Arc::new(MockTransport::new(4));
        let b = Arc::new(MockTransport::new(3));

        let pa = UploadPipeline::new(a.clone());
        let pb = UploadPipeline::new(b.clone());
        let req = UploadRequest::new(&path);
        let (ra, rb) = tokio::join!(pa.run(&req), pb.run(&req));

        assert_eq!(ra.unwrap().parts, 3);
        assert_eq!(rb.unwrap().parts, 4);
        assert_eq!(a.completes().len(), 1);
        assert_eq!(b.completes().len(), 1);
    }
}
