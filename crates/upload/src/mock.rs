//! Scripted transport for engine tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use vidup_protocol::{
    CompleteUploadRequest, CompleteUploadResponse, InitUploadQuery, InitUploadResponse,
    PreUploadQuery, PreUploadResponse,
};
use vidup_transfer::{Chunk, UploadSession};

use crate::transport::{ChunkReceipt, TransportError, TransportFuture, UposTransport};

pub(crate) struct MockTransport {
    pre_upload: PreUploadResponse,
    pre_upload_fails: bool,
    upload_id: String,
    /// part number -> remaining failures
    chunk_failures: Mutex<HashMap<u32, u32>>,
    chunk_delays: HashMap<u32, Duration>,
    complete_failures: AtomicU32,
    complete_code: i64,

    pre_upload_calls: AtomicU32,
    init_calls: AtomicU32,
    put_attempts: Mutex<Vec<u32>>,
    accepted: Mutex<Vec<u32>>,
    completes: Mutex<Vec<CompleteUploadRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

fn server_error() -> TransportError {
    TransportError::Status {
        status: 500,
        body: "injected".into(),
    }
}

impl MockTransport {
    pub(crate) fn new(chunk_size: i64) -> Self {
        Self {
            pre_upload: PreUploadResponse {
                ok: 1,
                upos_uri: "upos://ugcboss/n1.mp4".into(),
                endpoint: "//upos.example.com".into(),
                chunk_size,
                auth: "auth-1".into(),
                biz_id: 7,
            },
            pre_upload_fails: false,
            upload_id: "upload-1".into(),
            chunk_failures: Mutex::new(HashMap::new()),
            chunk_delays: HashMap::new(),
            complete_failures: AtomicU32::new(0),
            complete_code: 1,
            pre_upload_calls: AtomicU32::new(0),
            init_calls: AtomicU32::new(0),
            put_attempts: Mutex::new(Vec::new()),
            accepted: Mutex::new(Vec::new()),
            completes: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_pre_upload(mut self, resp: PreUploadResponse) -> Self {
        self.pre_upload = resp;
        self
    }

    pub(crate) fn fail_pre_upload(mut self) -> Self {
        self.pre_upload_fails = true;
        self
    }

    pub(crate) fn with_upload_id(mut self, id: &str) -> Self {
        self.upload_id = id.into();
        self
    }

    /// Part `part` fails its first `times` attempts.
    pub(crate) fn fail_chunk(self, part: u32, times: u32) -> Self {
        self.chunk_failures.lock().unwrap().insert(part, times);
        self
    }

    /// Part `part` takes `delay` per attempt.
    pub(crate) fn delay_chunk(mut self, part: u32, delay: Duration) -> Self {
        self.chunk_delays.insert(part, delay);
        self
    }

    pub(crate) fn fail_complete(self, times: u32) -> Self {
        self.complete_failures.store(times, Ordering::SeqCst);
        self
    }

    pub(crate) fn with_complete_code(mut self, code: i64) -> Self {
        self.complete_code = code;
        self
    }

    pub(crate) fn pre_upload_calls(&self) -> u32 {
        self.pre_upload_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn init_calls(&self) -> u32 {
        self.init_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn put_attempts(&self, part: u32) -> usize {
        self.put_attempts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| **p == part)
            .count()
    }

    pub(crate) fn total_put_attempts(&self) -> usize {
        self.put_attempts.lock().unwrap().len()
    }

    /// Accepted part numbers in completion order.
    pub(crate) fn accepted(&self) -> Vec<u32> {
        self.accepted.lock().unwrap().clone()
    }

    pub(crate) fn completes(&self) -> Vec<CompleteUploadRequest> {
        self.completes.lock().unwrap().clone()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl UposTransport for MockTransport {
    fn pre_upload(&self, _query: &PreUploadQuery) -> TransportFuture<'_, PreUploadResponse> {
        self.pre_upload_calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            if self.pre_upload_fails {
                Err(server_error())
            } else {
                Ok(self.pre_upload.clone())
            }
        })
    }

    fn init_upload(
        &self,
        _base_url: &str,
        _auth: &str,
        _query: &InitUploadQuery,
    ) -> TransportFuture<'_, InitUploadResponse> {
        self.init_calls.fetch_add(1, Ordering::SeqCst);
        Box::pin(async move {
            Ok(InitUploadResponse {
                ok: 1,
                upload_id: self.upload_id.clone(),
                ..Default::default()
            })
        })
    }

    fn put_chunk(
        &self,
        _session: &UploadSession,
        chunk: &Chunk,
    ) -> TransportFuture<'_, ChunkReceipt> {
        let part = chunk.part_number();
        self.put_attempts.lock().unwrap().push(part);
        let delay = self.chunk_delays.get(&part).copied();

        Box::pin(async move {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            // Yield so sibling workers overlap even without delays.
            tokio::task::yield_now().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let fail = {
                let mut failures = self.chunk_failures.lock().unwrap();
                match failures.get_mut(&part) {
                    Some(n) if *n > 0 => {
                        *n -= 1;
                        true
                    }
                    _ => false,
                }
            };
            if fail {
                return Err(server_error());
            }

            self.accepted.lock().unwrap().push(part);
            Ok(ChunkReceipt {
                etag: Some(format!("tag-{part}")),
            })
        })
    }

    fn complete_upload(
        &self,
        _session: &UploadSession,
        request: &CompleteUploadRequest,
    ) -> TransportFuture<'_, CompleteUploadResponse> {
        self.completes.lock().unwrap().push(request.clone());
        Box::pin(async move {
            let remaining = self.complete_failures.load(Ordering::SeqCst);
            if remaining > 0 {
                self.complete_failures.store(remaining - 1, Ordering::SeqCst);
                return Err(server_error());
            }
            Ok(CompleteUploadResponse {
                ok: self.complete_code,
                location: "upos://ugcboss/n1.mp4".into(),
                ..Default::default()
            })
        })
    }
}
