//! Bounded-concurrency chunk transfer.
//!
//! Each chunk runs as its own task in a per-upload [`JoinSet`]. A
//! semaphore permit is taken before a task is spawned and released when
//! it ends, so at most `workers` chunks are in flight and the producer
//! holds at most one more chunk in memory.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::AsyncRead;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};
use tokio::task::{JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use vidup_transfer::{
    Chunk, ChunkSource, NoopObserver, PartLedger, PartRecord, ProgressObserver, RetryOperation,
    UploadSession,
};

use crate::error::UploadError;
use crate::retry::{RetryFailure, RetryPolicy, with_retry};
use crate::transport::UposTransport;

/// Default worker count.
pub const DEFAULT_WORKERS: usize = 3;

/// State every chunk task reads.
struct WorkerContext {
    transport: Arc<dyn UposTransport>,
    session: Arc<UploadSession>,
    ledger: Arc<PartLedger>,
    observer: Arc<dyn ProgressObserver>,
    policy: RetryPolicy,
    cancel: CancellationToken,
    transferred: Arc<AtomicU64>,
}

/// Dispatches chunks of one upload to at most `workers` concurrent tasks.
pub struct TransferPool {
    transport: Arc<dyn UposTransport>,
    session: Arc<UploadSession>,
    ledger: Arc<PartLedger>,
    observer: Arc<dyn ProgressObserver>,
    policy: RetryPolicy,
    cancel: CancellationToken,
    transferred: Arc<AtomicU64>,
    /// Snapshot of the settings above, shared by spawned tasks. Dropped
    /// whenever a setting changes so later chunks pick up the new value.
    ctx: Option<Arc<WorkerContext>>,
    permits: Arc<Semaphore>,
    tasks: JoinSet<Result<(), UploadError>>,
    workers: usize,
    submitted: u32,
}

enum Wake {
    Cancelled,
    Joined(Option<Result<Result<(), UploadError>, JoinError>>),
    Permit(Result<OwnedSemaphorePermit, AcquireError>),
}

impl TransferPool {
    /// Creates a pool writing completions into `ledger`. A worker count of
    /// 0 is raised to 1.
    pub fn new(
        transport: Arc<dyn UposTransport>,
        session: Arc<UploadSession>,
        ledger: Arc<PartLedger>,
        workers: usize,
    ) -> Self {
        let workers = workers.max(1);
        Self {
            transport,
            session,
            ledger,
            observer: Arc::new(NoopObserver),
            policy: RetryPolicy::default(),
            cancel: CancellationToken::new(),
            transferred: Arc::new(AtomicU64::new(0)),
            ctx: None,
            permits: Arc::new(Semaphore::new(workers)),
            tasks: JoinSet::new(),
            workers,
            submitted: 0,
        }
    }

    /// Applies to chunks submitted after this call.
    pub fn with_retry(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self.ctx = None;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self.ctx = None;
        self
    }

    /// Cancelling `cancel` aborts queued and in-flight chunks.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self.ctx = None;
        self
    }

    fn context(&mut self) -> Arc<WorkerContext> {
        if let Some(ctx) = &self.ctx {
            return Arc::clone(ctx);
        }
        let ctx = Arc::new(WorkerContext {
            transport: Arc::clone(&self.transport),
            session: Arc::clone(&self.session),
            ledger: Arc::clone(&self.ledger),
            observer: Arc::clone(&self.observer),
            policy: self.policy.clone(),
            cancel: self.cancel.clone(),
            transferred: Arc::clone(&self.transferred),
        });
        self.ctx = Some(Arc::clone(&ctx));
        ctx
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Chunks accepted so far via [`submit`](Self::submit).
    pub fn submitted(&self) -> u32 {
        self.submitted
    }

    /// Bytes of chunks the server has accepted.
    pub fn transferred(&self) -> u64 {
        self.transferred.load(Ordering::SeqCst)
    }

    /// Waits for a free worker and starts transferring `chunk`.
    ///
    /// Returns as soon as the chunk's task is spawned. A chunk that has
    /// already failed or a cancellation surfaces here, aborting every
    /// in-flight task.
    pub async fn submit(&mut self, chunk: Chunk) -> Result<(), UploadError> {
        self.reap()?;

        let permit = loop {
            let wake = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Wake::Cancelled,
                joined = self.tasks.join_next(), if !self.tasks.is_empty() => Wake::Joined(joined),
                permit = Arc::clone(&self.permits).acquire_owned() => Wake::Permit(permit),
            };
            match wake {
                Wake::Cancelled => return Err(self.abort(UploadError::Cancelled)),
                Wake::Joined(Some(joined)) => self.settle(joined)?,
                Wake::Joined(None) => {}
                Wake::Permit(permit) => {
                    break permit.map_err(|_| UploadError::Worker("worker pool closed".into()))?;
                }
            }
        };

        let ctx = self.context();
        debug!(chunk = chunk.index, offset = chunk.offset, bytes = chunk.length, "dispatching chunk");
        self.tasks.spawn(async move {
            let _permit = permit;
            transfer_chunk(&ctx, chunk).await
        });
        self.submitted += 1;
        Ok(())
    }

    /// Join barrier: waits for every submitted chunk.
    ///
    /// Returns the number of bytes transferred. The first failure aborts
    /// the remaining tasks and is returned.
    pub async fn join(mut self) -> Result<u64, UploadError> {
        loop {
            let joined = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                joined = self.tasks.join_next() => Some(joined),
            };
            match joined {
                None => return Err(self.abort(UploadError::Cancelled)),
                Some(Some(joined)) => self.settle(joined)?,
                Some(None) => break,
            }
        }

        let transferred = self.transferred();
        info!(
            chunks = self.submitted,
            bytes = transferred,
            "all chunks transferred"
        );
        Ok(transferred)
    }

    /// Reads `source` to the end, submitting every chunk, then joins.
    ///
    /// A read error stops dispatch and aborts in-flight chunks.
    pub async fn transfer_all<R>(mut self, source: &mut ChunkSource<R>) -> Result<u64, UploadError>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            let chunk = match source.next_chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => return Err(self.abort(e.into())),
            };
            self.submit(chunk).await?;
        }
        self.join().await
    }

    /// Collects tasks that have already finished without waiting.
    fn reap(&mut self) -> Result<(), UploadError> {
        while let Some(joined) = self.tasks.try_join_next() {
            self.settle(joined)?;
        }
        Ok(())
    }

    fn settle(&mut self, joined: Result<Result<(), UploadError>, JoinError>) -> Result<(), UploadError> {
        let result = match joined {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(UploadError::Cancelled),
            Err(e) => Err(UploadError::Worker(e.to_string())),
        };
        result.map_err(|e| self.abort(e))
    }

    fn abort(&mut self, err: UploadError) -> UploadError {
        if !self.tasks.is_empty() {
            debug!(in_flight = self.tasks.len(), "aborting in-flight chunks");
        }
        self.tasks.abort_all();
        err
    }
}

/// Sends one chunk with retry and records it on success.
async fn transfer_chunk(ctx: &WorkerContext, chunk: Chunk) -> Result<(), UploadError> {
    let index = chunk.index;
    let result = with_retry(
        &ctx.policy,
        RetryOperation::Chunk { index },
        ctx.observer.as_ref(),
        &ctx.cancel,
        || ctx.transport.put_chunk(&ctx.session, &chunk),
    )
    .await;

    match result {
        Ok(receipt) => {
            ctx.ledger
                .record(PartRecord::new(chunk.part_number(), receipt.into_tag()));
            let len = chunk.length as u64;
            let done = ctx.transferred.fetch_add(len, Ordering::SeqCst) + len;
            debug!(chunk = index, bytes = len, transferred = done, "chunk complete");
            ctx.observer.on_progress(done, ctx.session.total_size());
            Ok(())
        }
        Err(RetryFailure::Exhausted { attempts, source }) => {
            error!(chunk = index, attempts, error = %source, "chunk failed");
            Err(UploadError::ChunkTransfer {
                index,
                attempts,
                source,
            })
        }
        Err(RetryFailure::Cancelled) => Err(UploadError::Cancelled),
    }
}
