use std::collections::VecDeque;
use std::fmt;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::UploadState;

/// What was being retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOperation {
    /// A chunk PUT, by 0-based chunk index.
    Chunk { index: u32 },
    /// The finalize POST.
    Finalize,
}

impl fmt::Display for RetryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chunk { index } => write!(f, "chunk {index}"),
            Self::Finalize => f.write_str("finalize"),
        }
    }
}

/// A failed attempt that is about to be retried.
#[derive(Debug, Clone)]
pub struct RetryEvent {
    pub operation: RetryOperation,
    /// 1-based attempt that just failed.
    pub attempt: u32,
    pub max_attempts: u32,
    pub error: String,
}

/// Receives lifecycle, progress and retry notifications from an upload.
///
/// Called from worker tasks; implementations must be cheap and must not
/// block. All methods default to no-ops.
pub trait ProgressObserver: Send + Sync {
    fn on_state(&self, _state: UploadState) {}

    /// `transferred` counts bytes of chunks that have been accepted.
    fn on_progress(&self, _transferred: u64, _total: u64) {}

    fn on_retry(&self, _event: &RetryEvent) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

// ---------------------------------------------------------------------------
// LogObserver
// ---------------------------------------------------------------------------

/// Observer that reports through `tracing`, with throughput and ETA.
///
/// Used where no interactive progress display is available.
pub struct LogObserver {
    window: ThroughputWindow,
}

impl LogObserver {
    pub fn new() -> Self {
        Self {
            window: ThroughputWindow::new(DEFAULT_WINDOW),
        }
    }
}

impl Default for LogObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for LogObserver {
    fn on_state(&self, state: UploadState) {
        if state == UploadState::Transferring {
            self.window.reset();
        }
        info!(%state, "upload state");
    }

    fn on_progress(&self, transferred: u64, total: u64) {
        self.window.record(transferred);

        let pct = if total == 0 {
            100.0
        } else {
            transferred as f64 * 100.0 / total as f64
        };
        let eta = self.window.eta(total.saturating_sub(transferred));
        info!(
            transferred,
            total,
            percent = format_args!("{pct:.1}"),
            speed_bps = self.window.bytes_per_second() as u64,
            eta_secs = eta.map(|d| d.as_secs()),
            "upload progress"
        );
    }

    fn on_retry(&self, event: &RetryEvent) {
        debug!(
            operation = %event.operation,
            attempt = event.attempt,
            max_attempts = event.max_attempts,
            error = %event.error,
            "retrying"
        );
    }
}

// ---------------------------------------------------------------------------
// ThroughputWindow
// ---------------------------------------------------------------------------

/// Span of history the throughput estimate is taken over.
pub const DEFAULT_WINDOW: Duration = Duration::from_secs(5);

/// Throughput over a sliding time window of cumulative byte positions.
///
/// Positions are the running `transferred` totals reported to
/// [`ProgressObserver::on_progress`]; the rate is the growth between the
/// oldest and newest position still inside the window.
pub struct ThroughputWindow {
    window: Duration,
    points: Mutex<VecDeque<(Instant, u64)>>,
}

impl ThroughputWindow {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            points: Mutex::new(VecDeque::new()),
        }
    }

    /// Records the running total at the current instant.
    pub fn record(&self, transferred: u64) {
        self.record_at(transferred, Instant::now());
    }

    pub fn record_at(&self, transferred: u64, at: Instant) {
        let mut points = self.points.lock().unwrap_or_else(|e| e.into_inner());
        points.push_back((at, transferred));
        // Keep one point at or before the window start as the baseline.
        while points.len() > 2 && at.duration_since(points[1].0) >= self.window {
            points.pop_front();
        }
    }

    /// Bytes/second across the window. 0.0 until two points exist.
    pub fn bytes_per_second(&self) -> f64 {
        let points = self.points.lock().unwrap_or_else(|e| e.into_inner());
        let (Some(&(t0, b0)), Some(&(t1, b1))) = (points.front(), points.back()) else {
            return 0.0;
        };
        let elapsed = t1.duration_since(t0);
        if elapsed.is_zero() {
            return 0.0;
        }
        b1.saturating_sub(b0) as f64 / elapsed.as_secs_f64()
    }

    /// Time to send `remaining_bytes` at the current rate, or `None` while
    /// the rate is unknown.
    pub fn eta(&self, remaining_bytes: u64) -> Option<Duration> {
        let rate = self.bytes_per_second();
        (rate > 0.0).then(|| Duration::from_secs_f64(remaining_bytes as f64 / rate))
    }

    pub fn reset(&self) {
        self.points
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.points.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}
