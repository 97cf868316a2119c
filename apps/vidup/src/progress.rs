//! Terminal progress rendering.

use std::io::IsTerminal;
use std::sync::Arc;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use vidup_transfer::{LogObserver, ProgressObserver, RetryEvent, UploadState};

const BAR_TEMPLATE: &str =
    "{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta}) {msg}";

/// How upload progress is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressMode {
    /// Interactive indicatif bar on stderr.
    Bar,
    /// `tracing` lines with throughput and ETA.
    Log,
}

impl ProgressMode {
    /// The bar needs a terminal; redirected output and `--no-progress`
    /// get log lines.
    pub fn select(no_progress: bool, stderr_is_terminal: bool) -> Self {
        if no_progress || !stderr_is_terminal {
            Self::Log
        } else {
            Self::Bar
        }
    }

    pub fn observer(self) -> Arc<dyn ProgressObserver> {
        match self {
            Self::Bar => Arc::new(BarObserver::new()),
            Self::Log => Arc::new(LogObserver::new()),
        }
    }
}

pub fn stderr_is_terminal() -> bool {
    std::io::stderr().is_terminal()
}

/// Progress observer backed by an indicatif bar.
///
/// The bar length is set from the first progress report, since the file
/// size is only known once the session is negotiated.
pub struct BarObserver {
    pb: ProgressBar,
}

impl BarObserver {
    pub fn new() -> Self {
        Self::with_target(ProgressDrawTarget::stderr())
    }

    #[cfg(test)]
    fn hidden() -> Self {
        Self::with_target(ProgressDrawTarget::hidden())
    }

    fn with_target(target: ProgressDrawTarget) -> Self {
        let pb = ProgressBar::with_draw_target(Some(0), target);
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        pb.set_style(style);
        Self { pb }
    }

    #[cfg(test)]
    fn bar(&self) -> &ProgressBar {
        &self.pb
    }
}

impl Default for BarObserver {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for BarObserver {
    fn on_state(&self, state: UploadState) {
        match state {
            UploadState::Committed => self.pb.finish_with_message(state.to_string()),
            UploadState::Published => self.pb.println("published"),
            UploadState::Failed => self.pb.abandon_with_message(state.to_string()),
            _ => self.pb.set_message(state.to_string()),
        }
    }

    fn on_progress(&self, transferred: u64, total: u64) {
        if self.pb.length() != Some(total) {
            self.pb.set_length(total);
        }
        self.pb.set_position(transferred);
    }

    fn on_retry(&self, event: &RetryEvent) {
        self.pb.println(format!(
            "retrying {} ({}/{}): {}",
            event.operation, event.attempt, event.max_attempts, event.error
        ));
    }
}
