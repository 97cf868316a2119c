//! Command line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use vidup_upload::VideoMetadata;

use crate::config::Overrides;

#[derive(Parser, Debug)]
#[command(name = "vidup")]
#[command(about = "Chunked video uploader")]
#[command(version)]
pub struct Cli {
    /// Config file path (default: platform config directory)
    #[arg(long, global = true, env = "VIDUP_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload a video and optionally publish it
    Upload(UploadArgs),
    /// Check that the saved cookie is still logged in
    Whoami {
        #[command(flatten)]
        session: SessionArgs,
    },
    /// Print the effective configuration
    Config {
        #[command(flatten)]
        session: SessionArgs,
    },
}

/// Flags shared by every command that talks to the service.
#[derive(Args, Debug, Clone, Default)]
pub struct SessionArgs {
    /// Cookie JSON written by the login flow
    #[arg(long, env = "VIDUP_COOKIE")]
    pub cookie: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct UploadArgs {
    /// Video file to upload
    pub path: PathBuf,

    #[command(flatten)]
    pub session: SessionArgs,

    /// Concurrent chunk uploads
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Upload profile
    #[arg(long)]
    pub profile: Option<String>,

    /// Attempts per chunk and for finalize
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Pause after the first failed attempt, doubling up to 10s
    #[arg(long)]
    pub retry_delay_ms: Option<u64>,

    /// Stop after the upload is committed
    #[arg(long)]
    pub no_publish: bool,

    /// Log progress lines instead of drawing a progress bar
    #[arg(long)]
    pub no_progress: bool,

    /// Title (default: file name without extension)
    #[arg(long)]
    pub title: Option<String>,

    /// Description
    #[arg(long, default_value = "")]
    pub desc: String,

    /// Category id
    #[arg(long, default_value_t = 0)]
    pub tid: i64,

    /// Comma-separated tags
    #[arg(long, default_value = "")]
    pub tag: String,

    /// Cover image, local path or http(s) URL
    #[arg(long, default_value = "")]
    pub cover: String,

    /// Mark as repost; requires --source
    #[arg(long, requires = "source")]
    pub repost: bool,

    /// Source URL for reposts
    #[arg(long)]
    pub source: Option<String>,
}

impl SessionArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            cookie_path: self.cookie.clone(),
            request_timeout_secs: self.timeout,
            ..Overrides::default()
        }
    }
}

impl UploadArgs {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            workers: self.workers,
            profile: self.profile.clone(),
            max_attempts: self.max_attempts,
            retry_delay_ms: self.retry_delay_ms,
            ..self.session.overrides()
        }
    }

    /// Publish metadata, or `None` with `--no-publish`.
    pub fn metadata(&self) -> Option<VideoMetadata> {
        if self.no_publish {
            return None;
        }
        let title = self.title.clone().unwrap_or_else(|| {
            self.path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
        Some(VideoMetadata {
            title,
            desc: self.desc.clone(),
            copyright: if self.repost { 2 } else { 1 },
            tid: self.tid,
            tag: self.tag.clone(),
            source: self.source.clone().unwrap_or_default(),
            cover: self.cover.clone(),
        })
    }
}
