//! Uploader configuration.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/vidup/config.toml`
//! - Windows: `%APPDATA%/vidup/config.toml`
//!
//! Command line flags override file values through [`Overrides`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use vidup_protocol::constants::{
    COVER_UPLOAD_URL, DEFAULT_UPLOAD_SCHEME, MEMBER_ORIGIN, NAV_URL, PREUPLOAD_URL, PUBLISH_URL,
    UPLOAD_PROFILE,
};
use vidup_upload::{DEFAULT_MAX_ATTEMPTS, DEFAULT_WORKERS, Endpoints, RetryPolicy};

/// Uploader configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Cookie JSON written by the login flow.
    #[serde(default = "default_cookie_path")]
    pub cookie_path: String,

    /// Concurrent chunk uploads.
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Upload profile sent on pre-upload.
    #[serde(default = "default_profile")]
    pub profile: String,

    /// Attempts per chunk and for finalize, including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Pause after the first failed attempt; 0 retries immediately.
    #[serde(default)]
    pub retry_delay_ms: u64,

    /// Per-request timeout. Unset means no timeout.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,

    #[serde(default)]
    pub endpoints: EndpointConfig,
}

/// Remote endpoints, overridable for staging or local test servers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_preupload_url")]
    pub preupload_url: String,
    #[serde(default = "default_nav_url")]
    pub nav_url: String,
    #[serde(default = "default_cover_upload_url")]
    pub cover_upload_url: String,
    #[serde(default = "default_publish_url")]
    pub publish_url: String,
    #[serde(default = "default_member_origin")]
    pub member_origin: String,
    #[serde(default = "default_upload_scheme")]
    pub upload_scheme: String,
}

fn default_cookie_path() -> String {
    "cookie.json".into()
}

fn default_workers() -> usize {
    DEFAULT_WORKERS
}

fn default_profile() -> String {
    UPLOAD_PROFILE.into()
}

fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

fn default_preupload_url() -> String {
    PREUPLOAD_URL.into()
}

fn default_nav_url() -> String {
    NAV_URL.into()
}

fn default_cover_upload_url() -> String {
    COVER_UPLOAD_URL.into()
}

fn default_publish_url() -> String {
    PUBLISH_URL.into()
}

fn default_member_origin() -> String {
    MEMBER_ORIGIN.into()
}

fn default_upload_scheme() -> String {
    DEFAULT_UPLOAD_SCHEME.into()
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            preupload_url: default_preupload_url(),
            nav_url: default_nav_url(),
            cover_upload_url: default_cover_upload_url(),
            publish_url: default_publish_url(),
            member_origin: default_member_origin(),
            upload_scheme: default_upload_scheme(),
        }
    }
}

impl From<EndpointConfig> for Endpoints {
    fn from(c: EndpointConfig) -> Self {
        Self {
            preupload_url: c.preupload_url,
            nav_url: c.nav_url,
            cover_upload_url: c.cover_upload_url,
            publish_url: c.publish_url,
            member_origin: c.member_origin,
            upload_scheme: c.upload_scheme,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cookie_path: default_cookie_path(),
            workers: default_workers(),
            profile: default_profile(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: 0,
            request_timeout_secs: None,
            endpoints: EndpointConfig::default(),
        }
    }
}

/// Values given on the command line. `None` keeps the file value.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub cookie_path: Option<String>,
    pub workers: Option<usize>,
    pub profile: Option<String>,
    pub max_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub request_timeout_secs: Option<u64>,
}

impl Config {
    /// Loads configuration from `path`, or from the platform default
    /// location (created with defaults if not found).
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = config_path()?;
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    let config = Config::default();
                    config.save_to(&path)?;
                    Ok(config)
                }
            }
        }
    }

    /// Reads an explicit configuration file. Missing files are an error.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Writes the configuration to `path`.
    pub fn save_to(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Applies command line values on top of the file values.
    pub fn with_overrides(mut self, o: Overrides) -> Self {
        if let Some(v) = o.cookie_path {
            self.cookie_path = v;
        }
        if let Some(v) = o.workers {
            self.workers = v;
        }
        if let Some(v) = o.profile {
            self.profile = v;
        }
        if let Some(v) = o.max_attempts {
            self.max_attempts = v;
        }
        if let Some(v) = o.retry_delay_ms {
            self.retry_delay_ms = v;
        }
        if let Some(v) = o.request_timeout_secs {
            self.request_timeout_secs = Some(v);
        }
        self
    }

    /// Rejects values the engine cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.workers == 0 {
            bail!("workers must be at least 1");
        }
        if self.max_attempts == 0 {
            bail!("max_attempts must be at least 1");
        }
        if self.profile.is_empty() {
            bail!("profile must not be empty");
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts,
            initial_delay: Duration::from_millis(self.retry_delay_ms),
            ..RetryPolicy::default()
        }
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    pub fn endpoints(&self) -> Endpoints {
        self.endpoints.clone().into()
    }
}

/// Returns the platform-specific configuration file path.
pub fn config_path() -> anyhow::Result<PathBuf> {
    #[cfg(target_os = "linux")]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        Ok(PathBuf::from(home)
            .join(".config")
            .join("vidup")
            .join("config.toml"))
    }

    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        Ok(PathBuf::from(appdata).join("vidup").join("config.toml"))
    }

    #[cfg(not(any(target_os = "linux", target_os = "windows")))]
    {
        Ok(PathBuf::from("/tmp/vidup/config.toml"))
    }
}
