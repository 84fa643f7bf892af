use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use url::Url;

/// 200 MiB, the service's master upload cap.
pub const DEFAULT_MAX_MASTER_UPLOAD_BYTES: u64 = 200 * 1024 * 1024;

/// Caller-side retry parameters (optional section in config.toml).
/// The client itself never retries; the CLI uses these for `--retries`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per request (including the first).
    pub max_attempts: u32,
    /// Base delay in seconds for exponential backoff (e.g. 0.25 = 250ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_secs: 0.5,
            max_delay_secs: 30,
        }
    }
}

/// HTTP transport tuning (optional `[http]` section).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    pub connect_timeout_secs: u64,
    /// Whole-request timeout; large master uploads need a generous value.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 30,
            timeout_secs: 300,
            user_agent: concat!("assetsync/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Client configuration loaded from `~/.config/assetsync/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Root of the asset service REST API.
    pub base_url: String,
    /// Worker slots in the transfer scheduler.
    pub max_concurrent_transfers: usize,
    /// Master uploads above this size are rejected before any network call.
    pub max_master_upload_bytes: u64,
    /// Maximum number of cached renditions (None = unbounded).
    #[serde(default)]
    pub cache_capacity: Option<usize>,
    /// Where rendition bytes are cached (None = XDG cache dir).
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Minimum progress fraction change between updates.
    #[serde(default = "default_progress_step")]
    pub progress_step: f64,
    #[serde(default)]
    pub http: Option<HttpConfig>,
    #[serde(default)]
    pub retry: Option<RetryConfig>,
}

fn default_progress_step() -> f64 {
    0.01
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8080/".to_string(),
            max_concurrent_transfers: 4,
            max_master_upload_bytes: DEFAULT_MAX_MASTER_UPLOAD_BYTES,
            cache_capacity: Some(512),
            cache_dir: None,
            progress_step: default_progress_step(),
            http: None,
            retry: None,
        }
    }
}

impl ClientConfig {
    /// Parse and sanity-check the config; returns the parsed base URL.
    pub fn validate(&self) -> Result<Url> {
        let url = Url::parse(&self.base_url)
            .with_context(|| format!("invalid base_url {:?}", self.base_url))?;
        if !matches!(url.scheme(), "http" | "https") {
            anyhow::bail!("base_url must be http or https, got {}", url.scheme());
        }
        if url.cannot_be_a_base() {
            anyhow::bail!("base_url cannot be used as a base: {}", self.base_url);
        }
        if self.max_concurrent_transfers == 0 {
            anyhow::bail!("max_concurrent_transfers must be at least 1");
        }
        if !(0.0..=1.0).contains(&self.progress_step) {
            anyhow::bail!("progress_step must be within [0, 1]");
        }
        Ok(url)
    }

    pub fn http_or_default(&self) -> HttpConfig {
        self.http.clone().unwrap_or_default()
    }

    pub fn retry_or_default(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }

    /// Configured cache dir, or `~/.cache/assetsync/renditions`.
    pub fn resolved_cache_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.cache_dir {
            return Ok(dir.clone());
        }
        let xdg_dirs = xdg::BaseDirectories::with_prefix("assetsync")?;
        Ok(xdg_dirs.get_cache_home().join("assetsync").join("renditions"))
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("assetsync")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<ClientConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = ClientConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from(&path)
}

pub fn load_from(path: &Path) -> Result<ClientConfig> {
    let data = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: ClientConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
