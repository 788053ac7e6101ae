//! Runtime configuration.
//!
//! Layered, later layers win: built-in defaults, then
//! `<config dir>/config.toml`, then `NEXTSTEP_*` environment variables, then
//! command-line flags (applied by the binary through [`Config::with_overrides`]).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

use crate::error::{ApiError, Result};

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8000/api";
pub const DEFAULT_MOCK_LATENCY_MS: u64 = 300;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// In-memory fixture store
    #[default]
    Mock,
    /// REST backend
    Http,
}

impl FromStr for Backend {
    type Err = ApiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mock" => Ok(Backend::Mock),
            "http" | "rest" => Ok(Backend::Http),
            other => Err(ApiError::Config(format!(
                "Unknown backend '{}'. Available: mock, http",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub backend: Backend,
    pub api_url: String,
    pub mock_latency_ms: u64,
    pub request_timeout_secs: u64,
    pub data_dir: PathBuf,
}

/// The TOML file layer; every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    backend: Option<Backend>,
    api_url: Option<String>,
    mock_latency_ms: Option<u64>,
    request_timeout_secs: Option<u64>,
    data_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            backend: Backend::Mock,
            api_url: DEFAULT_API_URL.to_string(),
            mock_latency_ms: DEFAULT_MOCK_LATENCY_MS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            data_dir: default_data_dir(),
        }
    }
}

impl Config {
    /// Load from the platform config file and the process environment.
    pub fn load() -> Result<Self> {
        let path = config_path();
        Self::load_from(path.as_deref(), |key| std::env::var(key).ok())
    }

    /// `path` may point at a file that does not exist; that layer is then skipped.
    pub fn load_from(path: Option<&Path>, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = path.filter(|p| p.exists()) {
            let text = std::fs::read_to_string(path)?;
            let file: FileConfig = toml::from_str(&text)
                .map_err(|e| ApiError::Config(format!("{}: {}", path.display(), e)))?;
            debug!(path = %path.display(), "read config file");
            config.apply_file(file);
        }

        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.request_timeout_secs == 0 {
            return Err(ApiError::Config(
                "request_timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    fn apply_file(&mut self, file: FileConfig) {
        if let Some(backend) = file.backend {
            self.backend = backend;
        }
        if let Some(url) = file.api_url {
            self.api_url = url;
        }
        if let Some(ms) = file.mock_latency_ms {
            self.mock_latency_ms = ms;
        }
        if let Some(secs) = file.request_timeout_secs {
            self.request_timeout_secs = secs;
        }
        if let Some(dir) = file.data_dir {
            self.data_dir = dir;
        }
    }

    fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<()> {
        let var = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(backend) = var("NEXTSTEP_BACKEND") {
            self.backend = backend.parse()?;
        }
        if let Some(url) = var("NEXTSTEP_API_URL") {
            self.api_url = url;
        }
        if let Some(ms) = var("NEXTSTEP_MOCK_LATENCY_MS") {
            self.mock_latency_ms = ms.trim().parse().map_err(|_| {
                ApiError::Config(format!("NEXTSTEP_MOCK_LATENCY_MS must be a number, got '{}'", ms))
            })?;
        }
        if let Some(secs) = var("NEXTSTEP_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = secs.trim().parse().map_err(|_| {
                ApiError::Config(format!(
                    "NEXTSTEP_REQUEST_TIMEOUT_SECS must be a number, got '{}'",
                    secs
                ))
            })?;
        }
        if let Some(dir) = var("NEXTSTEP_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    pub fn with_overrides(mut self, backend: Option<Backend>, api_url: Option<String>) -> Self {
        if let Some(backend) = backend {
            self.backend = backend;
        }
        if let Some(url) = api_url {
            self.api_url = url;
        }
        self
    }

    /// Where the mock backend persists its collections between runs.
    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join("store.json")
    }

    pub fn session_path(&self) -> PathBuf {
        self.data_dir.join("session.json")
    }
}

pub fn config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "nextstep").map(|dirs| dirs.config_dir().join("config.toml"))
}

fn default_data_dir() -> PathBuf {
    match directories::ProjectDirs::from("", "", "nextstep") {
        Some(dirs) => dirs.data_dir().to_path_buf(),
        None => PathBuf::from(".nextstep"),
    }
}
