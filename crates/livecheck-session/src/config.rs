use std::path::PathBuf;
use std::time::Duration;

use livecheck_core::{LivenessConfig, LivenessConfigError};
use thiserror::Error;

/// Default poll interval. Landmark detection runs once per tick, so the
/// interval bounds its CPU cost.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 200;
pub const DEFAULT_SELFIE_JPEG_QUALITY: u8 = 90;
pub const DEFAULT_SUBMIT_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("poll interval must be greater than zero")]
    ZeroPollInterval,
    #[error(transparent)]
    Liveness(#[from] LivenessConfigError),
}

/// Per-session settings.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Time between detection ticks.
    pub poll_interval: Duration,
    /// JPEG quality of the captured selfie, 1..=100.
    pub selfie_jpeg_quality: u8,
    pub liveness: LivenessConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            selfie_jpeg_quality: DEFAULT_SELFIE_JPEG_QUALITY,
            liveness: LivenessConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval.is_zero() {
            return Err(ConfigError::ZeroPollInterval);
        }
        self.liveness.validate()?;
        Ok(())
    }
}

/// Process configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub session: SessionConfig,
    /// Directory holding the landmark model assets and their manifest.
    pub model_dir: PathBuf,
    /// Base URL of the verification backend.
    pub api_base_url: Option<String>,
    /// Bearer token sent with submissions.
    pub api_token: Option<String>,
    /// Timeout in seconds for one submission request.
    pub submit_timeout_secs: u64,
}

impl Config {
    /// Load configuration from `LIVECHECK_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("LIVECHECK_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_model_dir());

        let quality = env_u64("LIVECHECK_SELFIE_JPEG_QUALITY", DEFAULT_SELFIE_JPEG_QUALITY as u64)
            .clamp(1, 100) as u8;

        Self {
            session: SessionConfig {
                poll_interval: Duration::from_millis(env_u64(
                    "LIVECHECK_POLL_INTERVAL_MS",
                    DEFAULT_POLL_INTERVAL_MS,
                )),
                selfie_jpeg_quality: quality,
                liveness: LivenessConfig::default(),
            },
            model_dir,
            api_base_url: env_string("LIVECHECK_API_BASE_URL"),
            api_token: env_string("LIVECHECK_API_TOKEN"),
            submit_timeout_secs: env_u64("LIVECHECK_SUBMIT_TIMEOUT_SECS", DEFAULT_SUBMIT_TIMEOUT_SECS),
        }
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_secs(self.submit_timeout_secs)
    }
}

/// `$XDG_DATA_HOME/livecheck/models`, falling back to `~/.local/share`.
pub fn default_model_dir() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".local/share")
        })
        .join("livecheck/models")
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
