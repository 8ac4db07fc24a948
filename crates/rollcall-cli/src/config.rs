use anyhow::{Context, Result};
use rollcall_core::controller::{DEFAULT_PACING, DEFAULT_TARGET_COUNT};
use rollcall_core::{CaptureError, CapturePolicy};
use rollcall_hw::WorkerConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Console configuration: defaults, then the TOML file, then `ROLLCALL_*`
/// environment variables. Command-line flags are applied by the caller.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Base URL of the attendance service.
    pub api_url: String,
    /// V4L2 device path.
    pub camera_device: String,
    pub width: u32,
    pub height: u32,
    /// Number of stills an enrollment needs.
    pub required_images: usize,
    /// Capture attempts allowed per enrollment; 0 means one per image.
    pub max_attempts: usize,
    /// Delay between capture attempts.
    pub capture_interval_ms: u64,
    /// Per-attempt camera timeout; 0 disables it.
    pub attempt_timeout_ms: u64,
    /// Frames discarded after opening the camera.
    pub warmup_frames: usize,
    pub jpeg_quality: u8,
    pub http_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: rollcall_api::DEFAULT_BASE_URL.to_string(),
            camera_device: "/dev/video0".to_string(),
            width: 720,
            height: 480,
            required_images: DEFAULT_TARGET_COUNT,
            max_attempts: 0,
            capture_interval_ms: DEFAULT_PACING.as_millis() as u64,
            attempt_timeout_ms: 5000,
            warmup_frames: 4,
            jpeg_quality: 90,
            http_timeout_secs: 30,
        }
    }
}

impl Config {
    /// Load from the config file (if any) and the process environment.
    pub fn load() -> Result<Self> {
        let mut config = match config_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = toml::from_str(&text)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        tracing::debug!(path = %path.display(), "loaded config file");
        Ok(config)
    }

    /// Override fields from `ROLLCALL_*` variables. Values that fail to
    /// parse leave the current setting in place.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("ROLLCALL_API_URL") {
            self.api_url = url;
        }
        if let Some(device) = lookup("ROLLCALL_CAMERA_DEVICE") {
            self.camera_device = device;
        }
        self.required_images = env_parse(&lookup, "ROLLCALL_REQUIRED_IMAGES", self.required_images);
        self.max_attempts = env_parse(&lookup, "ROLLCALL_MAX_ATTEMPTS", self.max_attempts);
        self.capture_interval_ms =
            env_parse(&lookup, "ROLLCALL_CAPTURE_INTERVAL_MS", self.capture_interval_ms);
        self.attempt_timeout_ms =
            env_parse(&lookup, "ROLLCALL_ATTEMPT_TIMEOUT_MS", self.attempt_timeout_ms);
        self.warmup_frames = env_parse(&lookup, "ROLLCALL_WARMUP_FRAMES", self.warmup_frames);
        self.jpeg_quality = env_parse(&lookup, "ROLLCALL_JPEG_QUALITY", self.jpeg_quality);
        self.http_timeout_secs =
            env_parse(&lookup, "ROLLCALL_HTTP_TIMEOUT_SECS", self.http_timeout_secs);
    }

    /// Capture policy for an enrollment session.
    pub fn capture_policy(&self) -> Result<CapturePolicy, CaptureError> {
        let mut policy = CapturePolicy::new(self.required_images)?
            .with_pacing(Duration::from_millis(self.capture_interval_ms));
        if self.max_attempts > 0 {
            policy = policy.with_max_attempts(self.max_attempts)?;
        }
        if self.attempt_timeout_ms > 0 {
            policy = policy.with_attempt_timeout(Duration::from_millis(self.attempt_timeout_ms));
        }
        Ok(policy)
    }

    pub fn worker_config(&self) -> WorkerConfig {
        WorkerConfig {
            device: self.camera_device.clone(),
            width: self.width,
            height: self.height,
            warmup_frames: self.warmup_frames,
            jpeg_quality: self.jpeg_quality,
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

/// `$ROLLCALL_CONFIG`, else `$XDG_CONFIG_HOME/rollcall/config.toml`,
/// else `~/.config/rollcall/config.toml`.
fn config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("ROLLCALL_CONFIG") {
        return Some(PathBuf::from(path));
    }
    let config_home = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|_| std::env::var("HOME").map(|home| PathBuf::from(home).join(".config")))
        .ok()?;
    Some(config_home.join("rollcall").join("config.toml"))
}

fn env_parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, current: T) -> T {
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(current)
}
