//! Configuration loading from TOML files and environment variables.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::region::RegionSpec;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub recording: RecordingConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Recording parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Recording duration in seconds.
    #[serde(default = "default_duration_seconds")]
    pub duration_seconds: i64,
    /// Target frame rate.
    #[serde(default = "default_fps")]
    pub fps: i64,
    /// Video quality (0-100); maps monotonically to the encoder quantizer.
    #[serde(default = "default_quality")]
    pub quality: u8,
    /// Explicit capture rectangle; full primary display when absent.
    #[serde(default)]
    pub region: Option<RegionSpec>,
    /// Keep the local file after a successful upload.
    #[serde(default)]
    pub keep_local: bool,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            duration_seconds: default_duration_seconds(),
            fps: default_fps(),
            quality: default_quality(),
            region: None,
            keep_local: false,
        }
    }
}

/// Output file placement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory recordings are written into, created on demand.
    #[serde(default = "default_recordings_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_recordings_dir(),
        }
    }
}

/// Telegram delivery settings.
///
/// The bot token is deliberately not given a default: it must come from the
/// config file or the `SCREENREEL_BOT_TOKEN` environment variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token. Treated as opaque; never logged.
    #[serde(default)]
    pub bot_token: String,
    /// Destination chat ID.
    #[serde(default)]
    pub chat_id: String,
    /// API base URL, overridable for self-hosted bot API servers.
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            chat_id: String::new(),
            api_base: default_api_base(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// Default value functions
fn default_duration_seconds() -> i64 {
    10
}

fn default_fps() -> i64 {
    15
}

fn default_quality() -> u8 {
    95
}

fn default_recordings_dir() -> PathBuf {
    PathBuf::from("recordings")
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| "Failed to parse config file")?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let mut config = if let Some(path) = config_path {
            Self::from_file(path)?
        } else {
            // Try default config locations
            let default_paths = [
                PathBuf::from("config/default.toml"),
                dirs::config_dir()
                    .map(|d| d.join("screenreel/config.toml"))
                    .unwrap_or_default(),
            ];

            let mut loaded = None;
            for path in &default_paths {
                if path.exists() {
                    loaded = Some(Self::from_file(path)?);
                    break;
                }
            }
            loaded.unwrap_or_default()
        };

        // Apply environment variable overrides
        config.apply_env_overrides();

        // Expand home directory in the output dir
        config.output.dir = expand_tilde(&config.output.dir);

        Ok(config)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SCREENREEL_DURATION") {
            if let Ok(v) = val.parse() {
                self.recording.duration_seconds = v;
            }
        }
        if let Ok(val) = std::env::var("SCREENREEL_FPS") {
            if let Ok(v) = val.parse() {
                self.recording.fps = v;
            }
        }
        if let Ok(val) = std::env::var("SCREENREEL_QUALITY") {
            if let Ok(v) = val.parse() {
                self.recording.quality = v;
            }
        }
        if let Ok(val) = std::env::var("SCREENREEL_OUTPUT_DIR") {
            self.output.dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("SCREENREEL_BOT_TOKEN") {
            self.telegram.bot_token = val;
        }
        if let Ok(val) = std::env::var("SCREENREEL_CHAT_ID") {
            self.telegram.chat_id = val;
        }
        if let Ok(val) = std::env::var("SCREENREEL_API_BASE") {
            self.telegram.api_base = val;
        }
        if let Ok(val) = std::env::var("SCREENREEL_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.recording.duration_seconds <= 0
            || self.recording.duration_seconds > crate::pacing::MAX_DURATION_SECONDS
        {
            anyhow::bail!(
                "Recording duration must be between 1 and {} seconds",
                crate::pacing::MAX_DURATION_SECONDS
            );
        }
        if self.recording.fps <= 0 || self.recording.fps > crate::pacing::MAX_FPS {
            anyhow::bail!(
                "Frame rate must be between 1 and {}",
                crate::pacing::MAX_FPS
            );
        }
        if self.recording.quality > 100 {
            anyhow::bail!("Quality must be between 0 and 100");
        }
        if self.telegram.bot_token.is_empty() {
            anyhow::bail!(
                "Telegram bot token is not set (config [telegram].bot_token or SCREENREEL_BOT_TOKEN)"
            );
        }
        if self.telegram.chat_id.is_empty() {
            anyhow::bail!(
                "Telegram chat ID is not set (config [telegram].chat_id or SCREENREEL_CHAT_ID)"
            );
        }
        Ok(())
    }
}

/// Expand ~ to home directory.
fn expand_tilde(path: &Path) -> PathBuf {
    if let Some(path_str) = path.to_str() {
        if path_str.starts_with('~') {
            if let Some(home) = dirs::home_dir() {
                return home.join(&path_str[2..]);
            }
        }
    }
    path.to_path_buf()
}
