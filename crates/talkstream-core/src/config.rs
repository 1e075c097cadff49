//! Session configuration loaded once at startup.
//!
//! | Source | Notes |
//! |--------|-------|
//! | `TALKSTREAM_CONFIG` or `./api.json` | Optional file; `.json` or `.toml` picked by extension. |
//! | `TALKSTREAM__KEY`, `TALKSTREAM__OPENAI_KEY`, ... | Environment overlay, `__` separates nesting (`TALKSTREAM__MONITOR__STALL_TICKS`). |
//!
//! `key` (avatar service) and `openai_key` (text service) are required; everything else has a default.

use crate::error::{SessionError, SessionResult};
use crate::playback::MonitorConfig;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_AVATAR_URL: &str = "https://api.d-id.com";
pub const DEFAULT_TEXT_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_TEXT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_VOICE_ID: &str = "en-US-JennyNeural";
pub const DEFAULT_SOURCE_URL: &str =
    "https://raw.githubusercontent.com/jjmlovesgit/D-id_Streaming_Chatgpt/main/oracle_pic.jpg";
const DEFAULT_CONFIG_PATH: &str = "api.json";

fn default_avatar_url() -> String {
    DEFAULT_AVATAR_URL.to_string()
}

fn default_text_url() -> String {
    DEFAULT_TEXT_URL.to_string()
}

fn default_text_model() -> String {
    DEFAULT_TEXT_MODEL.to_string()
}

fn default_voice_id() -> String {
    DEFAULT_VOICE_ID.to_string()
}

fn default_source_url() -> String {
    DEFAULT_SOURCE_URL.to_string()
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_stall_ticks() -> u32 {
    3
}

/// Playback monitor tuning as it appears in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorSettings {
    /// Statistics poll period in milliseconds (default 500).
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Consecutive non-growing ticks before the video is declared idle (default 3; 1 = flip on the first stall).
    #[serde(default = "default_stall_ticks")]
    pub stall_ticks: u32,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            stall_ticks: default_stall_ticks(),
        }
    }
}

impl From<&MonitorSettings> for MonitorConfig {
    fn from(settings: &MonitorSettings) -> Self {
        MonitorConfig {
            poll_interval: Duration::from_millis(settings.poll_interval_ms.max(1)),
            stall_ticks: settings.stall_ticks.max(1),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Avatar service API key (Basic auth user, empty password).
    #[serde(default)]
    pub key: String,
    /// Text service bearer key.
    #[serde(default)]
    pub openai_key: String,
    /// Avatar service base URL.
    #[serde(default = "default_avatar_url")]
    pub url: String,
    /// Voice used for every talk script.
    #[serde(default = "default_voice_id")]
    pub voice_id: String,
    #[serde(default = "default_text_url")]
    pub openai_url: String,
    #[serde(default = "default_text_model")]
    pub openai_model: String,
    /// Portrait the avatar service animates.
    #[serde(default = "default_source_url")]
    pub source_url: String,
    #[serde(default)]
    pub monitor: MonitorSettings,
}

impl SessionConfig {
    /// Minimal config with defaults for everything but the two keys.
    pub fn new(key: impl Into<String>, openai_key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            openai_key: openai_key.into(),
            url: default_avatar_url(),
            voice_id: default_voice_id(),
            openai_url: default_text_url(),
            openai_model: default_text_model(),
            source_url: default_source_url(),
            monitor: MonitorSettings::default(),
        }
    }

    /// Load from `TALKSTREAM_CONFIG` (or `./api.json`) plus the `TALKSTREAM__*` environment.
    pub fn load() -> SessionResult<Self> {
        let path = std::env::var("TALKSTREAM_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from_path(Path::new(&path))
    }

    /// Load from a specific file (skipped when absent) plus the environment overlay.
    pub fn load_from_path(path: &Path) -> SessionResult<Self> {
        let builder = config::Config::builder();
        let builder = if path.exists() {
            builder.add_source(config::File::from(path))
        } else {
            builder
        };

        let built = builder
            .add_source(
                config::Environment::with_prefix("TALKSTREAM")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let loaded: SessionConfig = built.try_deserialize()?;
        loaded.validate()
    }

    /// Reject configs the session cannot start with.
    pub fn validate(mut self) -> SessionResult<Self> {
        self.key = self.key.trim().to_string();
        self.openai_key = self.openai_key.trim().to_string();
        if self.key.is_empty() {
            return Err(SessionError::Config("missing avatar service API key (`key`)".to_string()));
        }
        if self.openai_key.is_empty() {
            return Err(SessionError::Config("missing text service API key (`openai_key`)".to_string()));
        }
        if self.url.trim().is_empty() {
            self.url = default_avatar_url();
        }
        self.url = self.url.trim_end_matches('/').to_string();
        self.openai_url = self.openai_url.trim_end_matches('/').to_string();
        Ok(self)
    }

    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig::from(&self.monitor)
    }
}
