//! Configuration loading and validation.
//!
//! Settings come from an optional TOML file layered with `ACDBOT__*`
//! environment variables (e.g. `ACDBOT__ZOOM__TOKEN`). Each collaborator has
//! its own section; a command asks for the sections it needs up front so a
//! missing credential fails before any request is made.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load config: {0}")]
    LoadError(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Missing [{0}] configuration section")]
    MissingSection(&'static str),
}

/// Shared HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Limit for recording downloads and uploads, which outlive API calls
    #[serde(default = "default_transfer_timeout")]
    pub transfer_timeout_seconds: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout() -> u64 {
    30
}

fn default_transfer_timeout() -> u64 {
    3600
}

fn default_user_agent() -> String {
    format!("acdbot/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            transfer_timeout_seconds: default_transfer_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// GitHub issue tracker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    pub token: String,

    /// Repository in `owner/name` form
    pub repo: String,

    #[serde(default = "default_github_api")]
    pub api_base: String,
}

fn default_github_api() -> String {
    "https://api.github.com".to_string()
}

/// Zoom meetings and cloud recordings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoomConfig {
    /// Bearer token with meeting and recording scopes
    pub token: String,

    pub user_id: String,

    #[serde(default = "default_zoom_api")]
    pub api_base: String,
}

fn default_zoom_api() -> String {
    "https://api.zoom.us/v2".to_string()
}

/// Discourse forum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscourseConfig {
    pub api_key: String,

    pub api_username: String,

    #[serde(default = "default_discourse_base")]
    pub base_url: String,

    /// Category for new topics
    #[serde(default = "default_category_id")]
    pub category_id: u64,
}

fn default_discourse_base() -> String {
    "https://ethereum-magicians.org".to_string()
}

fn default_category_id() -> u64 {
    63
}

/// Google Calendar.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarConfig {
    pub access_token: String,

    pub calendar_id: String,

    #[serde(default = "default_calendar_api")]
    pub api_base: String,
}

fn default_calendar_api() -> String {
    "https://www.googleapis.com/calendar/v3".to_string()
}

/// Telegram chat notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    pub bot_token: String,

    pub chat_id: String,

    #[serde(default = "default_telegram_api")]
    pub api_base: String,
}

fn default_telegram_api() -> String {
    "https://api.telegram.org".to_string()
}

/// YouTube recording uploads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YoutubeConfig {
    pub access_token: String,

    #[serde(default = "default_youtube_api")]
    pub api_base: String,

    #[serde(default = "default_youtube_upload")]
    pub upload_base: String,

    /// "public", "private" or "unlisted"
    #[serde(default = "default_privacy_status")]
    pub privacy_status: String,

    #[serde(default = "default_video_category")]
    pub category_id: String,
}

fn default_youtube_api() -> String {
    "https://www.googleapis.com/youtube/v3".to_string()
}

fn default_youtube_upload() -> String {
    "https://www.googleapis.com/upload/youtube/v3".to_string()
}

fn default_privacy_status() -> String {
    "public".to_string()
}

fn default_video_category() -> String {
    // Science & Technology
    "28".to_string()
}

/// Recording poller settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Hours after a meeting ends before its recording is processed
    #[serde(default = "default_eligibility_hours")]
    pub eligibility_delay_hours: i64,

    /// How far back to list recordings
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
}

/// One year, in hours.
pub const MAX_ELIGIBILITY_DELAY_HOURS: i64 = 24 * 365;

pub const MAX_LOOKBACK_DAYS: i64 = 365;

fn default_eligibility_hours() -> i64 {
    4
}

fn default_lookback_days() -> i64 {
    30
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            eligibility_delay_hours: default_eligibility_hours(),
            lookback_days: default_lookback_days(),
        }
    }
}

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// JSON document mapping meeting ids to topics and videos
    #[serde(default = "default_mapping_file")]
    pub mapping_file: PathBuf,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub polling: PollingConfig,

    #[serde(default)]
    pub github: Option<GithubConfig>,

    #[serde(default)]
    pub zoom: Option<ZoomConfig>,

    #[serde(default)]
    pub discourse: Option<DiscourseConfig>,

    #[serde(default)]
    pub calendar: Option<CalendarConfig>,

    #[serde(default)]
    pub telegram: Option<TelegramConfig>,

    #[serde(default)]
    pub youtube: Option<YoutubeConfig>,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_mapping_file() -> PathBuf {
    PathBuf::from("./meeting_topic_mapping.json")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            mapping_file: default_mapping_file(),
            log_level: default_log_level(),
            http: HttpConfig::default(),
            polling: PollingConfig::default(),
            github: None,
            zoom: None,
            discourse: None,
            calendar: None,
            telegram: None,
            youtube: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from an optional TOML file plus `ACDBOT__*`
    /// environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(::config::File::from(path).required(false));
        }
        let settings = builder
            .add_source(
                ::config::Environment::with_prefix("ACDBOT")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the sections that are present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.http.timeout_seconds == 0 || self.http.transfer_timeout_seconds == 0 {
            return Err(ConfigError::ValidationError(
                "HTTP timeouts must be greater than 0".to_string(),
            ));
        }

        if !(0..=MAX_ELIGIBILITY_DELAY_HOURS).contains(&self.polling.eligibility_delay_hours) {
            return Err(ConfigError::ValidationError(format!(
                "polling.eligibility_delay_hours must be between 0 and {}",
                MAX_ELIGIBILITY_DELAY_HOURS
            )));
        }

        if !(1..=MAX_LOOKBACK_DAYS).contains(&self.polling.lookback_days) {
            return Err(ConfigError::ValidationError(format!(
                "polling.lookback_days must be between 1 and {}",
                MAX_LOOKBACK_DAYS
            )));
        }

        if let Some(github) = &self.github {
            require("github.token", &github.token)?;
            require_url("github.api_base", &github.api_base)?;
            let parts: Vec<&str> = github.repo.split('/').collect();
            if parts.len() != 2 || parts.iter().any(|p| p.is_empty()) {
                return Err(ConfigError::ValidationError(format!(
                    "github.repo must be `owner/name`, got `{}`",
                    github.repo
                )));
            }
        }

        if let Some(zoom) = &self.zoom {
            require("zoom.token", &zoom.token)?;
            require("zoom.user_id", &zoom.user_id)?;
            require_url("zoom.api_base", &zoom.api_base)?;
        }

        if let Some(discourse) = &self.discourse {
            require("discourse.api_key", &discourse.api_key)?;
            require("discourse.api_username", &discourse.api_username)?;
            require_url("discourse.base_url", &discourse.base_url)?;
        }

        if let Some(calendar) = &self.calendar {
            require("calendar.access_token", &calendar.access_token)?;
            require("calendar.calendar_id", &calendar.calendar_id)?;
            require_url("calendar.api_base", &calendar.api_base)?;
        }

        if let Some(telegram) = &self.telegram {
            require("telegram.bot_token", &telegram.bot_token)?;
            require("telegram.chat_id", &telegram.chat_id)?;
            require_url("telegram.api_base", &telegram.api_base)?;
        }

        if let Some(youtube) = &self.youtube {
            require("youtube.access_token", &youtube.access_token)?;
            require_url("youtube.api_base", &youtube.api_base)?;
            require_url("youtube.upload_base", &youtube.upload_base)?;
            if !["public", "private", "unlisted"].contains(&youtube.privacy_status.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "youtube.privacy_status must be public, private or unlisted, got `{}`",
                    youtube.privacy_status
                )));
            }
        }

        Ok(())
    }

    pub fn github(&self) -> Result<&GithubConfig, ConfigError> {
        self.github.as_ref().ok_or(ConfigError::MissingSection("github"))
    }

    pub fn zoom(&self) -> Result<&ZoomConfig, ConfigError> {
        self.zoom.as_ref().ok_or(ConfigError::MissingSection("zoom"))
    }

    pub fn discourse(&self) -> Result<&DiscourseConfig, ConfigError> {
        self.discourse
            .as_ref()
            .ok_or(ConfigError::MissingSection("discourse"))
    }

    pub fn youtube(&self) -> Result<&YoutubeConfig, ConfigError> {
        self.youtube
            .as_ref()
            .ok_or(ConfigError::MissingSection("youtube"))
    }

    /// Directory for downloaded recordings.
    pub fn recordings_dir(&self) -> PathBuf {
        self.data_dir.join("recordings")
    }
}

fn require(name: &str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::ValidationError(format!("{} must not be empty", name)));
    }
    Ok(())
}

fn require_url(name: &str, value: &str) -> Result<(), ConfigError> {
    Url::parse(value)
        .map(|_| ())
        .map_err(|e| ConfigError::ValidationError(format!("{} is not a valid URL: {}", name, e)))
}
