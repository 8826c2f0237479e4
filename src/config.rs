//! Runtime configuration.
//!
//! Sources, later ones winning: built-in defaults, `billcycle.toml` in the
//! data directory, then environment variables (`.env` included).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::generator::DEFAULT_HORIZON_DAYS;
use crate::engine::recurrence::DayOverflow;
use crate::error::AppError;

pub const CONFIG_FILE_NAME: &str = "billcycle.toml";
const MIN_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// How far ahead instances are materialized.
    pub horizon_days: u32,
    /// Seconds between background generation passes.
    pub interval_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            horizon_days: DEFAULT_HORIZON_DAYS,
            interval_secs: 3600,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecurrenceConfig {
    pub day_overflow: DayOverflow,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalendarConfig {
    /// Google calendar id, e.g. `primary`. Sync is off when unset.
    pub calendar_id: Option<String>,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    /// IANA zone used for event start/end times.
    pub time_zone: String,
}

impl Default for CalendarConfig {
    fn default() -> Self {
        Self {
            calendar_id: None,
            refresh_token: None,
            time_zone: "UTC".into(),
        }
    }
}

impl CalendarConfig {
    pub fn is_configured(&self) -> bool {
        self.calendar_id.is_some() && self.refresh_token.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    #[serde(skip)]
    pub data_dir: PathBuf,
    pub generation: GenerationConfig,
    pub recurrence: RecurrenceConfig,
    pub calendar: CalendarConfig,
}

impl AppConfig {
    /// Load from the real process environment and file system.
    pub fn load() -> Result<Self, AppError> {
        if let Err(e) = dotenvy::dotenv() {
            if !e.not_found() {
                tracing::warn!("Failed to read .env: {}", e);
            }
        }
        let env = |key: &str| std::env::var(key).ok();
        let data_dir = env("BILLCYCLE_DATA_DIR")
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);

        let file = data_dir.join(CONFIG_FILE_NAME);
        let contents = if file.exists() {
            tracing::debug!(path = %file.display(), "Reading config file");
            Some(std::fs::read_to_string(&file)?)
        } else {
            None
        };

        Self::from_sources(&data_dir, contents.as_deref(), env)
    }

    /// Build a config from explicit sources. `env` looks up one variable.
    pub fn from_sources<F>(data_dir: &Path, file: Option<&str>, env: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config: AppConfig = match file {
            Some(contents) => toml::from_str(contents)?,
            None => AppConfig::default(),
        };
        config.data_dir = data_dir.to_path_buf();

        let env = |key: &str| env(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(v) = env("BILLCYCLE_HORIZON_DAYS") {
            config.generation.horizon_days = parse_number("BILLCYCLE_HORIZON_DAYS", &v)?;
        }
        if let Some(v) = env("BILLCYCLE_INTERVAL_SECS") {
            config.generation.interval_secs = parse_number("BILLCYCLE_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = env("BILLCYCLE_DAY_OVERFLOW") {
            config.recurrence.day_overflow = v.parse()?;
        }
        if let Some(v) = env("GOOGLE_CALENDAR_ID") {
            config.calendar.calendar_id = Some(v);
        }
        if let Some(v) = env("GOOGLE_REFRESH_TOKEN") {
            config.calendar.refresh_token = Some(v);
        }
        if let Some(v) = env("GOOGLE_CALENDAR_TIME_ZONE") {
            config.calendar.time_zone = v;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.generation.horizon_days == 0 {
            return Err(AppError::Config("generation.horizon_days must be at least 1".into()));
        }
        if self.generation.interval_secs < MIN_INTERVAL_SECS {
            return Err(AppError::Config(format!(
                "generation.interval_secs must be at least {MIN_INTERVAL_SECS}, got {}",
                self.generation.interval_secs
            )));
        }
        if self.calendar.time_zone.trim().is_empty() {
            return Err(AppError::Config("calendar.time_zone must not be empty".into()));
        }
        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("billcycle"))
        .unwrap_or_else(|| PathBuf::from("."))
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, AppError> {
    value
        .parse()
        .map_err(|_| AppError::Config(format!("{key} must be a number, got '{value}'")))
}
