use crate::forecast::{
    DEFAULT_SMOOTHING_THRESHOLD, DEFAULT_SPLIT_RATIO, ForecastOptions, ZeroRowPolicy,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";
pub const DEFAULT_HISTORY_PATH: &str = "data/history.csv";
pub const DEFAULT_SERVER_PORT: u16 = 8080;
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 180;
pub const DEFAULT_HORIZON_MINUTES: u64 = 15;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub app: AppSection,
    pub logging: LoggingSection,
    #[serde(default)]
    pub history: Option<HistorySection>,
    #[serde(default)]
    pub server: Option<ServerSection>,
    #[serde(default)]
    pub forecast: Option<ForecastSection>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppSection {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingSection {
    pub level: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistorySection {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerSection {
    /// Port to listen on (default: 8080)
    pub port: Option<u16>,
    /// Refresh interval in seconds for history reload (default: 180)
    pub refresh_interval_secs: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ForecastSection {
    /// Wall-clock prediction horizon in minutes (default: 15)
    pub horizon_minutes: Option<u64>,
    /// Transition-count threshold below which smoothing activates
    pub smoothing_threshold: Option<u64>,
    /// Fraction of comparison samples used for fitting
    pub split_ratio: Option<f64>,
    /// Fallback for states never observed as a source: self_loop | uniform
    pub zero_row_policy: Option<ZeroRowPolicy>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Read(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

pub fn load_default() -> Result<Config, ConfigError> {
    load_from_path(DEFAULT_CONFIG_PATH)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    let config: Config = toml::from_str(&contents)?;
    Ok(config)
}

impl Config {
    /// Returns the history file path (default: data/history.csv).
    pub fn history_path(&self) -> &Path {
        self.history
            .as_ref()
            .and_then(|section| section.path.as_deref())
            .filter(|path| !path.as_os_str().is_empty())
            .unwrap_or(Path::new(DEFAULT_HISTORY_PATH))
    }

    /// Returns the server port (default: 8080)
    pub fn server_port(&self) -> u16 {
        self.server
            .as_ref()
            .and_then(|s| s.port)
            .unwrap_or(DEFAULT_SERVER_PORT)
    }

    /// Returns the refresh interval as Duration (default: 180 seconds)
    pub fn refresh_interval(&self) -> Duration {
        let secs = self
            .server
            .as_ref()
            .and_then(|s| s.refresh_interval_secs)
            .unwrap_or(DEFAULT_REFRESH_INTERVAL_SECS);
        Duration::from_secs(secs)
    }

    /// Engine options assembled from the [forecast] section, with defaults
    /// for anything left out.
    pub fn forecast_options(&self) -> ForecastOptions {
        let section = self.forecast.as_ref();
        ForecastOptions {
            horizon: Duration::from_secs(
                section
                    .and_then(|s| s.horizon_minutes)
                    .unwrap_or(DEFAULT_HORIZON_MINUTES)
                    * 60,
            ),
            smoothing_threshold: section
                .and_then(|s| s.smoothing_threshold)
                .unwrap_or(DEFAULT_SMOOTHING_THRESHOLD),
            split_ratio: section
                .and_then(|s| s.split_ratio)
                .unwrap_or(DEFAULT_SPLIT_RATIO),
            zero_row_policy: section
                .and_then(|s| s.zero_row_policy)
                .unwrap_or_default(),
        }
    }
}
