use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::calendar::HolidayWeekdays;

pub const HTTP_ADDR_ENV: &str = "CREW_ROSTER_HTTP_ADDR";
pub const DATABASE_ENV: &str = "CREW_ROSTER_DB";
pub const HOLIDAYS_ENV: &str = "CREW_ROSTER_HOLIDAYS";
pub const LOG_ENV: &str = "CREW_ROSTER_LOG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file: {0}")]
    Io(#[from] io::Error),
    #[error("invalid config file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnv { var: &'static str, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterConfig {
    pub http_addr: String,
    /// SQLite file; `None` keeps the roster in memory.
    pub database_path: Option<PathBuf>,
    /// Holiday weekdays offered when a request does not name any.
    pub default_holiday_weekdays: HolidayWeekdays,
    /// Fallback filter when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:3000".to_string(),
            database_path: None,
            default_holiday_weekdays: HolidayWeekdays::none(),
            log_filter: "info".to_string(),
        }
    }
}

impl RosterConfig {
    pub fn load_json<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let file = File::open(path)?;
        Ok(serde_json::from_reader(file)?)
    }

    /// Defaults overridden by `CREW_ROSTER_*` environment variables.
    pub fn from_env() -> ConfigResult<Self> {
        Self::default().with_env_overrides(|key| env::var(key).ok())
    }

    pub fn with_env_overrides<F>(mut self, lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup(HTTP_ADDR_ENV) {
            self.http_addr = addr;
        }
        if let Some(path) = lookup(DATABASE_ENV).filter(|p| !p.trim().is_empty()) {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(days) = lookup(HOLIDAYS_ENV) {
            self.default_holiday_weekdays = HolidayWeekdays::parse_csv(&days)
                .map_err(|err| ConfigError::InvalidEnv {
                    var: HOLIDAYS_ENV,
                    reason: err.to_string(),
                })?;
        }
        if let Some(filter) = lookup(LOG_ENV) {
            self.log_filter = filter;
        }
        Ok(self)
    }
}

/// Install the global fmt subscriber. `RUST_LOG` wins over the config.
pub fn init_tracing(config: &RosterConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_filter.as_str()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .try_init();
}
