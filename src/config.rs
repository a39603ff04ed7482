//! Configuration module
//!
//! `AppConfig` is read from a TOML file. Every field has a default, so a
//! missing file or a partial file both work.
//!
//! ```toml
//! [server]
//! api_port = 8080
//!
//! [store]
//! mode = "database"
//!
//! [periods.A]
//! start = "11:00"
//! granularity_minutes = 5
//! duration_minutes = 60
//! slot_capacity = 10
//!
//! [[locations]]
//! id = "MAIN 1"
//! name = "Main Cafeteria"
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::scheduling::{BookingWindow, PeriodTemplate, SlotTemplate};
use crate::domain::{Location, Period, PeriodWindow};
use crate::infrastructure::DatabaseConfig;

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "LUNCHLINE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Default config location: `$LUNCHLINE_CONFIG`, else
/// `~/.config/lunchline/config.toml`.
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    dirs_next::config_dir()
        .map(|dir| dir.join("lunchline").join("config.toml"))
        .unwrap_or_else(|| PathBuf::from("config.toml"))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseSettings,
    pub store: StoreConfig,
    pub booking: BookingConfig,
    pub periods: PeriodsConfig,
    pub allocation: AllocationConfig,
    pub reservations: ReservationsConfig,
    pub cache: CacheConfig,
    pub locations: Vec<LocationSeed>,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub api_host: String,
    pub api_port: u16,
    /// Seconds to wait for background tasks on shutdown
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            api_host: "0.0.0.0".to_string(),
            api_port: 8080,
            shutdown_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        let defaults = DatabaseConfig::default();
        Self {
            url: defaults.url,
            max_connections: defaults.max_connections,
        }
    }
}

/// Which slot store backs the service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreMode {
    /// SeaORM database (production)
    #[default]
    Database,
    /// Process-local, lost on restart
    Memory,
    /// Demo mode: fixed availability, holds always succeed
    Sandbox,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub mode: StoreMode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BookingConfig {
    pub window_days: u32,
    pub skip_weekends: bool,
    /// School-local offset from UTC, used to decide "today"
    pub timezone_offset_minutes: i32,
}

impl Default for BookingConfig {
    fn default() -> Self {
        let defaults = BookingWindow::default();
        Self {
            window_days: defaults.window_days,
            skip_weekends: defaults.skip_weekends,
            timezone_offset_minutes: defaults.timezone_offset_minutes,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodConfig {
    /// "HH:MM"
    pub start: String,
    pub granularity_minutes: u32,
    pub duration_minutes: u32,
    pub slot_capacity: u32,
}

impl PeriodConfig {
    fn starting_at(start: &str) -> Self {
        Self {
            start: start.to_string(),
            granularity_minutes: 5,
            duration_minutes: 60,
            slot_capacity: 10,
        }
    }

    pub fn to_template(&self, period: Period) -> Result<PeriodTemplate, ConfigError> {
        let start = NaiveTime::parse_from_str(self.start.trim(), "%H:%M").map_err(|e| {
            ConfigError::Invalid(format!(
                "periods.{}.start '{}' is not HH:MM: {}",
                period, self.start, e
            ))
        })?;
        let window = PeriodWindow {
            period_start_time: start,
            slot_granularity_minutes: self.granularity_minutes,
            period_duration_minutes: self.duration_minutes,
        };
        PeriodTemplate::new(window, self.slot_capacity)
            .map_err(|e| ConfigError::Invalid(format!("periods.{}: {}", period, e)))
    }
}

/// Fields left out of a `[periods.X]` table take the period A defaults,
/// so a custom period B should always set `start`.
impl Default for PeriodConfig {
    fn default() -> Self {
        Self::starting_at("11:00")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodsConfig {
    #[serde(rename = "A")]
    pub a: PeriodConfig,
    #[serde(rename = "B")]
    pub b: PeriodConfig,
}

impl Default for PeriodsConfig {
    fn default() -> Self {
        Self {
            a: PeriodConfig::starting_at("11:00"),
            b: PeriodConfig::starting_at("12:00"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationConfig {
    /// Per-slot service time in the wait-cost formula
    pub base_unit_minutes: f64,
    pub max_checkout_attempts: u32,
}

impl Default for AllocationConfig {
    fn default() -> Self {
        Self {
            base_unit_minutes: 5.0,
            max_checkout_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReservationsConfig {
    pub hold_timeout_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for ReservationsConfig {
    fn default() -> Self {
        Self {
            hold_timeout_secs: 300,
            sweep_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub refresh_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationSeed {
    pub id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl AppConfig {
    /// Load and validate the file at `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.slot_template()?;

        if self.reservations.hold_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "reservations.hold_timeout_secs must be positive".to_string(),
            ));
        }
        if self.reservations.sweep_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "reservations.sweep_interval_secs must be positive".to_string(),
            ));
        }
        let base = self.allocation.base_unit_minutes;
        if !(base.is_finite() && base > 0.0) {
            return Err(ConfigError::Invalid(
                "allocation.base_unit_minutes must be a positive number".to_string(),
            ));
        }
        if self.allocation.max_checkout_attempts == 0 {
            return Err(ConfigError::Invalid(
                "allocation.max_checkout_attempts must be at least 1".to_string(),
            ));
        }
        if !matches!(self.logging.format.to_lowercase().as_str(), "pretty" | "json") {
            return Err(ConfigError::Invalid(format!(
                "logging.format must be 'pretty' or 'json', got '{}'",
                self.logging.format
            )));
        }

        let mut seen = HashSet::new();
        for seed in &self.locations {
            if seed.id.trim().is_empty() {
                return Err(ConfigError::Invalid("location id must not be empty".to_string()));
            }
            if !seen.insert(seed.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate location id '{}'", seed.id)));
            }
        }
        Ok(())
    }

    pub fn slot_template(&self) -> Result<SlotTemplate, ConfigError> {
        Ok(SlotTemplate::new(
            self.periods.a.to_template(Period::A)?,
            self.periods.b.to_template(Period::B)?,
        ))
    }

    pub fn booking_window(&self) -> BookingWindow {
        BookingWindow {
            window_days: self.booking.window_days,
            skip_weekends: self.booking.skip_weekends,
            timezone_offset_minutes: self.booking.timezone_offset_minutes,
        }
    }

    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.database.url.clone(),
            max_connections: self.database.max_connections,
        }
    }

    pub fn hold_timeout(&self) -> chrono::Duration {
        seconds(self.reservations.hold_timeout_secs)
    }

    pub fn cache_refresh_interval(&self) -> chrono::Duration {
        seconds(self.cache.refresh_interval_secs)
    }

    /// Locations to seed; the two default counters when none are configured
    pub fn seed_locations(&self) -> Vec<Location> {
        if self.locations.is_empty() {
            return vec![
                Location::new("MAIN 1", "Main Cafeteria"),
                Location::new("MAIN 2", "Student Center"),
            ];
        }
        self.locations
            .iter()
            .map(|seed| Location {
                id: seed.id.as_str().into(),
                name: seed.name.clone(),
                is_active: seed.active,
            })
            .collect()
    }
}

/// Whole seconds, capped at one year
fn seconds(secs: u64) -> chrono::Duration {
    const ONE_YEAR: i64 = 365 * 24 * 60 * 60;
    chrono::Duration::seconds(i64::try_from(secs).unwrap_or(ONE_YEAR).min(ONE_YEAR))
}
