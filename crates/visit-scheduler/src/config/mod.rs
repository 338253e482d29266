use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use chrono::NaiveTime;

use crate::scheduling::GeoPoint;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub scheduler: SchedulerConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            scheduler: SchedulerConfig::load()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Tunables for the scheduling engine. Defaults match the documented search
/// horizons and the standing assumptions about travel speed and workday start.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub first_available_horizon_days: u32,
    pub best_match_horizon_days: u32,
    pub min_match_score: u8,
    pub speed_kmh: f64,
    pub day_start: NaiveTime,
    pub default_visit_minutes: u32,
    pub office_location: GeoPoint,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            first_available_horizon_days: 30,
            best_match_horizon_days: 14,
            min_match_score: 50,
            speed_kmh: 50.0,
            day_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default(),
            default_visit_minutes: 60,
            office_location: GeoPoint {
                latitude: 48.8566,
                longitude: 2.3522,
            },
        }
    }
}

impl SchedulerConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        Ok(Self {
            first_available_horizon_days: env_u32(
                "SCHEDULER_FIRST_AVAILABLE_HORIZON_DAYS",
                defaults.first_available_horizon_days,
            )?,
            best_match_horizon_days: env_u32(
                "SCHEDULER_BEST_MATCH_HORIZON_DAYS",
                defaults.best_match_horizon_days,
            )?,
            min_match_score: env_u32("SCHEDULER_MIN_MATCH_SCORE", defaults.min_match_score.into())?
                .min(100) as u8,
            speed_kmh: env_f64("SCHEDULER_SPEED_KMH", defaults.speed_kmh)?,
            day_start: env_time("SCHEDULER_DAY_START", defaults.day_start)?,
            default_visit_minutes: env_u32(
                "SCHEDULER_DEFAULT_VISIT_MINUTES",
                defaults.default_visit_minutes,
            )?,
            office_location: GeoPoint {
                latitude: env_f64("SCHEDULER_OFFICE_LAT", defaults.office_location.latitude)?,
                longitude: env_f64("SCHEDULER_OFFICE_LON", defaults.office_location.longitude)?,
            },
        })
    }
}

fn env_u32(key: &'static str, default: u32) -> Result<u32, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<u32>()
            .map_err(|_| ConfigError::InvalidNumber { key }),
        Err(_) => Ok(default),
    }
}

fn env_f64(key: &'static str, default: f64) -> Result<f64, ConfigError> {
    match env::var(key) {
        Ok(value) => value
            .trim()
            .parse::<f64>()
            .map_err(|_| ConfigError::InvalidNumber { key }),
        Err(_) => Ok(default),
    }
}

fn env_time(key: &'static str, default: NaiveTime) -> Result<NaiveTime, ConfigError> {
    match env::var(key) {
        Ok(value) => NaiveTime::parse_from_str(value.trim(), "%H:%M")
            .map_err(|_| ConfigError::InvalidTime { key }),
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidNumber { key: &'static str },
    InvalidTime { key: &'static str },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidNumber { key } => write!(f, "{key} must be a valid number"),
            ConfigError::InvalidTime { key } => write!(f, "{key} must match HH:MM"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            _ => None,
        }
    }
}
