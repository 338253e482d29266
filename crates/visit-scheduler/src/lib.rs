//! Core library for the visit scheduling service: configuration, telemetry,
//! application error surface, and the scheduling engine itself.

pub mod config;
pub mod error;
pub mod scheduling;
pub mod telemetry;

pub use config::{AppConfig, AppEnvironment, ConfigError, SchedulerConfig};
pub use error::AppError;
pub use telemetry::TelemetryError;
