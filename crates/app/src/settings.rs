//! Handles settings for the application. Configuration is read from an
//! optional `settings.toml` and overridden by `FINCORE__*` environment
//! variables (e.g. `FINCORE__DATABASE__URL`).
//!
//! See `settings.example.toml` for the available keys.

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use pipeline::{RelayConfig, WorkerConfig};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct App {
    pub level: String,
}

#[derive(Debug, Deserialize)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct Pipeline {
    pub relay_interval_ms: u64,
    pub relay_batch_size: u64,
    pub handler_deadline_ms: u64,
    pub max_attempts: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
}

impl Pipeline {
    pub fn relay(&self) -> RelayConfig {
        RelayConfig {
            interval: Duration::from_millis(self.relay_interval_ms),
            batch_size: self.relay_batch_size,
        }
    }

    pub fn worker(&self) -> WorkerConfig {
        WorkerConfig {
            deadline: Duration::from_millis(self.handler_deadline_ms),
            max_attempts: self.max_attempts,
            backoff_base: Duration::from_millis(self.backoff_base_ms),
            backoff_max: Duration::from_millis(self.backoff_max_ms),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Alerts {
    pub dedup_budget_alerts: bool,
}

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub app: App,
    pub database: Database,
    pub pipeline: Pipeline,
    pub alerts: Alerts,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .set_default("app.level", "info")?
            .set_default("database.url", "sqlite:./fincore.db?mode=rwc")?
            .set_default("database.max_connections", 25)?
            .set_default("database.connect_timeout_secs", 8)?
            .set_default("pipeline.relay_interval_ms", 250)?
            .set_default("pipeline.relay_batch_size", 100)?
            .set_default("pipeline.handler_deadline_ms", 5_000)?
            .set_default("pipeline.max_attempts", 5)?
            .set_default("pipeline.backoff_base_ms", 200)?
            .set_default("pipeline.backoff_max_ms", 30_000)?
            .set_default("alerts.dedup_budget_alerts", false)?
            .add_source(File::with_name("settings").required(false))
            .add_source(
                Environment::with_prefix("FINCORE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        settings.try_deserialize()
    }
}
