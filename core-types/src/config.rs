// Copyright (c) James Kassemi, SC, US. All rights reserved.
use std::{net::SocketAddr, path::PathBuf};

use config::{Config, ConfigError};
use serde::{Deserialize, Serialize};

/// Which backing store holds drawing books.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    #[default]
    File,
}

/// Runtime knobs for the raffle service. Loaded from `raffle.toml` (optional) and `RAFFLE_*`
/// environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_label")]
    pub label: String,
    #[serde(default)]
    pub store: StoreKind,
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
    #[serde(default = "default_http_addr")]
    pub http_addr: SocketAddr,
    #[serde(default)]
    pub slots: SlotLimits,
    #[serde(default)]
    pub sweep: SweepConfig,
    #[serde(default = "default_status_log_interval_secs")]
    pub status_log_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotLimits {
    #[serde(default = "default_reservation_minutes")]
    pub default_reservation_minutes: u32,
    #[serde(default = "default_max_reservation_minutes")]
    pub max_reservation_minutes: u32,
    #[serde(default = "default_max_query_batch")]
    pub max_query_batch: usize,
    #[serde(default = "default_max_slots_per_drawing")]
    pub max_slots_per_drawing: u32,
}

impl Default for SlotLimits {
    fn default() -> Self {
        Self {
            default_reservation_minutes: default_reservation_minutes(),
            max_reservation_minutes: default_max_reservation_minutes(),
            max_query_batch: default_max_query_batch(),
            max_slots_per_drawing: default_max_slots_per_drawing(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(default = "default_sweep_interval_secs")]
    pub interval_secs: u64,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_sweep_interval_secs(),
            enabled: true,
        }
    }
}

fn default_label() -> String {
    "raffle".to_string()
}

fn default_state_dir() -> PathBuf {
    PathBuf::from("raffle.state")
}

fn default_http_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8080))
}

fn default_status_log_interval_secs() -> u64 {
    30
}

fn default_reservation_minutes() -> u32 {
    15
}

fn default_max_reservation_minutes() -> u32 {
    60
}

fn default_max_query_batch() -> usize {
    500
}

fn default_max_slots_per_drawing() -> u32 {
    100_000
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            label: default_label(),
            store: StoreKind::default(),
            state_dir: default_state_dir(),
            http_addr: default_http_addr(),
            slots: SlotLimits::default(),
            sweep: SweepConfig::default(),
            status_log_interval_secs: default_status_log_interval_secs(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("raffle.toml")
    }

    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("RAFFLE").separator("__"))
            .build()?;
        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let slots = &self.slots;
        if slots.default_reservation_minutes == 0 {
            return Err(ConfigError::Message(
                "slots.default_reservation_minutes must be positive".to_string(),
            ));
        }
        if slots.default_reservation_minutes > slots.max_reservation_minutes {
            return Err(ConfigError::Message(format!(
                "slots.default_reservation_minutes ({}) exceeds slots.max_reservation_minutes ({})",
                slots.default_reservation_minutes, slots.max_reservation_minutes
            )));
        }
        if slots.max_query_batch == 0 {
            return Err(ConfigError::Message(
                "slots.max_query_batch must be positive".to_string(),
            ));
        }
        if self.sweep.enabled && self.sweep.interval_secs == 0 {
            return Err(ConfigError::Message(
                "sweep.interval_secs must be positive when the sweep is enabled".to_string(),
            ));
        }
        Ok(())
    }
}
