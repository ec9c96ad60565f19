// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Runtime settings.
//!
//! [`Settings::load`] reads `config/investledger.toml` when present and then
//! applies `INVESTLEDGER__<SECTION>__<KEY>` environment overrides, e.g.
//! `INVESTLEDGER__LEDGER__REFERRAL_BONUS=50000`.

use config::{Config, ConfigError, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::PathBuf;

const CONFIG_FILE: &str = "config/investledger.toml";
const ENV_PREFIX: &str = "INVESTLEDGER";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub ledger: LedgerSettings,
    #[serde(default)]
    pub rate_limit: RateLimitSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// Falls back to the platform data directory when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedgerSettings {
    /// Flat bonus credited to a referrer per referred registration.
    #[serde(default = "default_referral_bonus")]
    pub referral_bonus: Decimal,
    /// Upper bound for a package's daily return, as a fraction.
    #[serde(default = "default_max_daily_rate")]
    pub max_daily_rate: Decimal,
    #[serde(default = "default_min_duration_days")]
    pub min_duration_days: u32,
    #[serde(default = "default_max_duration_days")]
    pub max_duration_days: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitSettings {
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,
    #[serde(default = "default_window_seconds")]
    pub window_seconds: i64,
    #[serde(default = "default_min_interval_seconds")]
    pub min_interval_seconds: i64,
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: i64,
    #[serde(default = "default_capacity")]
    pub capacity: u32,
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_referral_bonus() -> Decimal {
    Decimal::from(100_000)
}

fn default_max_daily_rate() -> Decimal {
    Decimal::new(10, 2)
}

fn default_min_duration_days() -> u32 {
    1
}

fn default_max_duration_days() -> u32 {
    365
}

fn default_max_requests() -> u32 {
    5
}

fn default_window_seconds() -> i64 {
    60
}

fn default_min_interval_seconds() -> i64 {
    1
}

fn default_ttl_seconds() -> i64 {
    3_600
}

fn default_capacity() -> u32 {
    10_000
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            referral_bonus: default_referral_bonus(),
            max_daily_rate: default_max_daily_rate(),
            min_duration_days: default_min_duration_days(),
            max_duration_days: default_max_duration_days(),
        }
    }
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_seconds: default_window_seconds(),
            min_interval_seconds: default_min_interval_seconds(),
            ttl_seconds: default_ttl_seconds(),
            capacity: default_capacity(),
        }
    }
}

impl Settings {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(CONFIG_FILE)
    }

    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let ledger = &self.ledger;
        if ledger.referral_bonus <= Decimal::ZERO {
            return Err(ConfigError::Message(
                "ledger.referral_bonus must be positive".into(),
            ));
        }
        if ledger.max_daily_rate <= Decimal::ZERO {
            return Err(ConfigError::Message(
                "ledger.max_daily_rate must be positive".into(),
            ));
        }
        if ledger.min_duration_days == 0 || ledger.min_duration_days > ledger.max_duration_days {
            return Err(ConfigError::Message(format!(
                "invalid duration bounds {}..={}",
                ledger.min_duration_days, ledger.max_duration_days
            )));
        }
        if self.rate_limit.max_requests == 0 || self.rate_limit.window_seconds <= 0 {
            return Err(ConfigError::Message(
                "rate_limit.max_requests and rate_limit.window_seconds must be positive".into(),
            ));
        }
        Ok(())
    }
}
