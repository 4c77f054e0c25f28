// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::constants::{
    DEFAULT_LOG_FLUSH_INTERVAL_SECS, DEFAULT_RESERVOIR_CAPACITY,
    DEFAULT_STATS_FLUSH_INTERVAL_SECS, UNKNOWN_PROGRAM_ID,
};
use crate::errors::ConfigError;
use crate::level::LogLevel;
use crate::stats::StatMask;
use std::env;
use std::time::Duration;

/// Configuration for a [`crate::Client`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Identifier passed to transports with every flush. Resolved from the
    /// running executable when unset.
    pub program_id: Option<String>,
    /// Untraced messages at or above this level are dropped
    pub no_send_level: LogLevel,
    /// Messages at or more severe than this level are flushed immediately
    pub immediate_send_level: LogLevel,
    /// Observations each timer keeps for percentiles
    pub reservoir_capacity: usize,
    /// Statistics reported by timers created without an explicit mask
    pub default_timer_mask: StatMask,
    /// Whether scheduled stats flushes discard accumulated counters
    pub reset_stats_on_flush: bool,
    pub log_flush_interval: Duration,
    pub stats_flush_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            program_id: None,
            no_send_level: LogLevel::Debug,
            immediate_send_level: LogLevel::Error,
            reservoir_capacity: DEFAULT_RESERVOIR_CAPACITY,
            default_timer_mask: StatMask::ALL,
            reset_stats_on_flush: false,
            log_flush_interval: Duration::from_secs(DEFAULT_LOG_FLUSH_INTERVAL_SECS),
            stats_flush_interval: Duration::from_secs(DEFAULT_STATS_FLUSH_INTERVAL_SECS),
        }
    }
}

impl ClientConfig {
    /// Create configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let program_id = env::var("TELEMETRY_PROGRAM_ID")
            .ok()
            .map(|val| val.trim().to_string())
            .filter(|val| !val.is_empty());
        let no_send_level = match env::var("TELEMETRY_NO_SEND_LEVEL") {
            Ok(val) => val.parse()?,
            Err(_) => defaults.no_send_level,
        };
        let immediate_send_level = match env::var("TELEMETRY_IMMEDIATE_SEND_LEVEL") {
            Ok(val) => val.parse()?,
            Err(_) => defaults.immediate_send_level,
        };
        let reservoir_capacity = match parse_number("TELEMETRY_RESERVOIR_SIZE")? {
            Some(n) => usize::try_from(n).map_err(|e| {
                ConfigError::InvalidConfig(format!("TELEMETRY_RESERVOIR_SIZE: {e}"))
            })?,
            None => defaults.reservoir_capacity,
        };
        let reset_stats_on_flush =
            parse_bool("TELEMETRY_STATS_RESET")?.unwrap_or(defaults.reset_stats_on_flush);
        let log_flush_interval = parse_number("TELEMETRY_LOG_FLUSH_INTERVAL_SECS")?
            .map_or(defaults.log_flush_interval, Duration::from_secs);
        let stats_flush_interval = parse_number("TELEMETRY_STATS_FLUSH_INTERVAL_SECS")?
            .map_or(defaults.stats_flush_interval, Duration::from_secs);

        let config = Self {
            program_id,
            no_send_level,
            immediate_send_level,
            reservoir_capacity,
            default_timer_mask: defaults.default_timer_mask,
            reset_stats_on_flush,
            log_flush_interval,
            stats_flush_interval,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.reservoir_capacity == 0 {
            return Err(ConfigError::InvalidConfig(
                "Reservoir capacity must be greater than 0".to_string(),
            ));
        }

        if self.log_flush_interval.is_zero() || self.stats_flush_interval.is_zero() {
            return Err(ConfigError::InvalidConfig(
                "Flush intervals must be greater than 0".to_string(),
            ));
        }

        // Anything passing the immediate threshold must also pass the no-send one
        if self.immediate_send_level >= self.no_send_level {
            return Err(ConfigError::InvalidConfig(format!(
                "Immediate send level '{}' must be more severe than no-send level '{}'",
                self.immediate_send_level, self.no_send_level
            )));
        }

        Ok(())
    }

    /// Configured program id, or the file stem of the running executable.
    pub fn resolve_program_id(&self) -> String {
        self.program_id.clone().unwrap_or_else(|| {
            env::current_exe()
                .ok()
                .and_then(|path| path.file_stem().map(|s| s.to_string_lossy().into_owned()))
                .unwrap_or_else(|| UNKNOWN_PROGRAM_ID.to_string())
        })
    }
}

fn parse_number(var: &str) -> Result<Option<u64>, ConfigError> {
    match env::var(var) {
        Ok(val) => val
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidConfig(format!("{var}: {e}"))),
        Err(_) => Ok(None),
    }
}

fn parse_bool(var: &str) -> Result<Option<bool>, ConfigError> {
    match env::var(var) {
        Ok(val) => match val.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(Some(true)),
            "false" | "0" | "no" | "off" => Ok(Some(false)),
            _ => Err(ConfigError::InvalidConfig(format!(
                "{var}: expected a boolean, got '{val}'"
            ))),
        },
        Err(_) => Ok(None),
    }
}
