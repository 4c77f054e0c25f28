// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Syslog-style severities. Lower numeric values are more severe.

use crate::errors::ConfigError;
use crate::trace_id::TraceId;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
#[repr(i8)]
pub enum LogLevel {
    /// Always reported when sent, never filtered by level.
    Off = -1,
    Emerg = 0,
    Alert = 1,
    Crit = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    Info = 6,
    Debug = 7,
    All = 8,
}

impl LogLevel {
    pub const fn code(self) -> i32 {
        self as i32
    }

    pub const fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            -1 => Self::Off,
            0 => Self::Emerg,
            1 => Self::Alert,
            2 => Self::Crit,
            3 => Self::Error,
            4 => Self::Warning,
            5 => Self::Notice,
            6 => Self::Info,
            7 => Self::Debug,
            8 => Self::All,
            _ => return None,
        })
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Emerg => "emerg",
            Self::Alert => "alert",
            Self::Crit => "crit",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Notice => "notice",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::All => "all",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogLevel {
    type Err = ConfigError;

    /// Accepts level names (case-insensitive, with the usual short aliases)
    /// or integer codes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Ok(code) = trimmed.parse::<i32>() {
            return Self::from_code(code).ok_or_else(|| ConfigError::UnknownLevel(s.to_string()));
        }
        match trimmed.to_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "emerg" | "emergency" => Ok(Self::Emerg),
            "alert" => Ok(Self::Alert),
            "crit" | "critical" => Ok(Self::Crit),
            "err" | "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warning),
            "notice" => Ok(Self::Notice),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "all" => Ok(Self::All),
            _ => Err(ConfigError::UnknownLevel(s.to_string())),
        }
    }
}

/// Whether a message at `level` passes the no-send filter.
///
/// A non-sentinel trace id always enables the message; otherwise it must be
/// strictly more severe than `no_send_level`.
pub fn level_is_enabled(level: LogLevel, trace_id: Option<TraceId>, no_send_level: LogLevel) -> bool {
    match trace_id {
        Some(id) if id.is_traced() => true,
        _ => level < no_send_level,
    }
}
