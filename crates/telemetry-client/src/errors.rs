// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::metric::MetricKind;
use ustr::Ustr;

/// Failures reported to the client's error handler. None of these ever reach
/// the caller of a telemetry method.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Log message is empty")]
    EmptyMessage,

    #[error("Invalid log level code: {0}")]
    InvalidLevel(i32),

    #[error("Context key is empty")]
    EmptyContextKey,

    #[error("Metric {key} is a {existing}, cannot record it as a {requested}")]
    KindMismatch {
        key: Ustr,
        existing: MetricKind,
        requested: MetricKind,
    },

    #[error("Transport {transport} failed: {source}")]
    Transport {
        transport: String,
        #[source]
        source: TransportError,
    },

    #[error("Transport {transport} panicked during dispatch")]
    TransportPanicked { transport: String },
}

/// Errors a [`crate::transport::Transport`] can return.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Rejected: {0}")]
    Rejected(String),

    #[error("Transport is closed")]
    Closed,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown log level '{0}'")]
    UnknownLevel(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = TelemetryError::KindMismatch {
            key: Ustr::from("requests"),
            existing: MetricKind::Counter,
            requested: MetricKind::Timer,
        };
        assert_eq!(
            error.to_string(),
            "Metric requests is a counter, cannot record it as a timer"
        );
    }

    #[test]
    fn test_transport_error_source() {
        use std::error::Error;

        let error = TelemetryError::Transport {
            transport: "memory".to_string(),
            source: TransportError::Rejected("full".to_string()),
        };
        assert_eq!(error.to_string(), "Transport memory failed: Rejected: full");
        assert!(error.source().is_some());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let error: TransportError = io.into();
        assert!(matches!(error, TransportError::Io(_)));
    }
}
