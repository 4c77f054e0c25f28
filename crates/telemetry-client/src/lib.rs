// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-process telemetry client.
//!
//! Application code emits log events, counters, gauges and timers through a
//! [`client::Client`]. Updates are aggregated locally (logs deduplicated per
//! call site, metrics merged per key, timers sampled into bounded reservoirs)
//! and flushed as snapshots to every registered [`transport::Transport`].

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod aggregator;
pub mod caller;
pub mod client;
pub mod config;
pub mod constants;
pub mod context;
pub mod errors;
pub mod flusher;
pub mod json_transport;
pub mod level;
pub mod log_buffer;
pub mod metric;
pub mod reservoir;
pub mod stats;
pub mod trace_id;
pub mod transport;

pub use client::Client;
pub use config::ClientConfig;
pub use context::Context;
pub use errors::{TelemetryError, TransportError};
pub use level::LogLevel;
pub use log_buffer::{LogMessage, LogSite};
pub use metric::{MetricKind, StatSnapshot};
pub use stats::{StatMask, Statistic};
pub use trace_id::{TraceId, NULL_TRACE_ID};
pub use transport::Transport;
