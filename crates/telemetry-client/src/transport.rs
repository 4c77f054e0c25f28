// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The boundary between the aggregation core and whatever ships the data.

use crate::context::Context;
use crate::errors::TransportError;
use crate::level::LogLevel;
use crate::log_buffer::LogMessage;
use crate::metric::StatSnapshot;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, Level};

/// Consumer of flushed snapshots.
///
/// The client never calls a transport concurrently with itself, so
/// implementations don't need their own dispatch locking.
pub trait Transport: Send + Sync {
    /// Used when reporting failures.
    fn name(&self) -> &str;

    fn send_logs(
        &self,
        program_id: &str,
        logs: &[LogMessage],
        contexts: &[Context],
    ) -> Result<(), TransportError>;

    fn send_stats(
        &self,
        program_id: &str,
        stats: &[StatSnapshot],
        contexts: &[Context],
    ) -> Result<(), TransportError>;

    fn shutdown(&self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogBatch {
    pub program_id: String,
    pub logs: Vec<LogMessage>,
    pub contexts: Vec<Context>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsBatch {
    pub program_id: String,
    pub stats: Vec<StatSnapshot>,
    pub contexts: Vec<Context>,
}

/// Keeps every batch it receives. Useful in tests and for callers that want
/// to inspect what would have been shipped.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    name: String,
    logs: Mutex<Vec<LogBatch>>,
    stats: Mutex<Vec<StatsBatch>>,
    failing: AtomicBool,
    shut_down: AtomicBool,
}

impl MemoryTransport {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// While set, every send is rejected (and nothing is recorded).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Release);
    }

    pub fn log_batches(&self) -> Vec<LogBatch> {
        self.logs.lock().clone()
    }

    pub fn stats_batches(&self) -> Vec<StatsBatch> {
        self.stats.lock().clone()
    }

    /// Every log message across all batches.
    pub fn logs(&self) -> Vec<LogMessage> {
        self.logs
            .lock()
            .iter()
            .flat_map(|batch| batch.logs.iter().cloned())
            .collect()
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    fn check(&self) -> Result<(), TransportError> {
        if self.is_shut_down() {
            return Err(TransportError::Closed);
        }
        if self.failing.load(Ordering::Acquire) {
            return Err(TransportError::Rejected(format!("{} is failing", self.name)));
        }
        Ok(())
    }
}

impl Transport for MemoryTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn send_logs(
        &self,
        program_id: &str,
        logs: &[LogMessage],
        contexts: &[Context],
    ) -> Result<(), TransportError> {
        self.check()?;
        self.logs.lock().push(LogBatch {
            program_id: program_id.to_string(),
            logs: logs.to_vec(),
            contexts: contexts.to_vec(),
        });
        Ok(())
    }

    fn send_stats(
        &self,
        program_id: &str,
        stats: &[StatSnapshot],
        contexts: &[Context],
    ) -> Result<(), TransportError> {
        self.check()?;
        self.stats.lock().push(StatsBatch {
            program_id: program_id.to_string(),
            stats: stats.to_vec(),
            contexts: contexts.to_vec(),
        });
        Ok(())
    }

    fn shutdown(&self) -> Result<(), TransportError> {
        self.shut_down.store(true, Ordering::Release);
        Ok(())
    }
}

/// Emits each record as a `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingTransport;

impl Transport for TracingTransport {
    fn name(&self) -> &str {
        "tracing"
    }

    fn send_logs(
        &self,
        program_id: &str,
        logs: &[LogMessage],
        contexts: &[Context],
    ) -> Result<(), TransportError> {
        let contexts = render_contexts(contexts);
        for log in logs {
            let site = log.site.to_string();
            let trace_id = log.trace_id.map(|id| id.to_string()).unwrap_or_default();
            macro_rules! emit {
                ($lvl:expr) => {
                    tracing::event!(
                        $lvl,
                        program_id,
                        site = %site,
                        severity = %log.level,
                        repeat = log.repeat,
                        trace_id = %trace_id,
                        contexts = %contexts,
                        "{}",
                        log.message
                    )
                };
            }
            match log.level {
                LogLevel::Off
                | LogLevel::Emerg
                | LogLevel::Alert
                | LogLevel::Crit
                | LogLevel::Error => emit!(Level::ERROR),
                LogLevel::Warning => emit!(Level::WARN),
                LogLevel::Notice | LogLevel::Info => emit!(Level::INFO),
                LogLevel::Debug | LogLevel::All => emit!(Level::DEBUG),
            }
        }
        Ok(())
    }

    fn send_stats(
        &self,
        program_id: &str,
        stats: &[StatSnapshot],
        contexts: &[Context],
    ) -> Result<(), TransportError> {
        let contexts = render_contexts(contexts);
        for stat in stats {
            let derived = stat
                .stats
                .iter()
                .map(|(s, v)| format!("{s}={v}"))
                .collect::<Vec<_>>()
                .join(",");
            info!(
                program_id,
                key = %stat.key,
                kind = %stat.kind,
                value = stat.value,
                updates = stat.update_count,
                stats = %derived,
                contexts = %contexts,
                "stat"
            );
        }
        Ok(())
    }
}

fn render_contexts(contexts: &[Context]) -> String {
    contexts
        .iter()
        .map(|c| format!("{}:{}", c.key, c.value))
        .collect::<Vec<_>>()
        .join(",")
}
