// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The aggregation and flush core.
//!
//! Producers call [`Client::log`], [`Client::increment`], [`Client::timer`]
//! and friends from any number of threads. Those calls only touch the log
//! buffer and the aggregation table, which synchronise per entry. Flushes
//! drain or snapshot that state and hand it to every registered transport,
//! one dispatch at a time.
//!
//! No telemetry call returns an error or lets a transport panic escape:
//! failures go to the installed error handler and the update is dropped.

use crate::aggregator::Aggregator;
use crate::caller::{CallerResolver, LocationResolver};
use crate::config::ClientConfig;
use crate::constants::MAX_BUFFERED_LOGS;
use crate::context::{Context, ContextSet};
use crate::errors::{ConfigError, TelemetryError, TransportError};
use crate::level::{level_is_enabled, LogLevel};
use crate::log_buffer::{LogBuffer, LogSite, RecordOutcome};
use crate::metric::{MetricKind, MetricUpdate, StatSnapshot};
use crate::stats::StatMask;
use crate::trace_id::TraceId;
use crate::transport::Transport;
use parking_lot::{ReentrantMutex, RwLock};
use std::cell::Cell;
use std::panic::{catch_unwind, AssertUnwindSafe, Location};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Receives every failure inside the client.
pub type ErrorHandler = Arc<dyn Fn(&TelemetryError) + Send + Sync>;

fn default_error_handler() -> ErrorHandler {
    Arc::new(|err: &TelemetryError| error!("Telemetry error: {err}"))
}

pub struct Client {
    program_id: String,
    config: ClientConfig,
    logs: LogBuffer,
    aggregator: Aggregator,
    contexts: ContextSet,
    transports: RwLock<Vec<Arc<dyn Transport>>>,
    // Cell is true while this thread is inside a dispatch; a transport that
    // logs back into the client must not re-enter dispatch.
    dispatch: ReentrantMutex<Cell<bool>>,
    error_handler: RwLock<ErrorHandler>,
    caller_resolver: RwLock<Arc<dyn CallerResolver>>,
    shut_down: AtomicBool,
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let program_id = config.resolve_program_id();
        debug!("Creating telemetry client for {program_id}");
        Ok(Self {
            program_id,
            logs: LogBuffer::default(),
            aggregator: Aggregator::new(config.reservoir_capacity, config.default_timer_mask),
            contexts: ContextSet::default(),
            transports: RwLock::new(Vec::new()),
            dispatch: ReentrantMutex::new(Cell::new(false)),
            error_handler: RwLock::new(default_error_handler()),
            caller_resolver: RwLock::new(Arc::new(LocationResolver::default())),
            shut_down: AtomicBool::new(false),
            config,
        })
    }

    pub fn program_id(&self) -> &str {
        &self.program_id
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn add_transport(&self, transport: Arc<dyn Transport>) {
        debug!("Registering transport {}", transport.name());
        self.transports.write().push(transport);
    }

    pub fn transport_count(&self) -> usize {
        self.transports.read().len()
    }

    /// Install `handler`. `None` keeps the current handler rather than
    /// disabling error reporting.
    pub fn set_error_handler(&self, handler: Option<ErrorHandler>) {
        if let Some(handler) = handler {
            *self.error_handler.write() = handler;
        }
    }

    pub fn set_caller_resolver(&self, resolver: Arc<dyn CallerResolver>) {
        *self.caller_resolver.write() = resolver;
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::Acquire)
    }

    fn report(&self, err: TelemetryError) {
        let handler = Arc::clone(&self.error_handler.read());
        handler(&err);
    }

    // Logs

    pub fn level_is_enabled(&self, level: LogLevel, trace_id: Option<TraceId>) -> bool {
        level_is_enabled(level, trace_id, self.config.no_send_level)
    }

    pub fn log(&self, site: LogSite, level: LogLevel, trace_id: Option<TraceId>, message: &str) {
        if self.is_shut_down() {
            return;
        }
        if message.is_empty() {
            self.report(TelemetryError::EmptyMessage);
            return;
        }
        if !self.level_is_enabled(level, trace_id) {
            return;
        }

        let traced = trace_id.is_some_and(TraceId::is_traced);
        match self.logs.record(site, level, trace_id, message) {
            RecordOutcome::RepeatLimit => {
                debug!("Log site {site} hit the repeat limit, flushing");
                self.flush_logs();
            }
            RecordOutcome::Buffered { buffered } => {
                if traced
                    || level <= self.config.immediate_send_level
                    || buffered >= MAX_BUFFERED_LOGS
                {
                    self.flush_logs();
                }
            }
        }
    }

    /// [`Client::log`] for callers holding a numeric level. Unknown codes are
    /// reported and the message dropped.
    pub fn log_with_code(
        &self,
        site: LogSite,
        code: i32,
        trace_id: Option<TraceId>,
        message: &str,
    ) {
        match LogLevel::from_code(code) {
            Some(level) => self.log(site, level, trace_id, message),
            None => self.report(TelemetryError::InvalidLevel(code)),
        }
    }

    pub fn emerg(&self, site: LogSite, message: &str) {
        self.log(site, LogLevel::Emerg, None, message);
    }

    pub fn alert(&self, site: LogSite, message: &str) {
        self.log(site, LogLevel::Alert, None, message);
    }

    pub fn crit(&self, site: LogSite, message: &str) {
        self.log(site, LogLevel::Crit, None, message);
    }

    pub fn error(&self, site: LogSite, message: &str) {
        self.log(site, LogLevel::Error, None, message);
    }

    pub fn warning(&self, site: LogSite, message: &str) {
        self.log(site, LogLevel::Warning, None, message);
    }

    pub fn notice(&self, site: LogSite, message: &str) {
        self.log(site, LogLevel::Notice, None, message);
    }

    pub fn info(&self, site: LogSite, message: &str) {
        self.log(site, LogLevel::Info, None, message);
    }

    pub fn debug(&self, site: LogSite, message: &str) {
        self.log(site, LogLevel::Debug, None, message);
    }

    pub fn buffered_logs(&self) -> usize {
        self.logs.len()
    }

    /// Drain the log buffer to every transport. The buffer is cleared even
    /// when a transport fails.
    pub fn flush_logs(&self) {
        let guard = self.dispatch.lock();
        if guard.replace(true) {
            // re-entered from a transport, leave the messages for the next flush
            return;
        }
        let logs = self.logs.drain();
        if !logs.is_empty() {
            let contexts = self.contexts.snapshot();
            debug!("Flushing {} log messages", logs.len());
            self.dispatch(|transport| transport.send_logs(&self.program_id, &logs, &contexts));
        }
        guard.set(false);
    }

    // Stats

    pub fn increment(&self, key: &str, amount: i64) {
        self.update(key, MetricUpdate::Add(amount));
    }

    pub fn decrement(&self, key: &str, amount: i64) {
        self.update(key, MetricUpdate::Add(amount.saturating_neg()));
    }

    pub fn set_gauge(&self, key: &str, value: i64) {
        self.update(key, MetricUpdate::Set(value));
    }

    /// Record one timer observation, usually milliseconds.
    pub fn timer(&self, key: &str, value: i64) {
        self.update(key, MetricUpdate::Observe(value));
    }

    /// Like [`Client::timer`]; `mask` is used if this call creates the timer.
    pub fn timer_with_mask(&self, key: &str, value: i64, mask: StatMask) {
        if self.is_shut_down() {
            return;
        }
        if let Err(err) = self
            .aggregator
            .update_with_mask(key, MetricUpdate::Observe(value), mask)
        {
            self.report(err);
        }
    }

    /// Change which statistics an existing timer reports. Returns false if
    /// `key` has no metric yet.
    pub fn set_tracking_mask(&self, key: &str, mask: StatMask) -> bool {
        self.aggregator.set_tracking_mask(key, mask)
    }

    /// Time the scope of the returned guard into the timer `key`.
    pub fn start_timer(&self, key: &str) -> TimerGuard<'_> {
        TimerGuard {
            client: self,
            key: key.to_string(),
            start: Instant::now(),
            stopped: false,
        }
    }

    #[track_caller]
    pub fn increment_at_caller(&self, amount: i64) {
        if let Some(key) = self.caller_key(Location::caller()) {
            self.increment(&key, amount);
        }
    }

    #[track_caller]
    pub fn decrement_at_caller(&self, amount: i64) {
        if let Some(key) = self.caller_key(Location::caller()) {
            self.decrement(&key, amount);
        }
    }

    #[track_caller]
    pub fn set_gauge_at_caller(&self, value: i64) {
        if let Some(key) = self.caller_key(Location::caller()) {
            self.set_gauge(&key, value);
        }
    }

    #[track_caller]
    pub fn timer_at_caller(&self, value: i64) {
        if let Some(key) = self.caller_key(Location::caller()) {
            self.timer(&key, value);
        }
    }

    fn caller_key(&self, location: &'static Location<'static>) -> Option<String> {
        let resolver = Arc::clone(&self.caller_resolver.read());
        resolver.resolve(location)
    }

    fn update(&self, key: &str, update: MetricUpdate) {
        if self.is_shut_down() {
            return;
        }
        if let Err(err) = self.aggregator.update(key, update) {
            self.report(err);
        }
    }

    pub fn metric(&self, key: &str) -> Option<StatSnapshot> {
        self.aggregator.get_snapshot(key)
    }

    pub fn metric_kind(&self, key: &str) -> Option<MetricKind> {
        self.aggregator.kind_of(key)
    }

    /// Snapshot every metric to every transport. With `reset` the table is
    /// emptied; otherwise counters keep accumulating. Timer sample windows
    /// restart on every flush either way.
    pub fn flush_stats(&self, reset: bool) {
        let guard = self.dispatch.lock();
        if guard.replace(true) {
            return;
        }
        let stats = if reset {
            self.aggregator.consume()
        } else {
            self.aggregator.snapshot(true)
        };
        if !stats.is_empty() {
            let contexts = self.contexts.snapshot();
            debug!("Flushing {} metrics (reset: {reset})", stats.len());
            self.dispatch(|transport| transport.send_stats(&self.program_id, &stats, &contexts));
        }
        guard.set(false);
    }

    /// Flush logs, then stats with the configured reset policy.
    pub fn flush(&self) {
        self.flush_logs();
        self.flush_stats(self.config.reset_stats_on_flush);
    }

    // Contexts

    pub fn add_context(&self, key: &str, value: &str) {
        if let Err(err) = self.contexts.insert(key, value) {
            self.report(err);
        }
    }

    pub fn remove_context(&self, key: &str) -> Option<String> {
        self.contexts.remove(key)
    }

    pub fn clear_contexts(&self) {
        self.contexts.clear();
    }

    pub fn contexts(&self) -> Vec<Context> {
        self.contexts.snapshot()
    }

    /// Stop accepting telemetry, flush what was recorded, then shut every
    /// transport down. Later calls do nothing.
    pub fn shutdown(&self) {
        if self.shut_down.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!("Shutting down telemetry client for {}", self.program_id);
        self.flush();
        let _guard = self.dispatch.lock();
        self.dispatch(|transport| transport.shutdown());
    }

    /// Caller must hold the dispatch lock.
    fn dispatch<F>(&self, send: F)
    where
        F: Fn(&dyn Transport) -> Result<(), TransportError>,
    {
        let transports = self.transports.read().clone();
        for transport in transports {
            match catch_unwind(AssertUnwindSafe(|| send(transport.as_ref()))) {
                Ok(Ok(())) => {}
                Ok(Err(source)) => self.report(TelemetryError::Transport {
                    transport: transport.name().to_string(),
                    source,
                }),
                Err(_) => self.report(TelemetryError::TransportPanicked {
                    transport: transport.name().to_string(),
                }),
            }
        }
    }
}

/// Records the time since [`Client::start_timer`] when stopped or dropped.
pub struct TimerGuard<'a> {
    client: &'a Client,
    key: String,
    start: Instant,
    stopped: bool,
}

impl TimerGuard<'_> {
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Record now and return the measured duration.
    pub fn stop(mut self) -> Duration {
        self.record()
    }

    fn record(&mut self) -> Duration {
        let elapsed = self.start.elapsed();
        if !self.stopped {
            self.stopped = true;
            let millis = i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX);
            self.client.timer(&self.key, millis);
        }
        elapsed
    }
}

impl Drop for TimerGuard<'_> {
    fn drop(&mut self) {
        self.record();
    }
}
