// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::errors::TelemetryError;
use crate::reservoir::Reservoir;
use crate::stats::{SampleWindow, StatMask, Statistic};
use parking_lot::RwLock;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicU16, AtomicU64, Ordering};
use ustr::Ustr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Counter,
    Gauge,
    Timer,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Timer => "timer",
        })
    }
}

/// A single update applied to a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricUpdate {
    /// Accumulate into a counter or gauge.
    Add(i64),
    /// Overwrite a gauge.
    Set(i64),
    /// Record a timer observation.
    Observe(i64),
}

impl MetricUpdate {
    /// Kind of metric created when this update is the first for its key.
    pub const fn default_kind(self) -> MetricKind {
        match self {
            Self::Add(_) => MetricKind::Counter,
            Self::Set(_) => MetricKind::Gauge,
            Self::Observe(_) => MetricKind::Timer,
        }
    }

    const fn accepted_by(self, kind: MetricKind) -> bool {
        matches!(
            (self, kind),
            (Self::Add(_), MetricKind::Counter | MetricKind::Gauge)
                | (Self::Set(_), MetricKind::Gauge)
                | (Self::Observe(_), MetricKind::Timer)
        )
    }
}

/// Sample window of a timer: retained observations plus the exact sum and
/// count of everything observed since the last reset.
#[derive(Debug)]
struct TimerWindow {
    samples: Reservoir,
    sum: AtomicI64,
    count: AtomicU64,
}

impl TimerWindow {
    fn new(reservoir_capacity: usize) -> Self {
        Self {
            samples: Reservoir::new(reservoir_capacity),
            sum: AtomicI64::new(0),
            count: AtomicU64::new(0),
        }
    }

    fn observe(&self, value: i64) {
        self.samples.add_sample(value);
        self.sum.fetch_add(value, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    /// Only consistent with no `observe` in flight, i.e. under the write guard.
    fn current(&self) -> SampleWindow {
        SampleWindow {
            sorted: self.samples.sorted_snapshot(),
            sum: self.sum.load(Ordering::Relaxed),
            count: self.count.load(Ordering::Relaxed),
        }
    }

    fn take(&mut self) -> SampleWindow {
        let window = self.current();
        self.clear();
        window
    }

    fn clear(&mut self) {
        self.samples.reset();
        *self.sum.get_mut() = 0;
        *self.count.get_mut() = 0;
    }
}

/// One aggregated metric.
///
/// Counter and gauge updates touch only atomics. Timer observations hold the
/// window's read guard, so producers never wait on each other; reading or
/// resetting the window takes the write guard, which excludes every
/// observation in flight. The lock is scoped to this metric alone.
#[derive(Debug)]
pub struct StatMetric {
    key: Ustr,
    kind: MetricKind,
    counter: AtomicI64,
    updates: AtomicU64,
    tracking_mask: AtomicU16,
    window: Option<RwLock<TimerWindow>>,
}

impl StatMetric {
    pub fn new(key: Ustr, kind: MetricKind, reservoir_capacity: usize, mask: StatMask) -> Self {
        let window = (kind == MetricKind::Timer)
            .then(|| RwLock::new(TimerWindow::new(reservoir_capacity)));
        Self {
            key,
            kind,
            counter: AtomicI64::new(0),
            updates: AtomicU64::new(0),
            tracking_mask: AtomicU16::new(mask.bits()),
            window,
        }
    }

    pub fn key(&self) -> Ustr {
        self.key
    }

    pub fn kind(&self) -> MetricKind {
        self.kind
    }

    pub fn counter(&self) -> i64 {
        self.counter.load(Ordering::Acquire)
    }

    /// Updates since creation, or for timers, observations in the current
    /// window.
    pub fn update_count(&self) -> u64 {
        match &self.window {
            Some(window) => window.write().count.load(Ordering::Relaxed),
            None => self.updates.load(Ordering::Acquire),
        }
    }

    pub fn tracking_mask(&self) -> StatMask {
        StatMask::from_bits(self.tracking_mask.load(Ordering::Relaxed))
    }

    pub fn set_tracking_mask(&self, mask: StatMask) {
        self.tracking_mask.store(mask.bits(), Ordering::Relaxed);
    }

    pub fn apply(&self, update: MetricUpdate) -> Result<(), TelemetryError> {
        if !update.accepted_by(self.kind) {
            return Err(TelemetryError::KindMismatch {
                key: self.key,
                existing: self.kind,
                requested: update.default_kind(),
            });
        }
        match update {
            MetricUpdate::Add(delta) => {
                self.counter.fetch_add(delta, Ordering::AcqRel);
                self.updates.fetch_add(1, Ordering::AcqRel);
            }
            MetricUpdate::Set(value) => {
                self.counter.store(value, Ordering::Release);
                self.updates.fetch_add(1, Ordering::AcqRel);
            }
            MetricUpdate::Observe(value) => {
                if let Some(window) = &self.window {
                    let window = window.read();
                    self.counter.fetch_add(value, Ordering::AcqRel);
                    window.observe(value);
                }
            }
        }
        Ok(())
    }

    /// Statistics selected by the tracking mask for the current window. Empty
    /// for counters, gauges and a zero mask.
    pub fn derived_stats(&self) -> Vec<(Statistic, i64)> {
        let mask = self.tracking_mask();
        match &self.window {
            Some(window) if !mask.is_empty() => window.write().current().derive(mask),
            _ => Vec::new(),
        }
    }

    /// Zero the sample window (reservoir, window sum, window count). The
    /// running counter is kept.
    pub fn reset_samples(&self) {
        if let Some(window) = &self.window {
            window.write().clear();
        }
    }

    /// Zero everything, counter included.
    pub fn reset(&self) {
        let mut window = self.window.as_ref().map(|window| window.write());
        if let Some(window) = window.as_mut() {
            window.clear();
        }
        self.counter.store(0, Ordering::Release);
        self.updates.store(0, Ordering::Release);
    }

    /// Read this metric for dispatch. The running value and the window are
    /// read under one write guard, so every observation lands in exactly one
    /// window with its value, sum and count together. With `reset_window`
    /// the window is cleared in the same critical section.
    pub fn snapshot(&self, reset_window: bool) -> StatSnapshot {
        let Some(window) = &self.window else {
            return StatSnapshot {
                key: self.key,
                kind: self.kind,
                value: self.counter(),
                update_count: self.update_count(),
                stats: Vec::new(),
            };
        };
        let mut window = window.write();
        let value = self.counter();
        let current = if reset_window {
            window.take()
        } else {
            window.current()
        };
        StatSnapshot {
            key: self.key,
            kind: self.kind,
            value,
            update_count: current.count,
            stats: current.derive(self.tracking_mask()),
        }
    }
}

/// What transports receive for one metric at flush time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatSnapshot {
    pub key: Ustr,
    pub kind: MetricKind,
    /// Running counter, current gauge value, or running timer total.
    pub value: i64,
    pub update_count: u64,
    /// Derived timer statistics in [`Statistic::ALL`] order; empty otherwise.
    pub stats: Vec<(Statistic, i64)>,
}

impl StatSnapshot {
    pub fn stat(&self, statistic: Statistic) -> Option<i64> {
        self.stats
            .iter()
            .find(|(s, _)| *s == statistic)
            .map(|(_, v)| *v)
    }
}
