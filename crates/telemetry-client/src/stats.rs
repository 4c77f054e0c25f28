// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Derived statistics reported for timers.

use crate::reservoir::percentile;
use serde::Serialize;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    Min,
    Max,
    Avg,
    Sum,
    Count,
    Median,
    Pctl75,
    Pctl90,
    Pctl95,
    Pctl99,
    Pctl999,
}

impl Statistic {
    pub const ALL: [Statistic; 11] = [
        Statistic::Min,
        Statistic::Max,
        Statistic::Avg,
        Statistic::Sum,
        Statistic::Count,
        Statistic::Median,
        Statistic::Pctl75,
        Statistic::Pctl90,
        Statistic::Pctl95,
        Statistic::Pctl99,
        Statistic::Pctl999,
    ];

    pub const fn bit(self) -> u16 {
        1 << (self as u16)
    }

    /// Fraction used against the sorted reservoir, `None` for the aggregates
    /// computed from running totals.
    pub const fn quantile(self) -> Option<f64> {
        match self {
            Self::Min => Some(0.0),
            Self::Max => Some(1.0),
            Self::Median => Some(0.5),
            Self::Pctl75 => Some(0.75),
            Self::Pctl90 => Some(0.9),
            Self::Pctl95 => Some(0.95),
            Self::Pctl99 => Some(0.99),
            Self::Pctl999 => Some(0.999),
            Self::Avg | Self::Sum | Self::Count => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Max => "max",
            Self::Avg => "avg",
            Self::Sum => "sum",
            Self::Count => "count",
            Self::Median => "median",
            Self::Pctl75 => "p75",
            Self::Pctl90 => "p90",
            Self::Pctl95 => "p95",
            Self::Pctl99 => "p99",
            Self::Pctl999 => "p999",
        }
    }
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bitmask selecting which [`Statistic`]s a timer reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct StatMask(u16);

impl StatMask {
    pub const NONE: StatMask = StatMask(0);
    pub const ALL: StatMask = StatMask((1 << Statistic::ALL.len()) - 1);

    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Unknown bits are dropped.
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits & Self::ALL.0)
    }

    pub const fn contains(self, statistic: Statistic) -> bool {
        self.0 & statistic.bit() != 0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = Statistic> {
        Statistic::ALL.into_iter().filter(move |s| self.contains(*s))
    }
}

impl From<Statistic> for StatMask {
    fn from(statistic: Statistic) -> Self {
        Self(statistic.bit())
    }
}

impl FromIterator<Statistic> for StatMask {
    fn from_iter<I: IntoIterator<Item = Statistic>>(iter: I) -> Self {
        iter.into_iter().fold(Self::NONE, |mask, s| mask | s)
    }
}

impl<T: Into<StatMask>> BitOr<T> for StatMask {
    type Output = StatMask;

    fn bitor(self, rhs: T) -> StatMask {
        StatMask(self.0 | rhs.into().0)
    }
}

impl BitOr for Statistic {
    type Output = StatMask;

    fn bitor(self, rhs: Statistic) -> StatMask {
        StatMask(self.bit() | rhs.bit())
    }
}

impl<T: Into<StatMask>> BitOrAssign<T> for StatMask {
    fn bitor_assign(&mut self, rhs: T) {
        self.0 |= rhs.into().0;
    }
}

/// One sample window: the sorted retained observations plus the running
/// sum and count of every observation in the window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SampleWindow {
    pub sorted: Vec<i64>,
    pub sum: i64,
    pub count: u64,
}

impl SampleWindow {
    pub fn value(&self, statistic: Statistic) -> i64 {
        if self.count == 0 {
            return 0;
        }
        match statistic.quantile() {
            Some(p) => percentile(&self.sorted, p),
            None => match statistic {
                Statistic::Sum => self.sum,
                Statistic::Count => i64::try_from(self.count).unwrap_or(i64::MAX),
                // floor division, count is never zero here
                _ => self
                    .sum
                    .div_euclid(i64::try_from(self.count).unwrap_or(i64::MAX)),
            },
        }
    }

    /// Values for every statistic in `mask`, in [`Statistic::ALL`] order.
    pub fn derive(&self, mask: StatMask) -> Vec<(Statistic, i64)> {
        mask.iter().map(|s| (s, self.value(s))).collect()
    }
}
