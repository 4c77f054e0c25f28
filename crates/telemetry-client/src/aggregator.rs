// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use crate::errors::TelemetryError;
use crate::metric::{MetricKind, MetricUpdate, StatMetric, StatSnapshot};
use crate::stats::StatMask;
use dashmap::DashMap;
use fnv::FnvBuildHasher;
use ustr::Ustr;

/// Concurrent map from metric key to [`StatMetric`].
///
/// Updates take a shard read guard and mutate the metric through atomics, so
/// concurrent updates to the same key never serialise on a table lock. A shard
/// write guard is only taken when a key is first created or removed.
#[derive(Debug)]
pub struct Aggregator {
    metrics: DashMap<Ustr, StatMetric, FnvBuildHasher>,
    reservoir_capacity: usize,
    default_mask: StatMask,
}

impl Aggregator {
    pub fn new(reservoir_capacity: usize, default_mask: StatMask) -> Self {
        Self {
            metrics: DashMap::with_hasher(FnvBuildHasher::default()),
            reservoir_capacity,
            default_mask,
        }
    }

    /// Apply `update` to `key`, creating the metric on first use with the
    /// kind implied by the update and the default tracking mask.
    pub fn update(&self, key: &str, update: MetricUpdate) -> Result<(), TelemetryError> {
        self.update_with_mask(key, update, self.default_mask)
    }

    /// Like [`Aggregator::update`], with the mask used if this call creates
    /// the metric.
    pub fn update_with_mask(
        &self,
        key: &str,
        update: MetricUpdate,
        mask: StatMask,
    ) -> Result<(), TelemetryError> {
        let key = Ustr::from(key);
        if let Some(metric) = self.metrics.get(&key) {
            return metric.apply(update);
        }
        let metric = self.metrics.entry(key).or_insert_with(|| {
            StatMetric::new(key, update.default_kind(), self.reservoir_capacity, mask)
        });
        // Downgrade before applying so readers of other keys in this shard
        // aren't held up by the atomic updates.
        let metric = metric.downgrade();
        metric.apply(update)
    }

    pub fn set_tracking_mask(&self, key: &str, mask: StatMask) -> bool {
        match self.metrics.get(&Ustr::from(key)) {
            Some(metric) => {
                metric.set_tracking_mask(mask);
                true
            }
            None => false,
        }
    }

    pub fn kind_of(&self, key: &str) -> Option<MetricKind> {
        self.metrics.get(&Ustr::from(key)).map(|m| m.kind())
    }

    pub fn get_snapshot(&self, key: &str) -> Option<StatSnapshot> {
        self.metrics.get(&Ustr::from(key)).map(|m| m.snapshot(false))
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }

    /// Snapshot every metric, leaving the entries in place. Timer windows
    /// are reset when `reset_windows` is set.
    pub fn snapshot(&self, reset_windows: bool) -> Vec<StatSnapshot> {
        self.metrics
            .iter()
            .map(|entry| entry.value().snapshot(reset_windows))
            .collect()
    }

    /// Remove every metric and return its final snapshot. An update racing
    /// with this either lands before its key is removed and is included, or
    /// after and starts a fresh entry for the next flush.
    pub fn consume(&self) -> Vec<StatSnapshot> {
        let keys: Vec<Ustr> = self.metrics.iter().map(|entry| *entry.key()).collect();
        keys.into_iter()
            .filter_map(|key| self.metrics.remove(&key))
            .map(|(_, metric)| metric.snapshot(true))
            .collect()
    }

    pub fn clear(&self) {
        self.metrics.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::Statistic;
    use std::sync::Arc;
    use std::thread;

    fn aggregator() -> Aggregator {
        Aggregator::new(64, StatMask::ALL)
    }

    #[test]
    fn test_lazy_creation_picks_kind() {
        let aggregator = aggregator();
        aggregator.update("hits", MetricUpdate::Add(1)).unwrap();
        aggregator.update("temp", MetricUpdate::Set(20)).unwrap();
        aggregator.update("latency", MetricUpdate::Observe(5)).unwrap();

        assert_eq!(aggregator.kind_of("hits"), Some(MetricKind::Counter));
        assert_eq!(aggregator.kind_of("temp"), Some(MetricKind::Gauge));
        assert_eq!(aggregator.kind_of("latency"), Some(MetricKind::Timer));
        assert_eq!(aggregator.kind_of("missing"), None);
        assert_eq!(aggregator.len(), 3);
    }

    #[test]
    fn test_mismatch_leaves_metric_untouched() {
        let aggregator = aggregator();
        aggregator.update("hits", MetricUpdate::Add(4)).unwrap();
        assert!(aggregator.update("hits", MetricUpdate::Observe(1)).is_err());
        assert_eq!(aggregator.get_snapshot("hits").unwrap().value, 4);
    }

    #[test]
    fn test_snapshot_keeps_entries() {
        let aggregator = aggregator();
        aggregator.update("hits", MetricUpdate::Add(2)).unwrap();
        assert_eq!(aggregator.snapshot(true).len(), 1);
        assert_eq!(aggregator.snapshot(true)[0].value, 2);
        assert_eq!(aggregator.len(), 1);
    }

    #[test]
    fn test_consume_empties_the_table() {
        let aggregator = aggregator();
        aggregator.update("a", MetricUpdate::Add(1)).unwrap();
        aggregator.update("b", MetricUpdate::Observe(9)).unwrap();

        let mut consumed = aggregator.consume();
        consumed.sort_by_key(|s| s.key.as_str().to_string());
        assert_eq!(consumed.len(), 2);
        assert_eq!(consumed[1].stat(Statistic::Max), Some(9));
        assert!(aggregator.is_empty());
        assert!(aggregator.consume().is_empty());
    }

    #[test]
    fn test_mask_applies_on_creation_only() {
        let aggregator = aggregator();
        let mask = StatMask::from(Statistic::Count);
        aggregator
            .update_with_mask("t", MetricUpdate::Observe(1), mask)
            .unwrap();
        aggregator
            .update_with_mask("t", MetricUpdate::Observe(2), StatMask::ALL)
            .unwrap();
        let snapshot = aggregator.get_snapshot("t").unwrap();
        assert_eq!(snapshot.stats, vec![(Statistic::Count, 2)]);

        assert!(aggregator.set_tracking_mask("t", StatMask::NONE));
        assert!(!aggregator.set_tracking_mask("missing", StatMask::NONE));
        assert!(aggregator.get_snapshot("t").unwrap().stats.is_empty());
    }

    #[test]
    fn test_concurrent_increments_are_not_lost() {
        let aggregator = Arc::new(aggregator());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let aggregator = Arc::clone(&aggregator);
                thread::spawn(move || {
                    for _ in 0..10_000 {
                        aggregator.update("shared", MetricUpdate::Add(1)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(aggregator.get_snapshot("shared").unwrap().value, 80_000);
    }
}
