// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Bounded uniform sample of an unbounded stream of observations.

use rand::Rng;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

/// Fixed-capacity reservoir filled with Algorithm R.
///
/// After `n` observations every one of them is retained with probability
/// `capacity / n`. Sampling is lock-free: the observation index is claimed
/// with an atomic increment and the slot is written with an atomic store.
///
/// A claimed slot is written after `seen` moves, so [`Reservoir::snapshot`]
/// only reflects exactly the offered values when no `add_sample` is in
/// flight. Owners that read while producers run must exclude them, e.g. by
/// sampling under a read guard and snapshotting under the write guard.
#[derive(Debug)]
pub struct Reservoir {
    slots: Box<[AtomicI64]>,
    seen: AtomicU64,
}

impl Reservoir {
    /// A zero capacity is raised to one so the reservoir can always answer
    /// percentile queries.
    pub fn new(capacity: usize) -> Self {
        let slots = (0..capacity.max(1))
            .map(|_| AtomicI64::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            slots,
            seen: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of observations offered since creation or the last reset.
    pub fn seen(&self) -> u64 {
        self.seen.load(Ordering::Acquire)
    }

    pub fn add_sample(&self, value: i64) -> bool {
        let n = self.seen.fetch_add(1, Ordering::AcqRel);
        let capacity = self.slots.len() as u64;
        let slot = if n < capacity {
            Some(n)
        } else {
            // n observations came before this one, so this is the (n + 1)th
            let r = rand::thread_rng().gen_range(0..=n);
            (r < capacity).then_some(r)
        };
        if let Some(index) = slot.and_then(|s| usize::try_from(s).ok()) {
            if let Some(cell) = self.slots.get(index) {
                cell.store(value, Ordering::Release);
            }
        }
        true
    }

    /// Copy of the retained observations, `min(seen, capacity)` long.
    pub fn snapshot(&self) -> Vec<i64> {
        let len = usize::try_from(self.seen()).map_or(self.slots.len(), |n| n.min(self.slots.len()));
        self.slots
            .iter()
            .take(len)
            .map(|cell| cell.load(Ordering::Acquire))
            .collect()
    }

    /// Sorted copy, ready for [`percentile`].
    pub fn sorted_snapshot(&self) -> Vec<i64> {
        let mut values = self.snapshot();
        values.sort_unstable();
        values
    }

    pub fn reset(&mut self) {
        *self.seen.get_mut() = 0;
        for cell in self.slots.iter_mut() {
            *cell.get_mut() = 0;
        }
    }
}

/// `sorted[floor((len - 1) * p)]`, or 0 for an empty slice. `p` is clamped to
/// `[0, 1]`, so 0 yields the minimum and 1 the maximum.
pub fn percentile(sorted: &[i64], p: f64) -> i64 {
    if sorted.is_empty() {
        return 0;
    }
    let p = p.clamp(0.0, 1.0);
    let last = sorted.len() - 1;
    let index = ((last as f64) * p).floor() as usize;
    sorted.get(index.min(last)).copied().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::RwLock;
    use proptest::prelude::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fills_in_order_below_capacity() {
        let reservoir = Reservoir::new(4);
        assert!(reservoir.snapshot().is_empty());
        for value in [7, 3, 9] {
            assert!(reservoir.add_sample(value));
        }
        assert_eq!(reservoir.snapshot(), vec![7, 3, 9]);
        assert_eq!(reservoir.seen(), 3);
    }

    #[test]
    fn test_snapshot_is_bounded_by_capacity() {
        let reservoir = Reservoir::new(8);
        for value in 0..10_000 {
            reservoir.add_sample(value);
        }
        let snapshot = reservoir.snapshot();
        assert_eq!(snapshot.len(), 8);
        assert!(snapshot.iter().all(|v| (0..10_000).contains(v)));
        assert_eq!(reservoir.seen(), 10_000);
    }

    #[test]
    fn test_reset_empties_the_window() {
        let mut reservoir = Reservoir::new(2);
        reservoir.add_sample(5);
        reservoir.add_sample(6);
        reservoir.add_sample(7);
        reservoir.reset();
        assert_eq!(reservoir.seen(), 0);
        assert!(reservoir.snapshot().is_empty());

        reservoir.add_sample(11);
        assert_eq!(reservoir.snapshot(), vec![11]);
    }

    #[test]
    fn test_zero_capacity_is_raised() {
        let reservoir = Reservoir::new(0);
        assert_eq!(reservoir.capacity(), 1);
        reservoir.add_sample(3);
        assert_eq!(reservoir.snapshot(), vec![3]);
    }

    #[test]
    fn test_retention_is_roughly_uniform() {
        // Each of 100 values should survive in a 10-slot reservoir ~10% of the time.
        let mut early = 0u32;
        let mut late = 0u32;
        for _ in 0..2_000 {
            let reservoir = Reservoir::new(10);
            for value in 0..100 {
                reservoir.add_sample(value);
            }
            let snapshot = reservoir.snapshot();
            early += snapshot.iter().filter(|v| **v < 10).count() as u32;
            late += snapshot.iter().filter(|v| **v >= 90).count() as u32;
        }
        // Expected 2000 each; allow generous slack.
        assert!((1_500..2_500).contains(&early), "early = {early}");
        assert!((1_500..2_500).contains(&late), "late = {late}");
    }

    #[test]
    fn test_concurrent_sampling() {
        let reservoir = Arc::new(Reservoir::new(64));
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let reservoir = Arc::clone(&reservoir);
                thread::spawn(move || {
                    for i in 0..1_000 {
                        reservoir.add_sample(t * 1_000 + i);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(reservoir.seen(), 8_000);
        assert_eq!(reservoir.snapshot().len(), 64);
    }

    #[test]
    fn test_snapshot_excluding_producers_sees_only_offered_values() {
        let window = Arc::new(RwLock::new(Reservoir::new(16)));
        let done = Arc::new(AtomicBool::new(false));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let window = Arc::clone(&window);
                let done = Arc::clone(&done);
                thread::spawn(move || {
                    while !done.load(Ordering::Relaxed) {
                        window.read().add_sample(100);
                    }
                })
            })
            .collect();

        for _ in 0..500 {
            let mut reservoir = window.write();
            let snapshot = reservoir.snapshot();
            reservoir.reset();
            assert!(snapshot.iter().all(|v| *v == 100), "{snapshot:?}");
        }
        done.store(true, Ordering::Relaxed);
        for handle in handles {
            handle.join().unwrap();
        }
    }

    #[test]
    fn test_percentile_law() {
        let sorted: Vec<i64> = (1..=100).map(|i| i * 10).collect();
        assert_eq!(percentile(&sorted, 0.0), 10);
        assert_eq!(percentile(&sorted, 0.5), 500);
        assert_eq!(percentile(&sorted, 0.9), 900);
        assert_eq!(percentile(&sorted, 1.0), 1000);
    }

    #[test]
    fn test_percentile_edges() {
        assert_eq!(percentile(&[], 0.5), 0);
        for p in [0.0, 0.25, 0.5, 0.99, 1.0] {
            assert_eq!(percentile(&[42], p), 42);
        }
    }

    proptest! {
        #[test]
        fn prop_below_capacity_keeps_every_value(
            values in proptest::collection::vec(any::<i64>(), 0..32),
        ) {
            let reservoir = Reservoir::new(32);
            for value in &values {
                prop_assert!(reservoir.add_sample(*value));
            }
            let mut snapshot = reservoir.snapshot();
            let mut expected = values.clone();
            snapshot.sort_unstable();
            expected.sort_unstable();
            prop_assert_eq!(snapshot, expected);
        }

        #[test]
        fn prop_above_capacity_snapshot_has_capacity_len(
            capacity in 1usize..16,
            extra in 1usize..200,
        ) {
            let reservoir = Reservoir::new(capacity);
            for value in 0..(capacity + extra) {
                reservoir.add_sample(value as i64);
            }
            prop_assert_eq!(reservoir.snapshot().len(), capacity);
        }
    }
}
