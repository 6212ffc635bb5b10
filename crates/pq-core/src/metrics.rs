//! Queue-wide usage counters exposed through [`crate::Queue::stats`].
//!
//! Atomics owned by the live structure, snapshotted into a plain `Copy`
//! struct for callers rather than handing out live atomic references.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

/// Live, mutation-side counters. One instance lives in the control block
/// in shared memory, updated under the control-block lock so every
/// attached process observes a consistent snapshot.
#[derive(Debug, Default)]
pub struct Metrics {
    slots_in_use: AtomicU32,
    bytes_in_use: AtomicU64,
    high_water_slots: AtomicU32,
    high_water_bytes: AtomicU64,
    insert_count: AtomicU64,
    evict_count: AtomicU64,
    dup_count: AtomicU64,
    write_count: AtomicU64,
    mvrt_hits: AtomicU64,
    mvrt_total: AtomicU64,
}

impl Metrics {
    /// Records a successful insertion of `bytes` into a fresh region.
    pub fn record_insert(&self, bytes: u64) {
        let slots = self.slots_in_use.fetch_add(1, Ordering::Relaxed) + 1;
        let in_use = self.bytes_in_use.fetch_add(bytes, Ordering::Relaxed) + bytes;
        self.high_water_slots.fetch_max(slots, Ordering::Relaxed);
        self.high_water_bytes.fetch_max(in_use, Ordering::Relaxed);
        self.insert_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a region being freed, whether by eviction or explicit deletion.
    pub fn record_free(&self, bytes: u64) {
        self.slots_in_use.fetch_sub(1, Ordering::Relaxed);
        self.bytes_in_use.fetch_sub(bytes, Ordering::Relaxed);
    }

    /// Records one region reclaimed by `make_room` eviction.
    pub fn record_evict(&self) {
        self.evict_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a rejected insertion due to a duplicate signature.
    pub fn record_dup(&self) {
        self.dup_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a most-recent-time-retrieval query outcome.
    pub fn record_mvrt(&self, hit: bool) {
        self.mvrt_total.fetch_add(1, Ordering::Relaxed);
        if hit {
            self.mvrt_hits.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Resets the MVRT hit/total counters to zero, per the
    /// `clear_mvrt_metrics` API call.
    pub fn clear_mvrt(&self) {
        self.mvrt_hits.store(0, Ordering::Relaxed);
        self.mvrt_total.store(0, Ordering::Relaxed);
    }

    /// Increments the open-for-write counter, per the `get_write_count` API call.
    pub fn record_write_open(&self) {
        self.write_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Resets the write-open counter to zero.
    pub fn clear_write_count(&self) {
        self.write_count.store(0, Ordering::Relaxed);
    }

    /// Takes an immutable point-in-time copy of every counter.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            slots_in_use: self.slots_in_use.load(Ordering::Relaxed),
            bytes_in_use: self.bytes_in_use.load(Ordering::Relaxed),
            high_water_slots: self.high_water_slots.load(Ordering::Relaxed),
            high_water_bytes: self.high_water_bytes.load(Ordering::Relaxed),
            insert_count: self.insert_count.load(Ordering::Relaxed),
            evict_count: self.evict_count.load(Ordering::Relaxed),
            dup_count: self.dup_count.load(Ordering::Relaxed),
            write_count: self.write_count.load(Ordering::Relaxed),
            mvrt_hits: self.mvrt_hits.load(Ordering::Relaxed),
            mvrt_total: self.mvrt_total.load(Ordering::Relaxed),
        }
    }
}

/// A `Copy`able point-in-time view of [`Metrics`], returned by `stats()`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Regions currently holding a product.
    pub slots_in_use: u32,
    /// Product bytes currently occupying the data area.
    pub bytes_in_use: u64,
    /// Highest `slots_in_use` has ever reached.
    pub high_water_slots: u32,
    /// Highest `bytes_in_use` has ever reached.
    pub high_water_bytes: u64,
    /// Total products successfully inserted over the queue's lifetime.
    pub insert_count: u64,
    /// Total regions reclaimed by eviction.
    pub evict_count: u64,
    /// Total insertions rejected as duplicate signatures.
    pub dup_count: u64,
    /// Total times the queue has been opened for writing.
    pub write_count: u64,
    /// Most-recent-time-retrieval queries that found a cached match since
    /// the counters were last cleared.
    pub mvrt_hits: u64,
    /// Total most-recent-time-retrieval queries since the counters were
    /// last cleared.
    pub mvrt_total: u64,
}

impl MetricsSnapshot {
    /// Fraction of in-use slots relative to capacity, or `0.0` if
    /// `capacity` is zero.
    #[must_use]
    pub fn occupancy(&self, capacity: u32) -> f64 {
        if capacity == 0 {
            0.0
        } else {
            f64::from(self.slots_in_use) / f64::from(capacity)
        }
    }
}
