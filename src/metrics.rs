//! Metrics Collector
//!
//! Bounded-memory latency and cache-rate tracking. Latency samples live
//! in a fixed-capacity ring buffer (oldest evicted first), so long-run
//! percentiles are approximations over the most recent window while
//! counters cover the full lifetime of the collector.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub avg_insert_ms: f64,
    pub p95_insert_ms: f64,
    pub p99_insert_ms: f64,
    pub cache_hit_rate: f64,
    pub total_ops: u64,
}

struct Ring {
    samples: Vec<f64>,
    next: usize,
    filled: usize,
}

/// Collects insert latencies and cache hit/miss counts.
pub struct MetricsCollector {
    ring: Mutex<Ring>,
    capacity: usize,
    total_ops: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl MetricsCollector {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            ring: Mutex::new(Ring {
                samples: vec![0.0; capacity],
                next: 0,
                filled: 0,
            }),
            capacity,
            total_ops: AtomicU64::new(0),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
        }
    }

    pub fn record_insert_latency(&self, ms: f64) {
        // Metrics must never take down the write path; recover the ring
        // even if a panicking thread poisoned the lock.
        let mut ring = self
            .ring
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let next = ring.next;
        ring.samples[next] = ms;
        ring.next = (next + 1) % self.capacity;
        ring.filled = (ring.filled + 1).min(self.capacity);
        drop(ring);

        self.total_ops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let window: Vec<f64> = {
            let ring = self
                .ring
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner);
            ring.samples[..ring.filled].to_vec()
        };

        let avg = if window.is_empty() {
            0.0
        } else {
            window.iter().sum::<f64>() / window.len() as f64
        };

        let hits = self.cache_hits.load(Ordering::Relaxed);
        let misses = self.cache_misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        let cache_hit_rate = if lookups == 0 {
            0.0
        } else {
            hits as f64 / lookups as f64
        };

        MetricsSnapshot {
            avg_insert_ms: avg,
            p95_insert_ms: percentile(&window, 0.95).unwrap_or(0.0),
            p99_insert_ms: percentile(&window, 0.99).unwrap_or(0.0),
            cache_hit_rate,
            total_ops: self.total_ops.load(Ordering::Relaxed),
        }
    }
}

fn percentile(values: &[f64], percentile: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let index = ((sorted.len() - 1) as f64 * percentile)
        .round()
        .clamp(0.0, (sorted.len() - 1) as f64) as usize;
    sorted.get(index).copied()
}
