//! Lightweight counters so tests and logs can see what the engine did
//! without an external metrics backend. Instance-scoped so independent
//! engines do not share counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub struct ReconcilerMetrics {
    events_seen: AtomicU64,
    events_relevant: AtomicU64,
    events_ignored: AtomicU64,
    scans_total: AtomicU64,
    scans_with_work: AtomicU64,
    scan_errors: AtomicU64,
    groups_reopened: AtomicU64,
    feed_lagged: AtomicU64,
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct ReconcilerMetricsSnapshot {
    pub events_seen: u64,
    pub events_relevant: u64,
    pub events_ignored: u64,
    pub scans_total: u64,
    pub scans_with_work: u64,
    pub scan_errors: u64,
    pub groups_reopened: u64,
    pub feed_lagged: u64,
}

impl ReconcilerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_event(&self, relevant: bool) {
        self.events_seen.fetch_add(1, Ordering::Relaxed);
        if relevant {
            self.events_relevant.fetch_add(1, Ordering::Relaxed);
        } else {
            self.events_ignored.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_scan(&self, did_work: bool) {
        self.scans_total.fetch_add(1, Ordering::Relaxed);
        if did_work {
            self.scans_with_work.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_scan_error(&self) {
        self.scans_total.fetch_add(1, Ordering::Relaxed);
        self.scan_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_group_reopened(&self) {
        self.groups_reopened.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_feed_lag(&self) {
        self.feed_lagged.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> ReconcilerMetricsSnapshot {
        ReconcilerMetricsSnapshot {
            events_seen: self.events_seen.load(Ordering::Relaxed),
            events_relevant: self.events_relevant.load(Ordering::Relaxed),
            events_ignored: self.events_ignored.load(Ordering::Relaxed),
            scans_total: self.scans_total.load(Ordering::Relaxed),
            scans_with_work: self.scans_with_work.load(Ordering::Relaxed),
            scan_errors: self.scan_errors.load(Ordering::Relaxed),
            groups_reopened: self.groups_reopened.load(Ordering::Relaxed),
            feed_lagged: self.feed_lagged.load(Ordering::Relaxed),
        }
    }
}
