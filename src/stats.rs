//! Delivery statistics.
//!
//! Each worker counts into a private [`Stats`] with no synchronisation. When
//! the worker terminates it folds those counters into the shared
//! [`RootStats`], whose mutex is held only for the fold and never across I/O.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Plain counters owned by one worker (or a snapshot of the root)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Requests issued, counted before the POST goes out
    pub requests_sent: u64,
    /// Requests answered with a status below 400
    pub requests_completed: u64,
    /// Responses with status >= 400, keyed by status code
    pub errors_by_status: BTreeMap<u16, u64>,
    /// Sessions torn down after a fault
    pub dead_connections: u64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_sent(&mut self) {
        self.requests_sent += 1;
    }

    pub fn record_completed(&mut self) {
        self.requests_completed += 1;
    }

    pub fn record_error_status(&mut self, status: u16) {
        *self.errors_by_status.entry(status).or_insert(0) += 1;
    }

    pub fn record_dead_connection(&mut self) {
        self.dead_connections += 1;
    }

    /// Total responses with an error status
    pub fn error_responses(&self) -> u64 {
        self.errors_by_status.values().sum()
    }

    /// Fold `other` into `self`. Commutative and associative; the
    /// histogram is merged as a key-wise sum.
    pub fn merge(&mut self, other: &Stats) {
        self.requests_sent += other.requests_sent;
        self.requests_completed += other.requests_completed;
        self.dead_connections += other.dead_connections;
        for (status, count) in &other.errors_by_status {
            *self.errors_by_status.entry(*status).or_insert(0) += count;
        }
    }
}

/// Aggregate counters shared by every worker of one engine run
#[derive(Debug)]
pub struct RootStats {
    counters: Mutex<Stats>,
    /// Set once at construction, read without locking
    started: Instant,
    started_at: DateTime<Utc>,
}

impl RootStats {
    /// Create root statistics time-stamped now
    pub fn new() -> Self {
        Self {
            counters: Mutex::new(Stats::default()),
            started: Instant::now(),
            started_at: Utc::now(),
        }
    }

    /// Fold a worker's local counters into the root.
    pub fn merge(&self, local: &Stats) {
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        counters.merge(local);
    }

    /// Copy of the current aggregate counters
    pub fn snapshot(&self) -> Stats {
        self.counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

impl Default for RootStats {
    fn default() -> Self {
        Self::new()
    }
}
