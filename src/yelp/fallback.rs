//! Outage detection and the data we answer with while Yelp is down.

use std::{
    sync::{
        atomic::{AtomicU32, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

use super::dto::{Business, SearchParams, SearchResponse};

/// Locally held restaurant data used when the upstream API is unreachable.
#[async_trait]
pub trait FallbackSource: Send + Sync {
    async fn search(&self, params: &SearchParams) -> anyhow::Result<Option<SearchResponse>>;
    async fn business(&self, yelp_id: &str) -> anyhow::Result<Option<Business>>;
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    pub healthy: bool,
    pub consecutive_failures: u32,
    pub seconds_since_failure: Option<u64>,
}

/// Counts consecutive outage failures. Past `threshold` the API is treated
/// as down; once `cooldown` has passed a single trial call is admitted, and
/// its outcome decides whether the API is back.
pub struct HealthTracker {
    threshold: u32,
    cooldown: Duration,
    failures: AtomicU32,
    last_failure: Mutex<Option<Instant>>,
    trial_started: Mutex<Option<Instant>>,
}

impl HealthTracker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            failures: AtomicU32::new(0),
            last_failure: Mutex::new(None),
            trial_started: Mutex::new(None),
        }
    }

    pub fn record_success(&self) {
        self.end_trial();
        let previous = self.failures.swap(0, Ordering::SeqCst);
        if previous >= self.threshold {
            info!(previous, "yelp recovered");
        }
    }

    pub fn record_failure(&self) {
        self.end_trial();
        let n = self.failures.fetch_add(1, Ordering::SeqCst) + 1;
        if let Ok(mut last) = self.last_failure.lock() {
            *last = Some(Instant::now());
        }
        if n == self.threshold {
            warn!(failures = n, "yelp marked down, serving fallback data");
        }
    }

    /// True while the API is down and the cooldown has not elapsed.
    pub fn is_down(&self) -> bool {
        if self.failures.load(Ordering::SeqCst) < self.threshold {
            return false;
        }
        match self.last_failure.lock().ok().and_then(|l| *l) {
            Some(at) => at.elapsed() < self.cooldown,
            None => false,
        }
    }

    /// Whether an upstream call may go out now. While down, only one caller
    /// per cooldown gets through; a trial that never reports back frees its
    /// slot after another cooldown.
    pub fn admit(&self) -> bool {
        if self.failures.load(Ordering::SeqCst) < self.threshold {
            return true;
        }
        if self.is_down() {
            return false;
        }
        let Ok(mut trial) = self.trial_started.lock() else {
            return true;
        };
        match *trial {
            Some(at) if at.elapsed() < self.cooldown => false,
            _ => {
                *trial = Some(Instant::now());
                info!("cooldown elapsed, letting one yelp call through");
                true
            }
        }
    }

    fn end_trial(&self) {
        if let Ok(mut trial) = self.trial_started.lock() {
            *trial = None;
        }
    }

    pub fn snapshot(&self) -> HealthSnapshot {
        let failures = self.failures.load(Ordering::SeqCst);
        let since = self
            .last_failure
            .lock()
            .ok()
            .and_then(|l| *l)
            .map(|at| at.elapsed().as_secs());
        HealthSnapshot {
            healthy: failures < self.threshold,
            consecutive_failures: failures,
            seconds_since_failure: since,
        }
    }
}
