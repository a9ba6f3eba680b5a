//! Fixed-window request budget for outbound APIs.
//!
//! Three counters per API name (minute, hour, day), each living in the shared
//! store under its own TTL. A request is admitted only when every window has
//! room; a rejected request consumes nothing.

use std::{sync::Arc, time::Duration};

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::{
    error::{AppError, LimitReason},
    store::KvStore,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub per_minute: u64,
    pub per_hour: u64,
    pub per_day: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Window {
    Minute,
    Hour,
    Day,
}

impl Window {
    const ALL: [Window; 3] = [Window::Minute, Window::Hour, Window::Day];

    fn name(self) -> &'static str {
        match self {
            Window::Minute => "minute",
            Window::Hour => "hour",
            Window::Day => "day",
        }
    }

    fn span(self) -> Duration {
        match self {
            Window::Minute => Duration::from_secs(60),
            Window::Hour => Duration::from_secs(60 * 60),
            Window::Day => Duration::from_secs(24 * 60 * 60),
        }
    }

    fn reason(self) -> LimitReason {
        match self {
            Window::Minute => LimitReason::Minute,
            Window::Hour => LimitReason::Hour,
            Window::Day => LimitReason::Day,
        }
    }

    fn limit(self, limits: &Limits) -> u64 {
        match self {
            Window::Minute => limits.per_minute,
            Window::Hour => limits.per_hour,
            Window::Day => limits.per_day,
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct WindowUsage {
    pub window: &'static str,
    pub used: u64,
    pub limit: u64,
    pub resets_in_secs: u64,
}

pub struct RateLimiter {
    store: Arc<dyn KvStore>,
    limits: Limits,
    // serialises check-then-consume within this process
    gate: Mutex<()>,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn KvStore>, limits: Limits) -> Self {
        Self {
            store,
            limits,
            gate: Mutex::new(()),
        }
    }

    fn key(api: &str, window: Window) -> String {
        format!("ratelimit:{api}:{}", window.name())
    }

    /// Admits one request for `api` or returns `RateLimited` naming the
    /// longest exhausted window, with `retry_after` set to its remaining TTL.
    pub async fn acquire(&self, api: &str) -> Result<(), AppError> {
        let _guard = self.gate.lock().await;

        let mut exceeded: Option<(Window, Duration)> = None;
        for window in Window::ALL {
            if let Some(c) = self.store.peek(&Self::key(api, window)).await? {
                if c.count >= window.limit(&self.limits) {
                    exceeded = Some((window, c.ttl));
                }
            }
        }
        if let Some((window, ttl)) = exceeded {
            let retry_after = ttl.as_secs().max(1);
            warn!(api, window = window.name(), retry_after, "rate limit reached");
            return Err(AppError::RateLimited {
                reason: window.reason(),
                retry_after,
            });
        }

        for window in Window::ALL {
            let c = self.store.incr(&Self::key(api, window), window.span()).await?;
            debug!(api, window = window.name(), count = c.count, "rate limit consumed");
        }
        Ok(())
    }

    pub async fn usage(&self, api: &str) -> anyhow::Result<Vec<WindowUsage>> {
        let mut out = Vec::with_capacity(3);
        for window in Window::ALL {
            let counter = self.store.peek(&Self::key(api, window)).await?;
            out.push(WindowUsage {
                window: window.name(),
                used: counter.map(|c| c.count).unwrap_or(0),
                limit: window.limit(&self.limits),
                resets_in_secs: counter.map(|c| c.ttl.as_secs()).unwrap_or(0),
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn limiter(per_minute: u64, per_hour: u64, per_day: u64) -> RateLimiter {
        RateLimiter::new(
            Arc::new(MemoryStore::new()),
            Limits {
                per_minute,
                per_hour,
                per_day,
            },
        )
    }

    fn reason_of(e: AppError) -> (LimitReason, u64) {
        match e {
            AppError::RateLimited {
                reason,
                retry_after,
            } => (reason, retry_after),
            other => panic!("expected rate limit, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn minute_window_rejects_until_rollover() {
        let rl = limiter(3, 100, 1000);
        for _ in 0..3 {
            rl.acquire("yelp").await.unwrap();
        }
        for _ in 0..2 {
            let (reason, retry) = reason_of(rl.acquire("yelp").await.unwrap_err());
            assert_eq!(reason, LimitReason::Minute);
            assert!(retry <= 60);
        }

        tokio::time::advance(Duration::from_secs(61)).await;
        rl.acquire("yelp").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn hour_window_is_independent() {
        let rl = limiter(2, 3, 1000);
        rl.acquire("yelp").await.unwrap();
        rl.acquire("yelp").await.unwrap();
        tokio::time::advance(Duration::from_secs(61)).await;
        rl.acquire("yelp").await.unwrap();

        let (reason, retry) = reason_of(rl.acquire("yelp").await.unwrap_err());
        assert_eq!(reason, LimitReason::Hour);
        assert!(retry > 60);

        tokio::time::advance(Duration::from_secs(60 * 60)).await;
        rl.acquire("yelp").await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn day_window_is_independent() {
        let rl = limiter(10, 10, 2);
        rl.acquire("yelp").await.unwrap();
        rl.acquire("yelp").await.unwrap();
        let (reason, _) = reason_of(rl.acquire("yelp").await.unwrap_err());
        assert_eq!(reason, LimitReason::Day);

        tokio::time::advance(Duration::from_secs(2 * 60 * 60)).await;
        let (reason, _) = reason_of(rl.acquire("yelp").await.unwrap_err());
        assert_eq!(reason, LimitReason::Day);

        tokio::time::advance(Duration::from_secs(24 * 60 * 60)).await;
        rl.acquire("yelp").await.unwrap();
    }

    #[tokio::test]
    async fn rejected_requests_do_not_consume_budget() {
        let rl = limiter(1, 100, 100);
        rl.acquire("yelp").await.unwrap();
        assert!(rl.acquire("yelp").await.is_err());
        assert!(rl.acquire("yelp").await.is_err());

        let usage = rl.usage("yelp").await.unwrap();
        assert_eq!(usage[0].used, 1);
        assert_eq!(usage[1].used, 1);
        assert_eq!(usage[2].used, 1);
    }

    #[tokio::test]
    async fn apis_are_counted_separately() {
        let rl = limiter(1, 10, 10);
        rl.acquire("yelp").await.unwrap();
        rl.acquire("twilio").await.unwrap();
        assert!(rl.acquire("yelp").await.is_err());
    }
}
