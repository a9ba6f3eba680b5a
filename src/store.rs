//! Keyed TTL store shared by the rate limiter, the Yelp cache and OTP codes.
//!
//! `MemoryStore` keeps everything in-process. `RedisStore` lets several
//! server instances share counters and cached payloads.

use std::{collections::HashMap, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands, Client};
use tokio::{sync::Mutex, time::Instant};
use tracing::debug;

/// Result of an increment: the new count and how long the key still lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counter {
    pub count: u64,
    pub ttl: Duration,
}

#[async_trait]
pub trait KvStore: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()>;
    async fn delete(&self, key: &str) -> anyhow::Result<()>;
    /// Increments `key`, starting a fresh window of `ttl` when it does not exist.
    async fn incr(&self, key: &str, ttl: Duration) -> anyhow::Result<Counter>;
    /// Reads a counter without bumping it.
    async fn peek(&self, key: &str) -> anyhow::Result<Option<Counter>>;
}

struct Entry {
    value: String,
    expires_at: Instant,
}

/// Expired entries are swept on write once the map doubles in size or a
/// minute has passed since the last sweep.
const SWEEP_MIN_LEN: usize = 1024;
const SWEEP_EVERY: Duration = Duration::from_secs(60);

#[derive(Default)]
struct Entries {
    map: HashMap<String, Entry>,
    sweep_at_len: usize,
    last_sweep: Option<Instant>,
}

impl Entries {
    fn maybe_sweep(&mut self, now: Instant) {
        let due = self
            .last_sweep
            .map_or(true, |at| now.saturating_duration_since(at) >= SWEEP_EVERY);
        if !due && self.map.len() < self.sweep_at_len {
            return;
        }
        let before = self.map.len();
        self.map.retain(|_, e| e.expires_at > now);
        self.sweep_at_len = (self.map.len() * 2).max(SWEEP_MIN_LEN);
        self.last_sweep = Some(now);
        if before > self.map.len() {
            debug!(removed = before - self.map.len(), "expired store entries swept");
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Entries>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.inner.lock().await;
        entries.map.retain(|_, e| e.expires_at > now);
        entries.map.len()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let now = Instant::now();
        let mut entries = self.inner.lock().await;
        match entries.map.get(key) {
            Some(e) if e.expires_at > now => Ok(Some(e.value.clone())),
            Some(_) => {
                entries.map.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()> {
        let now = Instant::now();
        let mut entries = self.inner.lock().await;
        entries.maybe_sweep(now);
        entries.map.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        self.inner.lock().await.map.remove(key);
        Ok(())
    }

    async fn incr(&self, key: &str, ttl: Duration) -> anyhow::Result<Counter> {
        let now = Instant::now();
        let mut entries = self.inner.lock().await;
        entries.maybe_sweep(now);
        let entry = entries
            .map
            .entry(key.to_string())
            .and_modify(|e| {
                if e.expires_at <= now {
                    e.value = "0".into();
                    e.expires_at = now + ttl;
                }
            })
            .or_insert_with(|| Entry {
                value: "0".into(),
                expires_at: now + ttl,
            });
        let count = entry
            .value
            .parse::<u64>()
            .with_context(|| format!("counter {key} is not numeric"))?
            + 1;
        entry.value = count.to_string();
        Ok(Counter {
            count,
            ttl: entry.expires_at.saturating_duration_since(now),
        })
    }

    async fn peek(&self, key: &str) -> anyhow::Result<Option<Counter>> {
        let now = Instant::now();
        let entries = self.inner.lock().await;
        match entries.map.get(key) {
            Some(e) if e.expires_at > now => Ok(Some(Counter {
                count: e.value.parse().unwrap_or(0),
                ttl: e.expires_at.saturating_duration_since(now),
            })),
            _ => Ok(None),
        }
    }
}

#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> anyhow::Result<Self> {
        let client = Client::open(redis_url).context("parse redis url")?;
        let conn = client
            .get_connection_manager()
            .await
            .context("connect to redis")?;
        Ok(Self { conn })
    }
}

fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let mut conn = self.conn.clone();
        let v: Option<String> = conn.get(key).await.context("redis GET")?;
        Ok(v)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        conn.set_ex::<_, _, ()>(key, value, ttl_secs(ttl))
            .await
            .context("redis SETEX")?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> anyhow::Result<()> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.context("redis DEL")?;
        Ok(())
    }

    async fn incr(&self, key: &str, ttl: Duration) -> anyhow::Result<Counter> {
        let mut conn = self.conn.clone();
        let count: u64 = conn.incr(key, 1u64).await.context("redis INCR")?;
        if count == 1 {
            conn.expire::<_, ()>(key, ttl_secs(ttl) as i64)
                .await
                .context("redis EXPIRE")?;
            return Ok(Counter { count, ttl });
        }
        let remaining: i64 = conn.ttl(key).await.context("redis TTL")?;
        Ok(Counter {
            count,
            ttl: Duration::from_secs(remaining.max(0) as u64),
        })
    }

    async fn peek(&self, key: &str) -> anyhow::Result<Option<Counter>> {
        let mut conn = self.conn.clone();
        let count: Option<u64> = conn.get(key).await.context("redis GET")?;
        let Some(count) = count else {
            return Ok(None);
        };
        let remaining: i64 = conn.ttl(key).await.context("redis TTL")?;
        Ok(Some(Counter {
            count,
            ttl: Duration::from_secs(remaining.max(0) as u64),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn values_expire_after_ttl() {
        let store = MemoryStore::new();
        store.set("k", "v", Duration::from_secs(10)).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn incr_starts_a_new_window_after_expiry() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);
        assert_eq!(store.incr("c", ttl).await.unwrap().count, 1);
        tokio::time::advance(Duration::from_secs(20)).await;
        let second = store.incr("c", ttl).await.unwrap();
        assert_eq!(second.count, 2);
        assert_eq!(second.ttl, Duration::from_secs(40));

        tokio::time::advance(Duration::from_secs(41)).await;
        assert_eq!(store.peek("c").await.unwrap(), None);
        assert_eq!(store.incr("c", ttl).await.unwrap().count, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn writes_sweep_expired_keys() {
        let store = MemoryStore::new();
        for i in 0..10_000 {
            store.set(&format!("k{i}"), "v", Duration::from_secs(1)).await.unwrap();
        }
        tokio::time::advance(Duration::from_secs(3600)).await;
        for i in 0..10 {
            store.incr(&format!("c{i}"), Duration::from_secs(60)).await.unwrap();
        }
        assert_eq!(store.inner.lock().await.map.len(), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn growth_triggers_a_sweep_before_the_interval() {
        let store = MemoryStore::new();
        for i in 0..SWEEP_MIN_LEN {
            store.set(&format!("old{i}"), "v", Duration::from_secs(1)).await.unwrap();
        }
        tokio::time::advance(Duration::from_secs(2)).await;
        store.set("fresh", "v", Duration::from_secs(30)).await.unwrap();
        let entries = store.inner.lock().await;
        assert_eq!(entries.map.len(), 1);
        assert!(entries.map.contains_key("fresh"));
    }

    #[tokio::test]
    async fn delete_removes_key() {
        let store = MemoryStore::new();
        store.set("k", "v", Duration::from_secs(10)).await.unwrap();
        store.delete("k").await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);
    }
}
