use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use super::dto::SearchParams;
use crate::store::KvStore;

/// How long a copy stays around for the fallback after the fresh entry expired.
const STALE_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Search,
    Details,
    Reviews,
}

impl CacheKind {
    fn prefix(self) -> &'static str {
        match self {
            CacheKind::Search => "search",
            CacheKind::Details => "details",
            CacheKind::Reviews => "reviews",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CacheTtls {
    pub search: Duration,
    pub details: Duration,
    pub reviews: Duration,
}

impl CacheTtls {
    fn for_kind(&self, kind: CacheKind) -> Duration {
        match kind {
            CacheKind::Search => self.search,
            CacheKind::Details => self.details,
            CacheKind::Reviews => self.reviews,
        }
    }
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

pub struct YelpCache {
    store: Arc<dyn KvStore>,
    ttls: CacheTtls,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl YelpCache {
    pub fn new(store: Arc<dyn KvStore>, ttls: CacheTtls) -> Self {
        Self {
            store,
            ttls,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn search_key(params: &SearchParams) -> String {
        let shape = params
            .query_pairs()
            .into_iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        format!("{}:{shape}", CacheKind::Search.prefix())
    }

    pub fn id_key(kind: CacheKind, id: &str) -> String {
        format!("{}:{}", kind.prefix(), id.trim().to_lowercase())
    }

    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.read(&format!("yelp:{key}")).await;
        if value.is_some() {
            self.hits.fetch_add(1, Ordering::Relaxed);
            debug!(key, "yelp cache hit");
        } else {
            self.misses.fetch_add(1, Ordering::Relaxed);
        }
        value
    }

    /// Last known good copy, kept past the fresh TTL for outages.
    pub async fn get_stale<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.read(&format!("yelp-stale:{key}")).await
    }

    pub async fn put<T: Serialize>(&self, kind: CacheKind, key: &str, value: &T) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, key, "yelp cache serialise failed");
                return;
            }
        };
        let fresh = self
            .store
            .set(&format!("yelp:{key}"), &raw, self.ttls.for_kind(kind))
            .await;
        let stale = self.store.set(&format!("yelp-stale:{key}"), &raw, STALE_TTL).await;
        if let Err(e) = fresh.and(stale) {
            warn!(error = %e, key, "yelp cache write failed");
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }

    async fn read<T: DeserializeOwned>(&self, full_key: &str) -> Option<T> {
        match self.store.get(full_key).await {
            Ok(Some(raw)) => serde_json::from_str(&raw)
                .map_err(|e| warn!(error = %e, key = full_key, "yelp cache entry undecodable"))
                .ok(),
            Ok(None) => None,
            Err(e) => {
                warn!(error = %e, key = full_key, "yelp cache read failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn cache() -> YelpCache {
        YelpCache::new(
            Arc::new(MemoryStore::new()),
            CacheTtls {
                search: Duration::from_secs(30),
                details: Duration::from_secs(300),
                reviews: Duration::from_secs(60),
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_per_kind_but_stale_copy_survives() {
        let c = cache();
        c.put(CacheKind::Search, "search:a", &vec![1, 2, 3]).await;
        c.put(CacheKind::Details, "details:x", &"biz".to_string()).await;

        tokio::time::advance(Duration::from_secs(31)).await;
        assert_eq!(c.get::<Vec<i32>>("search:a").await, None);
        assert_eq!(c.get::<String>("details:x").await.as_deref(), Some("biz"));
        assert_eq!(c.get_stale::<Vec<i32>>("search:a").await, Some(vec![1, 2, 3]));

        let stats = c.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
    }

    #[test]
    fn keys_are_shape_based() {
        let a = SearchParams {
            term: Some("Tacos".into()),
            location: Some("Austin".into()),
            ..Default::default()
        };
        let b = SearchParams {
            term: Some("tacos ".into()),
            location: Some("austin".into()),
            ..Default::default()
        };
        assert_eq!(YelpCache::search_key(&a), YelpCache::search_key(&b));
        assert_eq!(
            YelpCache::id_key(CacheKind::Details, " ABC "),
            "details:abc"
        );
    }
}
