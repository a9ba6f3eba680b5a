use std::{sync::Arc, time::Duration};

use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::{
    cache::{CacheKind, CacheStats, YelpCache},
    client::{RestaurantSource, YelpError},
    dto::{Business, ReviewsResponse, SearchParams, SearchResponse, Source, Sourced},
    fallback::{FallbackSource, HealthSnapshot, HealthTracker},
    queue::{RequestQueue, YelpReply, YelpRequest},
    rate_limit::{RateLimiter, WindowUsage},
};
use crate::error::{AppError, AppResult};

pub const API_NAME: &str = "yelp";
const RECOVERY_COOLDOWN: Duration = Duration::from_secs(30);

/// What to do when the rate limiter says no.
#[derive(Debug, Clone, Copy)]
pub enum Admission {
    Reject,
    Queue(Duration),
}

enum FetchError {
    Outage(YelpError),
    App(AppError),
}

impl From<AppError> for FetchError {
    fn from(e: AppError) -> Self {
        FetchError::App(e)
    }
}

#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YelpStatus {
    pub health: HealthSnapshot,
    pub cache: CacheStats,
    pub queue_depth: usize,
    pub usage: Vec<WindowUsage>,
}

/// Cache, rate limiter, queue and fallback in front of the Yelp client.
pub struct YelpService {
    source: Arc<dyn RestaurantSource>,
    cache: YelpCache,
    limiter: RateLimiter,
    health: HealthTracker,
    queue: RequestQueue,
    fallback: Option<Arc<dyn FallbackSource>>,
}

impl YelpService {
    pub fn new(
        source: Arc<dyn RestaurantSource>,
        cache: YelpCache,
        limiter: RateLimiter,
        failure_threshold: u32,
        queue_capacity: usize,
    ) -> Self {
        Self {
            source,
            cache,
            limiter,
            health: HealthTracker::new(failure_threshold, RECOVERY_COOLDOWN),
            queue: RequestQueue::new(queue_capacity),
            fallback: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackSource>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    #[instrument(skip(self))]
    pub async fn search(&self, params: &SearchParams) -> AppResult<Sourced<SearchResponse>> {
        self.search_with(params, Admission::Reject).await
    }

    /// Like `search`, but waits in the queue for up to `wait` when the budget
    /// is exhausted. Used by background jobs.
    pub async fn search_queued(
        &self,
        params: &SearchParams,
        wait: Duration,
    ) -> AppResult<Sourced<SearchResponse>> {
        self.search_with(params, Admission::Queue(wait)).await
    }

    async fn search_with(
        &self,
        params: &SearchParams,
        admission: Admission,
    ) -> AppResult<Sourced<SearchResponse>> {
        let request = YelpRequest::Search(params.clone());
        match self.fetch(request, admission, YelpReply::into_search).await {
            Ok(v) => Ok(v),
            Err(FetchError::App(e)) => Err(e),
            Err(FetchError::Outage(e)) => {
                if let Some(stale) = self.cache.get_stale(&YelpCache::search_key(params)).await {
                    return Ok(Sourced::new(stale, Source::Fallback));
                }
                if let Some(fb) = &self.fallback {
                    match fb.search(params).await {
                        Ok(Some(r)) => return Ok(Sourced::new(r, Source::Fallback)),
                        Ok(None) => {}
                        Err(err) => warn!(error = %err, "fallback search failed"),
                    }
                }
                Err(e.into())
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn details(&self, id: &str) -> AppResult<Sourced<Business>> {
        self.details_with(id, Admission::Reject).await
    }

    pub async fn details_queued(&self, id: &str, wait: Duration) -> AppResult<Sourced<Business>> {
        self.details_with(id, Admission::Queue(wait)).await
    }

    async fn details_with(&self, id: &str, admission: Admission) -> AppResult<Sourced<Business>> {
        let request = YelpRequest::Details(id.to_string());
        match self.fetch(request, admission, YelpReply::into_details).await {
            Ok(v) => Ok(v),
            Err(FetchError::App(e)) => Err(e),
            Err(FetchError::Outage(e)) => {
                let key = YelpCache::id_key(CacheKind::Details, id);
                if let Some(stale) = self.cache.get_stale(&key).await {
                    return Ok(Sourced::new(stale, Source::Fallback));
                }
                if let Some(fb) = &self.fallback {
                    match fb.business(id).await {
                        Ok(Some(b)) => return Ok(Sourced::new(b, Source::Fallback)),
                        Ok(None) => {}
                        Err(err) => warn!(error = %err, "fallback details failed"),
                    }
                }
                Err(e.into())
            }
        }
    }

    #[instrument(skip(self))]
    pub async fn reviews(&self, id: &str) -> AppResult<Sourced<ReviewsResponse>> {
        let request = YelpRequest::Reviews(id.to_string());
        match self.fetch(request, Admission::Reject, YelpReply::into_reviews).await {
            Ok(v) => Ok(v),
            Err(FetchError::App(e)) => Err(e),
            Err(FetchError::Outage(e)) => {
                let key = YelpCache::id_key(CacheKind::Reviews, id);
                match self.cache.get_stale(&key).await {
                    Some(stale) => Ok(Sourced::new(stale, Source::Fallback)),
                    None => Err(e.into()),
                }
            }
        }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        request: YelpRequest,
        admission: Admission,
        pick: fn(YelpReply) -> Option<T>,
    ) -> Result<Sourced<T>, FetchError> {
        let (_, key) = request.cache_entry();
        if let Some(hit) = self.cache.get::<T>(&key).await {
            return Ok(Sourced::new(hit, Source::Cache));
        }
        if !self.health.admit() {
            debug!("yelp marked down, skipping upstream call");
            return Err(FetchError::Outage(YelpError::Unavailable(
                "marked down after repeated failures".into(),
            )));
        }

        let reply = match self.admit(request, admission).await? {
            Ok(reply) => reply,
            Err(e) if e.is_outage() => return Err(FetchError::Outage(e)),
            Err(e) => return Err(FetchError::App(e.into())),
        };
        pick(reply)
            .map(|v| Sourced::new(v, Source::Yelp))
            .ok_or_else(|| FetchError::App(anyhow::anyhow!("yelp reply kind mismatch").into()))
    }

    async fn admit(
        &self,
        request: YelpRequest,
        admission: Admission,
    ) -> AppResult<Result<YelpReply, YelpError>> {
        match (self.limiter.acquire(API_NAME).await, admission) {
            (Ok(()), _) => Ok(self.execute(&request).await),
            (Err(AppError::RateLimited { .. }), Admission::Queue(wait)) => {
                let rx = self.queue.push(request).await?;
                match tokio::time::timeout(wait, rx).await {
                    Ok(Ok(reply)) => Ok(reply),
                    Ok(Err(_)) => Err(AppError::ServiceUnavailable(
                        "Queued restaurant lookup was dropped".into(),
                    )),
                    Err(_) => Err(AppError::ServiceUnavailable(
                        "Timed out waiting for restaurant data capacity".into(),
                    )),
                }
            }
            (Err(e), _) => Err(e),
        }
    }

    /// One upstream call. Records health and caches successful replies.
    async fn execute(&self, request: &YelpRequest) -> Result<YelpReply, YelpError> {
        let result = match request {
            YelpRequest::Search(p) => self.source.search(p).await.map(YelpReply::Search),
            YelpRequest::Details(id) => self.source.business(id).await.map(YelpReply::Details),
            YelpRequest::Reviews(id) => self.source.reviews(id).await.map(YelpReply::Reviews),
        };
        match &result {
            Ok(reply) => {
                self.health.record_success();
                let (kind, key) = request.cache_entry();
                match reply {
                    YelpReply::Search(r) => self.cache.put(kind, &key, r).await,
                    YelpReply::Details(b) => self.cache.put(kind, &key, b).await,
                    YelpReply::Reviews(r) => self.cache.put(kind, &key, r).await,
                }
            }
            Err(e) if e.is_outage() => {
                warn!(error = %e, "yelp call failed");
                self.health.record_failure();
            }
            Err(e) => debug!(error = %e, "yelp call rejected"),
        }
        result
    }

    /// Replays queued calls while the budget allows. Returns how many ran.
    pub async fn drain_queue(&self) -> usize {
        let mut ran = 0;
        while self.queue.has_live_work().await {
            if self.limiter.acquire(API_NAME).await.is_err() {
                break;
            }
            let Some(pending) = self.queue.pop().await else {
                break;
            };
            let result = self.execute(&pending.request).await;
            if pending.reply.send(result).is_err() {
                debug!("queued caller went away before reply");
            }
            ran += 1;
        }
        ran
    }

    pub fn spawn_queue_processor(self: Arc<Self>, tick: Duration) -> JoinHandle<()> {
        info!(tick_ms = tick.as_millis() as u64, "yelp queue processor started");
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            loop {
                interval.tick().await;
                let ran = self.drain_queue().await;
                if ran > 0 {
                    debug!(ran, "yelp queue drained");
                }
            }
        })
    }

    pub fn is_healthy(&self) -> bool {
        !self.health.is_down()
    }

    pub async fn status(&self) -> anyhow::Result<YelpStatus> {
        Ok(YelpStatus {
            health: self.health.snapshot(),
            cache: self.cache.stats(),
            queue_depth: self.queue.len().await,
            usage: self.limiter.usage(API_NAME).await?,
        })
    }

    pub async fn usage(&self) -> anyhow::Result<Vec<WindowUsage>> {
        self.limiter.usage(API_NAME).await
    }
}
