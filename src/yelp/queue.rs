//! FIFO of Yelp calls that arrived while the budget was exhausted.
//!
//! Entries live in memory only and are dropped on restart. Capacity is
//! bounded; a full queue rejects new work instead of growing.

use std::collections::VecDeque;

use tokio::sync::{oneshot, Mutex};
use tracing::debug;

use super::{
    cache::{CacheKind, YelpCache},
    client::YelpError,
    dto::{Business, ReviewsResponse, SearchParams, SearchResponse},
};
use crate::error::{AppError, LimitReason};

#[derive(Debug, Clone, PartialEq)]
pub enum YelpRequest {
    Search(SearchParams),
    Details(String),
    Reviews(String),
}

impl YelpRequest {
    pub fn cache_entry(&self) -> (CacheKind, String) {
        match self {
            YelpRequest::Search(p) => (CacheKind::Search, YelpCache::search_key(p)),
            YelpRequest::Details(id) => (CacheKind::Details, YelpCache::id_key(CacheKind::Details, id)),
            YelpRequest::Reviews(id) => (CacheKind::Reviews, YelpCache::id_key(CacheKind::Reviews, id)),
        }
    }
}

#[derive(Debug, Clone)]
pub enum YelpReply {
    Search(SearchResponse),
    Details(Business),
    Reviews(ReviewsResponse),
}

impl YelpReply {
    pub fn into_search(self) -> Option<SearchResponse> {
        match self {
            YelpReply::Search(r) => Some(r),
            _ => None,
        }
    }

    pub fn into_details(self) -> Option<Business> {
        match self {
            YelpReply::Details(b) => Some(b),
            _ => None,
        }
    }

    pub fn into_reviews(self) -> Option<ReviewsResponse> {
        match self {
            YelpReply::Reviews(r) => Some(r),
            _ => None,
        }
    }
}

pub type ReplySender = oneshot::Sender<Result<YelpReply, YelpError>>;
pub type ReplyReceiver = oneshot::Receiver<Result<YelpReply, YelpError>>;

pub struct Pending {
    pub request: YelpRequest,
    pub reply: ReplySender,
}

pub struct RequestQueue {
    inner: Mutex<VecDeque<Pending>>,
    capacity: usize,
}

impl RequestQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(VecDeque::new()),
            capacity,
        }
    }

    pub async fn push(&self, request: YelpRequest) -> Result<ReplyReceiver, AppError> {
        let mut q = self.inner.lock().await;
        if q.len() >= self.capacity {
            return Err(AppError::RateLimited {
                reason: LimitReason::Throttle,
                retry_after: 60,
            });
        }
        let (tx, rx) = oneshot::channel();
        q.push_back(Pending { request, reply: tx });
        debug!(depth = q.len(), "yelp request queued");
        Ok(rx)
    }

    /// Drops entries whose caller already gave up, then reports whether work remains.
    pub async fn has_live_work(&self) -> bool {
        let mut q = self.inner.lock().await;
        while q.front().is_some_and(|p| p.reply.is_closed()) {
            q.pop_front();
        }
        !q.is_empty()
    }

    pub async fn pop(&self) -> Option<Pending> {
        self.inner.lock().await.pop_front()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}
