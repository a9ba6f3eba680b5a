//! Reqwest-backed Yelp Fusion adapter. Owns transport concerns only:
//! auth header, timeouts, status mapping and JSON decoding.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};

use super::dto::{Business, ReviewsResponse, SearchParams, SearchResponse};
use crate::error::{AppError, LimitReason};

#[derive(Debug, Error)]
pub enum YelpError {
    #[error("yelp rate limited the request")]
    RateLimited { retry_after: Option<u64> },
    #[error("yelp business not found")]
    NotFound,
    #[error("yelp rejected credentials")]
    Unauthorized,
    #[error("yelp unavailable: {0}")]
    Unavailable(String),
    #[error("yelp returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("yelp payload could not be decoded: {0}")]
    Decode(String),
}

impl YelpError {
    /// Failures that say something about Yelp's health rather than the request.
    pub fn is_outage(&self) -> bool {
        matches!(self, YelpError::Unavailable(_) | YelpError::Decode(_))
    }
}

impl From<YelpError> for AppError {
    fn from(e: YelpError) -> Self {
        match e {
            YelpError::RateLimited { retry_after } => AppError::RateLimited {
                reason: LimitReason::Throttle,
                retry_after: retry_after.unwrap_or(60),
            },
            YelpError::NotFound => AppError::not_found("Restaurant not found on Yelp"),
            YelpError::Unavailable(_) => {
                AppError::ServiceUnavailable("Restaurant data is temporarily unavailable".into())
            }
            other => AppError::Internal(anyhow::anyhow!(other)),
        }
    }
}

/// Upstream restaurant catalogue. Implemented by the Yelp HTTP client and by
/// in-memory fakes in tests.
#[async_trait]
pub trait RestaurantSource: Send + Sync {
    async fn search(&self, params: &SearchParams) -> Result<SearchResponse, YelpError>;
    async fn business(&self, id: &str) -> Result<Business, YelpError>;
    async fn reviews(&self, id: &str) -> Result<ReviewsResponse, YelpError>;
}

pub struct YelpClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl YelpClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("austin-food-club/0.1")
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&'static str, String)],
    ) -> Result<T, YelpError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(%url, "yelp request");
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .header(reqwest::header::ACCEPT, "application/json")
            .query(query)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let body = response.bytes().await.map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_status_error(status, retry_after, body.as_ref()));
        }
        serde_json::from_slice(&body).map_err(|e| YelpError::Decode(e.to_string()))
    }
}

#[async_trait]
impl RestaurantSource for YelpClient {
    async fn search(&self, params: &SearchParams) -> Result<SearchResponse, YelpError> {
        self.get_json("/businesses/search", &params.query_pairs()).await
    }

    async fn business(&self, id: &str) -> Result<Business, YelpError> {
        self.get_json(&format!("/businesses/{id}"), &[]).await
    }

    async fn reviews(&self, id: &str) -> Result<ReviewsResponse, YelpError> {
        self.get_json(
            &format!("/businesses/{id}/reviews"),
            &[("sort_by", "yelp_sort".to_string())],
        )
        .await
    }
}

fn map_transport_error(e: reqwest::Error) -> YelpError {
    warn!(error = %e, "yelp transport error");
    YelpError::Unavailable(e.to_string())
}

fn map_status_error(status: StatusCode, retry_after: Option<u64>, body: &[u8]) -> YelpError {
    let snippet: String = String::from_utf8_lossy(body).chars().take(200).collect();
    match status {
        StatusCode::TOO_MANY_REQUESTS => YelpError::RateLimited { retry_after },
        StatusCode::NOT_FOUND => YelpError::NotFound,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => YelpError::Unauthorized,
        s if s.is_server_error() => YelpError::Unavailable(format!("status {s}")),
        s => YelpError::Status {
            status: s.as_u16(),
            body: snippet,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode as HttpStatus;

    #[test]
    fn status_mapping() {
        assert!(matches!(
            map_status_error(StatusCode::TOO_MANY_REQUESTS, Some(7), b""),
            YelpError::RateLimited { retry_after: Some(7) }
        ));
        assert!(matches!(
            map_status_error(StatusCode::BAD_GATEWAY, None, b""),
            YelpError::Unavailable(_)
        ));
        assert!(matches!(
            map_status_error(StatusCode::NOT_FOUND, None, b""),
            YelpError::NotFound
        ));
        assert!(matches!(
            map_status_error(StatusCode::BAD_REQUEST, None, b"bad location"),
            YelpError::Status { status: 400, .. }
        ));
    }

    #[test]
    fn app_error_translation() {
        let e: AppError = YelpError::RateLimited { retry_after: None }.into();
        assert_eq!(e.status(), HttpStatus::TOO_MANY_REQUESTS);
        let e: AppError = YelpError::Unavailable("timeout".into()).into();
        assert_eq!(e.status(), HttpStatus::SERVICE_UNAVAILABLE);
        assert!(YelpError::Unavailable("x".into()).is_outage());
        assert!(!YelpError::NotFound.is_outage());
    }
}
