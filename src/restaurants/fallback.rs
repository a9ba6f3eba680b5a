use async_trait::async_trait;
use sqlx::PgPool;
use tracing::info;

use super::{repo_types::Restaurant, services::to_business};
use crate::yelp::{
    dto::{Business, SearchParams, SearchResponse},
    fallback::FallbackSource,
};

/// Answers Yelp-shaped queries from restaurants already stored for the city.
pub struct DbFallback {
    db: PgPool,
    city_slug: String,
}

impl DbFallback {
    pub fn new(db: PgPool, city_slug: String) -> Self {
        Self { db, city_slug }
    }
}

#[async_trait]
impl FallbackSource for DbFallback {
    async fn search(&self, params: &SearchParams) -> anyhow::Result<Option<SearchResponse>> {
        let term = params
            .term
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        let limit = i64::from(params.limit.unwrap_or(20).min(50));
        let rows = Restaurant::search_in_city(&self.db, &self.city_slug, term, limit).await?;
        info!(count = rows.len(), city = %self.city_slug, "search answered from database");
        if rows.is_empty() {
            return Ok(None);
        }
        let businesses: Vec<Business> = rows.iter().map(to_business).collect();
        Ok(Some(SearchResponse {
            total: businesses.len() as u64,
            businesses,
        }))
    }

    async fn business(&self, yelp_id: &str) -> anyhow::Result<Option<Business>> {
        let row = Restaurant::find_by_yelp_id(&self.db, yelp_id).await?;
        Ok(row.as_ref().map(to_business))
    }
}
