use serde::Serialize;
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// The pick for one city and week.
#[derive(Debug, Clone, FromRow)]
pub struct FeaturedWeek {
    pub id: Uuid,
    pub city_id: Uuid,
    pub restaurant_id: Uuid,
    pub week_start: Date,
    pub description: Option<String>,
    pub is_custom: bool,
    pub created_at: OffsetDateTime,
    pub archived_at: Option<OffsetDateTime>,
}

/// History row with the restaurant name resolved.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FeaturedHistoryEntry {
    pub id: Uuid,
    pub restaurant_id: Uuid,
    pub restaurant_name: String,
    pub week_start: Date,
    pub description: Option<String>,
    pub is_custom: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub archived_at: Option<OffsetDateTime>,
}
