use serde::Serialize;
use sqlx::FromRow;
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct VerifiedVisit {
    pub id: Uuid,
    pub user_id: Uuid,
    pub restaurant_id: Uuid,
    #[serde(skip_serializing)]
    pub photo_key: String,
    pub rating: i16,
    pub review: Option<String>,
    pub visit_date: Date,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// A visit with the restaurant and visitor names resolved.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct VisitRow {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub visit: VerifiedVisit,
    pub restaurant_name: String,
    pub cuisine: Option<String>,
    pub user_name: Option<String>,
}

/// Aggregates over one user's visits, the input to scoring.
#[derive(Debug, Clone, Default, PartialEq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct VisitStats {
    pub visits: i64,
    pub restaurants: i64,
    pub cuisines: i64,
    pub reviews: i64,
    pub long_reviews: i64,
    pub average_rating: Option<f64>,
}
