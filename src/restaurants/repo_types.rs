use serde::Serialize;
use sqlx::{types::Json, FromRow};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::yelp::dto::{Category, Hours};

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    pub id: Uuid,
    pub yelp_id: Option<String>,
    pub name: String,
    pub cuisine: Option<String>,
    pub price: Option<String>,
    pub area: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub hours: Json<Vec<Hours>>,
    pub photos: Json<Vec<String>>,
    pub categories: Json<Vec<Category>>,
    pub rating: Option<f64>,
    pub review_count: i32,
    pub phone: Option<String>,
    pub url: Option<String>,
    pub is_featured: bool,
    pub week_of: Option<Date>,
    pub city_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}
