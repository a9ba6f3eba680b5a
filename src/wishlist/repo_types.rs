use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub restaurant_id: Uuid,
    pub notes: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub added_at: OffsetDateTime,
}

/// Wishlist entry joined with the restaurant summary shown in the list.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WishlistEntry {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub item: WishlistItem,
    pub restaurant_name: String,
    pub cuisine: Option<String>,
    pub price: Option<String>,
    pub area: Option<String>,
    pub rating: Option<f64>,
}
