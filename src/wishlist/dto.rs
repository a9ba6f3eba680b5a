use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddWishlistRequest {
    pub restaurant_id: Uuid,
    pub notes: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WishlistCheck {
    pub restaurant_id: Uuid,
    pub in_wishlist: bool,
}
