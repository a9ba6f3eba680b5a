use serde::{Deserialize, Serialize};

use super::repo_types::Restaurant;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestaurantDetails {
    #[serde(flatten)]
    pub restaurant: Restaurant,
    pub map_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CityQuery {
    pub city: Option<String>,
}
