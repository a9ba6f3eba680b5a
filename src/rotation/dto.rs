use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RotateRequest {
    pub city: Option<String>,
    pub week_start: Option<Date>,
    #[serde(default)]
    pub force_new: bool,
    pub custom_restaurant_id: Option<Uuid>,
    pub custom_description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomFeaturedRequest {
    pub city: Option<String>,
    pub restaurant_id: Uuid,
    pub week_start: Option<Date>,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveRequest {
    pub months_to_keep: Option<i32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveResponse {
    pub archived: u64,
    pub months_to_keep: i32,
}
