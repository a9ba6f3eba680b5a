use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Body of `POST /rsvp`. Day and status arrive as text so that bad values
/// come back as field errors instead of a generic JSON rejection.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRsvpRequest {
    pub restaurant_id: Option<Uuid>,
    pub day: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountsQuery {
    pub restaurant_id: Option<Uuid>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct DayCounts {
    pub monday: i64,
    pub tuesday: i64,
    pub wednesday: i64,
    pub thursday: i64,
    pub friday: i64,
    pub saturday: i64,
    pub sunday: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RsvpCounts {
    pub restaurant_id: Uuid,
    pub counts: DayCounts,
    pub total: i64,
}
