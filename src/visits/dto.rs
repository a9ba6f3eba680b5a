use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{repo_types::VisitRow, services::Rewards};

/// Body of `POST /verified-visits`. Fields are optional here so that every
/// missing or malformed one is reported together.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateVisitRequest {
    pub restaurant_id: Option<Uuid>,
    pub photo: Option<String>,
    pub rating: Option<i64>,
    pub review: Option<String>,
    pub visit_date: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitView {
    #[serde(flatten)]
    pub row: VisitRow,
    pub photo_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedVisit {
    pub visit: VisitView,
    pub rewards: Rewards,
}
