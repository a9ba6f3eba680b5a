use axum::{extract::State, http::StatusCode, routing::get, Router};
use serde::Serialize;
use tracing::{instrument, warn};

use crate::{
    db,
    error::AppResult,
    response::ApiResponse,
    state::AppState,
    yelp::{rate_limit::WindowUsage, services::YelpStatus},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/monitoring/health", get(health))
        .route("/monitoring/rate-limits", get(rate_limits))
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Overall {
    Ok,
    Degraded,
    Down,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Health {
    pub status: Overall,
    pub database: bool,
    pub yelp: Option<YelpStatus>,
}

fn overall(database: bool, yelp_healthy: bool) -> Overall {
    match (database, yelp_healthy) {
        (false, _) => Overall::Down,
        (true, false) => Overall::Degraded,
        (true, true) => Overall::Ok,
    }
}

#[instrument(skip(state))]
pub async fn health(State(state): State<AppState>) -> ApiResponse<Health> {
    let database = db::ping(&state.db).await;
    let yelp = match state.yelp.status().await {
        Ok(s) => Some(s),
        Err(e) => {
            warn!(error = %e, "yelp status unavailable");
            None
        }
    };
    let status = overall(database, state.yelp.is_healthy());
    let message = match status {
        Overall::Ok => "Service healthy",
        Overall::Degraded => "Yelp unavailable, serving fallback data",
        Overall::Down => "Database unavailable",
    };
    let res = ApiResponse::ok(message, Health { status, database, yelp });
    if database {
        res
    } else {
        res.with_status(StatusCode::SERVICE_UNAVAILABLE)
    }
}

#[instrument(skip(state))]
pub async fn rate_limits(State(state): State<AppState>) -> AppResult<ApiResponse<Vec<WindowUsage>>> {
    let usage = state.yelp.usage().await?;
    Ok(ApiResponse::ok("Yelp rate limit usage", usage))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_outage_dominates() {
        assert_eq!(overall(false, true), Overall::Down);
        assert_eq!(overall(true, false), Overall::Degraded);
        assert_eq!(overall(true, true), Overall::Ok);
    }

    #[tokio::test]
    async fn health_is_503_without_database() {
        let res = health(State(AppState::fake())).await;
        let res = axum::response::IntoResponse::into_response(res);
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn rate_limits_start_unused() {
        let res = rate_limits(State(AppState::fake())).await.ok().unwrap();
        let res = axum::response::IntoResponse::into_response(res);
        assert_eq!(res.status(), StatusCode::OK);
    }
}
