use axum::{
    extract::State,
    routing::get,
    Router,
};
use tracing::instrument;

use super::{repo_types::City, services::resolve_city};
use crate::{error::AppResult, extract::Path, response::ApiResponse, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cities", get(list_cities))
        .route("/cities/:slug", get(get_city))
}

#[instrument(skip(state))]
pub async fn list_cities(State(state): State<AppState>) -> AppResult<ApiResponse<Vec<City>>> {
    let cities = City::list_active(&state.db).await?;
    Ok(ApiResponse::ok("Cities retrieved", cities))
}

#[instrument(skip(state))]
pub async fn get_city(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> AppResult<ApiResponse<City>> {
    let city = resolve_city(&state.db, Some(&slug), &state.config.default_city).await?;
    Ok(ApiResponse::ok("City retrieved", city))
}
