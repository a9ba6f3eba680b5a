use axum::{
    extract::State,
    routing::{get, post},
    Router,
};
use tracing::{info, instrument};

use super::{
    dto::{ArchiveRequest, ArchiveResponse, CustomFeaturedRequest, RotateRequest},
    repo_types::{FeaturedHistoryEntry, FeaturedWeek},
    services::{
        archive_old_featured, current_week_start, select_featured_restaurant, set_custom_featured,
        FeaturedRecord, SelectOptions,
    },
};
use crate::{
    auth::AdminUser,
    cities::services::resolve_city,
    error::AppResult,
    extract::{Json, Query},
    response::{ApiResponse, CityPageQuery, Pagination},
    state::AppState,
};

pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route("/admin/featured/rotate", post(rotate))
        .route("/admin/featured/custom", post(set_custom))
        .route("/admin/featured/archive", post(archive))
        .route("/admin/featured/history", get(history))
}

#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn rotate(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    body: Option<Json<RotateRequest>>,
) -> AppResult<ApiResponse<FeaturedRecord>> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let city = resolve_city(&state.db, body.city.as_deref(), &state.config.default_city).await?;
    let week = body.week_start.unwrap_or_else(current_week_start);
    let record = select_featured_restaurant(
        &state,
        &city,
        week,
        SelectOptions {
            custom_restaurant_id: body.custom_restaurant_id,
            custom_description: body.custom_description,
            force_new: body.force_new,
        },
    )
    .await?;
    info!(restaurant_id = %record.restaurant.id, "manual rotation");
    Ok(ApiResponse::ok("Featured restaurant selected", record))
}

#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn set_custom(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(body): Json<CustomFeaturedRequest>,
) -> AppResult<ApiResponse<FeaturedRecord>> {
    let city = resolve_city(&state.db, body.city.as_deref(), &state.config.default_city).await?;
    let week = body.week_start.unwrap_or_else(current_week_start);
    let record =
        set_custom_featured(&state, &city, body.restaurant_id, week, body.description).await?;
    Ok(ApiResponse::ok("Custom featured restaurant set", record))
}

#[instrument(skip(state, admin, body), fields(admin_id = %admin.id))]
pub async fn archive(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    body: Option<Json<ArchiveRequest>>,
) -> AppResult<ApiResponse<ArchiveResponse>> {
    let months_to_keep = body
        .and_then(|Json(b)| b.months_to_keep)
        .unwrap_or(state.config.rotation.months_to_keep)
        .max(1);
    let archived = archive_old_featured(&state.db, months_to_keep).await?;
    Ok(ApiResponse::ok(
        format!("Archived {archived} featured records"),
        ArchiveResponse {
            archived,
            months_to_keep,
        },
    ))
}

#[instrument(skip(state, admin), fields(admin_id = %admin.id))]
pub async fn history(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Query(q): Query<CityPageQuery>,
) -> AppResult<ApiResponse<Vec<FeaturedHistoryEntry>>> {
    let city = resolve_city(&state.db, q.city.as_deref(), &state.config.default_city).await?;
    let paging = q.paging();
    let (page, limit) = paging.clamped();
    let rows = FeaturedWeek::history(&state.db, city.id, limit, paging.offset()).await?;
    let total = FeaturedWeek::count_for_city(&state.db, city.id).await?;
    Ok(ApiResponse::paginated(
        "Featured history retrieved",
        rows,
        Pagination::new(page, limit, total),
    ))
}
