use axum::{
    extract::{DefaultBodyLimit, State},
    routing::{delete, get},
    Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{CreateVisitRequest, CreatedVisit, VisitView},
    photo,
    repo::{count_for_restaurant, count_for_user},
    repo_types::{VerifiedVisit, VisitRow, VisitStats},
    services::{record_visit, summary, today, validate, with_photo_urls, UserVisitSummary},
};
use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    extract::{Json, Path, Query},
    response::{ApiResponse, PageQuery, Pagination},
    state::AppState,
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/verified-visits/stats", get(my_stats))
        .route("/verified-visits/restaurant/:id", get(for_restaurant))
        .route("/verified-visits/:id", delete(remove))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/verified-visits", get(list_mine).post(create))
        // base64 photos up to 10 MB
        .layer(DefaultBodyLimit::max(15 * 1024 * 1024))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn create(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<CreateVisitRequest>,
) -> AppResult<ApiResponse<CreatedVisit>> {
    let valid = validate(body, today())?;
    let (visit, rewards) = record_visit(&state, user.id, valid).await?;
    let row = VisitRow::find(&state.db, visit.id)
        .await?
        .ok_or_else(|| AppError::not_found("Visit not found"))?;
    let photo_url = photo::presign(&state, &row.visit.photo_key).await;
    Ok(ApiResponse::created(
        "Visit verified",
        CreatedVisit {
            visit: VisitView { row, photo_url },
            rewards,
        },
    ))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list_mine(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Query(q): Query<PageQuery>,
) -> AppResult<ApiResponse<Vec<VisitView>>> {
    let (page, limit) = q.clamped();
    let rows = VisitRow::list_for_user(&state.db, user.id, limit, q.offset()).await?;
    let total = count_for_user(&state.db, user.id).await?;
    Ok(ApiResponse::paginated(
        "Visits retrieved",
        with_photo_urls(&state, rows).await,
        Pagination::new(page, limit, total),
    ))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn my_stats(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> AppResult<ApiResponse<UserVisitSummary>> {
    let stats = VisitStats::for_user(&state.db, user.id).await?;
    Ok(ApiResponse::ok("Visit stats retrieved", summary(stats)))
}

#[instrument(skip(state))]
pub async fn for_restaurant(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(q): Query<PageQuery>,
) -> AppResult<ApiResponse<Vec<VisitView>>> {
    let (page, limit) = q.clamped();
    let rows = VisitRow::list_for_restaurant(&state.db, id, limit, q.offset()).await?;
    let total = count_for_restaurant(&state.db, id).await?;
    Ok(ApiResponse::paginated(
        "Restaurant visits retrieved",
        with_photo_urls(&state, rows).await,
        Pagination::new(page, limit, total),
    ))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn remove(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<ApiResponse<()>> {
    let visit = VerifiedVisit::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("Visit not found"))?;
    if visit.user_id != user.id {
        return Err(AppError::Forbidden("You can only delete your own visits".into()));
    }
    if !VerifiedVisit::delete(&state.db, id, user.id).await? {
        return Err(AppError::not_found("Visit not found"));
    }
    photo::remove(&state, &visit.photo_key).await;
    info!(visit_id = %id, "verified visit deleted");
    Ok(ApiResponse::message("Visit deleted"))
}
