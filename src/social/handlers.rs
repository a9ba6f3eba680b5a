use axum::{
    extract::State,
    routing::get,
    Router,
};
use tracing::instrument;

use crate::{
    error::AppResult,
    extract::Query,
    response::{ApiResponse, PageQuery, Pagination},
    state::AppState,
    visits::{dto::VisitView, repo::count_all, repo_types::VisitRow, services::with_photo_urls},
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/social/feed", get(feed))
}

#[instrument(skip(state))]
pub async fn feed(
    State(state): State<AppState>,
    Query(q): Query<PageQuery>,
) -> AppResult<ApiResponse<Vec<VisitView>>> {
    let (page, limit) = q.clamped();
    let rows = VisitRow::recent(&state.db, limit, q.offset()).await?;
    let total = count_all(&state.db).await?;
    Ok(ApiResponse::paginated(
        "Feed retrieved",
        with_photo_urls(&state, rows).await,
        Pagination::new(page, limit, total),
    ))
}
