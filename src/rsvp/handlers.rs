use axum::{
    extract::State,
    routing::{delete, get},
    Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{CountsQuery, CreateRsvpRequest, RsvpCounts},
    repo_types::{Rsvp, RsvpWithRestaurant},
    services::{target_restaurant, validate, zero_fill},
};
use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    extract::{Json, Path, Query},
    response::ApiResponse,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/rsvp", get(list_mine).post(create_or_replace))
        .route("/rsvp/counts", get(counts))
        .route("/rsvp/:id", delete(remove))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn create_or_replace(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<CreateRsvpRequest>,
) -> AppResult<ApiResponse<Rsvp>> {
    let (day, status) = validate(&body)?;
    let restaurant_id = target_restaurant(&state, body.restaurant_id).await?;
    let rsvp = Rsvp::upsert(&state.db, user.id, restaurant_id, day, status).await?;
    info!(rsvp_id = %rsvp.id, %restaurant_id, ?day, ?status, "rsvp saved");
    Ok(ApiResponse::ok("RSVP saved", rsvp))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list_mine(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> AppResult<ApiResponse<Vec<RsvpWithRestaurant>>> {
    let rows = Rsvp::list_for_user(&state.db, user.id).await?;
    Ok(ApiResponse::ok("RSVPs retrieved", rows))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn remove(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<ApiResponse<()>> {
    let rsvp = Rsvp::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| AppError::not_found("RSVP not found"))?;
    if rsvp.user_id != user.id {
        return Err(AppError::Forbidden("You can only delete your own RSVPs".into()));
    }
    if !Rsvp::delete(&state.db, id, user.id).await? {
        return Err(AppError::not_found("RSVP not found"));
    }
    Ok(ApiResponse::message("RSVP deleted"))
}

#[instrument(skip(state))]
pub async fn counts(
    State(state): State<AppState>,
    Query(q): Query<CountsQuery>,
) -> AppResult<ApiResponse<RsvpCounts>> {
    let restaurant_id = target_restaurant(&state, q.restaurant_id).await?;
    let rows = Rsvp::going_by_day(&state.db, restaurant_id).await?;
    let total = rows.iter().map(|(_, n)| n).sum();
    Ok(ApiResponse::ok(
        "RSVP counts retrieved",
        RsvpCounts {
            restaurant_id,
            counts: zero_fill(&rows),
            total,
        },
    ))
}
