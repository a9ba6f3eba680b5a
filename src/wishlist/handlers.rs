use axum::{
    extract::State,
    routing::{delete, get},
    Router,
};
use tracing::{info, instrument};
use uuid::Uuid;

use super::{
    dto::{AddWishlistRequest, WishlistCheck},
    repo_types::{WishlistEntry, WishlistItem},
};
use crate::{
    auth::AuthUser,
    error::{AppError, AppResult},
    extract::{Json, Path},
    response::ApiResponse,
    restaurants::Restaurant,
    state::AppState,
};

const MAX_NOTES_CHARS: usize = 500;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/wishlist", get(list).post(add))
        .route("/wishlist/check/:restaurant_id", get(check))
        .route("/wishlist/:restaurant_id", delete(remove))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn list(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> AppResult<ApiResponse<Vec<WishlistEntry>>> {
    let rows = WishlistItem::list_for_user(&state.db, user.id).await?;
    Ok(ApiResponse::ok("Wishlist retrieved", rows))
}

#[instrument(skip(state, user, body), fields(user_id = %user.id))]
pub async fn add(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(body): Json<AddWishlistRequest>,
) -> AppResult<ApiResponse<WishlistItem>> {
    let notes = body.notes.as_deref().map(str::trim).filter(|n| !n.is_empty());
    if notes.is_some_and(|n| n.chars().count() > MAX_NOTES_CHARS) {
        return Err(AppError::validation(
            "notes",
            format!("Notes must be at most {MAX_NOTES_CHARS} characters"),
        ));
    }
    if Restaurant::find_by_id(&state.db, body.restaurant_id).await?.is_none() {
        return Err(AppError::not_found("Restaurant not found"));
    }
    let item = WishlistItem::add(&state.db, user.id, body.restaurant_id, notes)
        .await
        .map_err(|e| match AppError::from(e) {
            AppError::Conflict { .. } => AppError::duplicate("Restaurant is already in your wishlist"),
            other => other,
        })?;
    info!(restaurant_id = %item.restaurant_id, "added to wishlist");
    Ok(ApiResponse::created("Added to wishlist", item))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn remove(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(restaurant_id): Path<Uuid>,
) -> AppResult<ApiResponse<()>> {
    if !WishlistItem::remove(&state.db, user.id, restaurant_id).await? {
        return Err(AppError::not_found("Restaurant is not in your wishlist"));
    }
    Ok(ApiResponse::message("Removed from wishlist"))
}

#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn check(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Path(restaurant_id): Path<Uuid>,
) -> AppResult<ApiResponse<WishlistCheck>> {
    let found = WishlistItem::find(&state.db, user.id, restaurant_id).await?;
    Ok(ApiResponse::ok(
        "Wishlist status retrieved",
        WishlistCheck {
            restaurant_id,
            in_wishlist: found.is_some(),
        },
    ))
}
