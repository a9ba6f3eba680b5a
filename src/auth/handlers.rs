use axum::{
    extract::{FromRef, State},
    routing::{get, post},
    Router,
};
use tracing::{info, instrument, warn};

use crate::{
    auth::{
        dto::{AuthResponse, PublicUser, RefreshRequest, UpdateProfileRequest},
        extractors::AuthUser,
        jwt::JwtKeys,
        repo_types::User,
        services::{is_valid_email, issue_tokens},
    },
    error::{AppError, AppResult},
    extract::Json,
    response::{ApiResponse, FieldError},
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/auth/me", get(get_me).put(update_me))
}

/// Called by the client right after a Supabase sign-in: ensures the user row
/// exists and records the login time.
#[instrument(skip(state, user), fields(user_id = %user.id))]
pub async fn login(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
) -> AppResult<ApiResponse<PublicUser>> {
    let user = User::touch_login(&state.db, user.id).await?;
    info!(provider = %user.provider, "user logged in");
    Ok(ApiResponse::ok("Login recorded", user.into()))
}

#[instrument(skip(state, payload))]
pub async fn refresh(
    State(state): State<AppState>,
    Json(payload): Json<RefreshRequest>,
) -> AppResult<ApiResponse<AuthResponse>> {
    let keys = JwtKeys::from_ref(&state);
    let claims = keys.verify_refresh(&payload.refresh_token).map_err(|e| {
        warn!(error = %e, "refresh rejected");
        AppError::Unauthorized("Invalid refresh token".into())
    })?;

    let user = User::find_by_subject(&state.db, claims.sub)
        .await?
        .ok_or_else(|| AppError::Unauthorized("User not found".into()))?;
    let pair = issue_tokens(&keys, user)?;
    Ok(ApiResponse::ok("Token refreshed", pair))
}

#[instrument(skip(user), fields(user_id = %user.id))]
pub async fn get_me(AuthUser(user): AuthUser) -> AppResult<ApiResponse<PublicUser>> {
    Ok(ApiResponse::ok("Current user", user.into()))
}

#[instrument(skip(state, user, payload), fields(user_id = %user.id))]
pub async fn update_me(
    State(state): State<AppState>,
    AuthUser(user): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> AppResult<ApiResponse<PublicUser>> {
    let name = payload.name.as_deref().map(str::trim);
    let email = payload.email.map(|e| e.trim().to_lowercase());

    let mut errors = Vec::new();
    if let Some(n) = name {
        if n.is_empty() || n.chars().count() > 80 {
            errors.push(FieldError::new("name", "Name must be 1-80 characters"));
        }
    }
    if let Some(e) = email.as_deref() {
        if !is_valid_email(e) {
            errors.push(FieldError::new("email", "Invalid email"));
        }
    }
    if !errors.is_empty() {
        return Err(AppError::Validation(errors));
    }

    let updated = User::update_profile(&state.db, user.id, name, email.as_deref()).await?;
    Ok(ApiResponse::ok("Profile updated", updated.into()))
}
