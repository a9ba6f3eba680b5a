use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::{error, warn};

use super::{claims::TokenKind, jwt::JwtKeys, repo_types::User};
use crate::{error::AppError, state::AppState};

/// Validates the bearer token and resolves the caller's user row.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;

        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or_else(|| AppError::Unauthorized("Invalid Authorization header".into()))?;

        let keys = JwtKeys::from_ref(state);
        let claims = keys.verify(token).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            AppError::Unauthorized("Invalid or expired token".into())
        })?;
        if claims.kind != TokenKind::Access {
            return Err(AppError::Unauthorized("Access token required".into()));
        }

        let user = User::resolve_from_claims(&state.db, &claims)
            .await
            .map_err(|e| {
                error!(error = %e, sub = %claims.sub, "resolve user failed");
                AppError::from(e)
            })?;
        Ok(AuthUser(user))
    }
}

/// An authenticated user with the admin flag set.
pub struct AdminUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let AuthUser(user) = AuthUser::from_request_parts(parts, state).await?;
        if !user.is_admin {
            warn!(user_id = %user.id, "admin route refused");
            return Err(AppError::Forbidden("Admin access required".into()));
        }
        Ok(AdminUser(user))
    }
}
