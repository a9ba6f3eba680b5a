use axum::{
    extract::{FromRef, State},
    routing::post,
    Router,
};
use tracing::{info, instrument};

use super::{
    dto::{CodeSent, SendCodeRequest, VerifyCodeRequest},
    services::{check_code, is_code_shape, send_code, CODE_TTL},
};
use crate::{
    auth::{
        dto::AuthResponse,
        jwt::JwtKeys,
        repo_types::User,
        services::{issue_tokens, normalize_phone},
    },
    error::{AppError, AppResult},
    extract::Json,
    response::{ApiResponse, FieldError},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/verification/send-code", post(send))
        .route("/verification/verify-code", post(verify))
}

fn phone_field(raw: Option<&str>) -> Result<String, FieldError> {
    match raw.map(str::trim).filter(|p| !p.is_empty()) {
        None => Err(FieldError::new("phone", "Phone number is required")),
        Some(p) => normalize_phone(p)
            .ok_or_else(|| FieldError::new("phone", "Invalid phone number")),
    }
}

#[instrument(skip(state, body))]
pub async fn send(
    State(state): State<AppState>,
    Json(body): Json<SendCodeRequest>,
) -> AppResult<ApiResponse<CodeSent>> {
    let phone = phone_field(body.phone.as_deref()).map_err(|f| AppError::Validation(vec![f]))?;
    send_code(state.store.as_ref(), state.sms.as_ref(), &phone).await?;
    Ok(ApiResponse::ok(
        "Verification code sent",
        CodeSent {
            phone,
            expires_in: CODE_TTL.as_secs(),
        },
    ))
}

#[instrument(skip(state, body))]
pub async fn verify(
    State(state): State<AppState>,
    Json(body): Json<VerifyCodeRequest>,
) -> AppResult<ApiResponse<AuthResponse>> {
    let mut errors = Vec::new();
    let phone = match phone_field(body.phone.as_deref()) {
        Ok(p) => Some(p),
        Err(f) => {
            errors.push(f);
            None
        }
    };
    let code = body.code.as_deref().map(str::trim).unwrap_or_default();
    if !is_code_shape(code) {
        errors.push(FieldError::new("code", "Code must be 6 digits"));
    }
    let name = body
        .name
        .as_deref()
        .map(str::trim)
        .filter(|n| !n.is_empty());
    if name.is_some_and(|n| n.chars().count() > 80) {
        errors.push(FieldError::new("name", "Name must be 1-80 characters"));
    }
    let Some(phone) = phone.filter(|_| errors.is_empty()) else {
        return Err(AppError::Validation(errors));
    };

    check_code(state.store.as_ref(), &phone, code).await?;

    let user = match User::find_by_phone(&state.db, &phone).await? {
        Some(existing) => User::touch_login(&state.db, existing.id).await?,
        None => {
            let created = User::create_phone_user(&state.db, &phone, name).await?;
            info!(user_id = %created.id, "phone user created");
            created
        }
    };
    let pair = issue_tokens(&JwtKeys::from_ref(&state), user)?;
    Ok(ApiResponse::ok("Phone verified", pair))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phone_field_normalises_or_explains() {
        assert_eq!(phone_field(Some(" 512-555-0100 ")).unwrap(), "+15125550100");
        assert_eq!(phone_field(None).unwrap_err().message, "Phone number is required");
        assert_eq!(phone_field(Some("12")).unwrap_err().message, "Invalid phone number");
    }
}
