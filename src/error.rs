use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;
use tracing::error;

use crate::response::{Envelope, FieldError};

/// Window that tripped a rate limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitReason {
    Minute,
    Hour,
    Day,
    /// Per-key throttles outside the Yelp windows (OTP sends, full queue).
    Throttle,
}

impl LimitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            LimitReason::Minute => "minute_limit",
            LimitReason::Hour => "hour_limit",
            LimitReason::Day => "day_limit",
            LimitReason::Throttle => "throttled",
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{message}")]
    Conflict { message: String, code: &'static str },

    #[error("Rate limit exceeded ({})", reason.as_str())]
    RateLimited { reason: LimitReason, retry_after: u64 },

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation(vec![FieldError::new(field, message)])
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        AppError::NotFound(message.into())
    }

    pub fn duplicate(message: impl Into<String>) -> Self {
        AppError::Conflict {
            message: message.into(),
            code: "DUPLICATE_ENTRY",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict { .. } => StatusCode::CONFLICT,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Conflict { code, .. } => *code,
            AppError::RateLimited { .. } => "RATE_LIMIT_EXCEEDED",
            AppError::ServiceUnavailable(_) => "SERVICE_UNAVAILABLE",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            AppError::Internal(e) => {
                error!(error = ?e, "internal error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let mut body = Envelope::failure(message, self.code());
        let mut retry_header = None;
        match self {
            AppError::Validation(fields) => body.errors = Some(fields),
            AppError::RateLimited {
                reason,
                retry_after,
            } => {
                body.retry_after = Some(retry_after);
                body.reason = Some(reason.as_str().to_string());
                retry_header = HeaderValue::from_str(&retry_after.to_string()).ok();
            }
            _ => {}
        }

        let mut res = (status, Json(body)).into_response();
        if let Some(v) = retry_header {
            res.headers_mut().insert(header::RETRY_AFTER, v);
        }
        res
    }
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::RowNotFound => AppError::not_found("Record not found"),
            sqlx::Error::Database(db) => match db.code().as_deref() {
                Some("23505") => AppError::duplicate("Record already exists"),
                Some("23503") => AppError::validation(
                    db.constraint().unwrap_or("reference"),
                    "Referenced record does not exist",
                ),
                _ => AppError::Internal(e.into()),
            },
            _ => AppError::Internal(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(res: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn validation_error_lists_fields() {
        let res = AppError::Validation(vec![
            FieldError::new("day", "must be a weekday name"),
            FieldError::new("status", "must be going, maybe or not_going"),
        ])
        .into_response();
        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = body_json(res).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "VALIDATION_ERROR");
        assert_eq!(json["errors"][0]["field"], "day");
        assert_eq!(json["errors"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn internal_error_is_redacted() {
        let res = AppError::Internal(anyhow::anyhow!("connection string leaked")).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(res).await;
        assert_eq!(json["message"], "Internal server error");
        assert!(!json.to_string().contains("leaked"));
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let res = AppError::RateLimited {
            reason: LimitReason::Hour,
            retry_after: 42,
        }
        .into_response();
        assert_eq!(res.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(res.headers().get(header::RETRY_AFTER).unwrap(), "42");
        let json = body_json(res).await;
        assert_eq!(json["reason"], "hour_limit");
        assert_eq!(json["retryAfter"], 42);
    }

    #[tokio::test]
    async fn duplicate_maps_to_conflict() {
        let err = AppError::duplicate("Restaurant already in wishlist");
        assert_eq!(err.status(), StatusCode::CONFLICT);
        let json = body_json(err.into_response()).await;
        assert_eq!(json["error"], "DUPLICATE_ENTRY");
    }

    #[test]
    fn row_not_found_maps_to_404() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
