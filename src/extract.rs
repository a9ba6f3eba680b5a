//! `Json`, `Path` and `Query` extractors whose rejections render as the
//! standard envelope instead of axum's plain-text bodies.

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection, QueryRejection},
        FromRequest, FromRequestParts,
    },
    http::StatusCode,
};
use tracing::debug;

use crate::{error::AppError, response::FieldError};

#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Path<T>(pub T);

#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Query<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        debug!(error = %rejection.body_text(), "json body rejected");
        match rejection {
            JsonRejection::JsonDataError(e) => {
                AppError::Validation(vec![FieldError::new("body", e.body_text())])
            }
            other if other.status() == StatusCode::PAYLOAD_TOO_LARGE => {
                AppError::BadRequest("Request body is too large".into())
            }
            other => AppError::BadRequest(other.body_text()),
        }
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        debug!(error = %rejection.body_text(), "path parameter rejected");
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        debug!(error = %rejection.body_text(), "query string rejected");
        AppError::Validation(vec![FieldError::new("query", rejection.body_text())])
    }
}
