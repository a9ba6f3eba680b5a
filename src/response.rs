//! Standard JSON envelope shared by every endpoint.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let total_pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        Self {
            page,
            limit,
            total,
            total_pages,
            has_next: page < total_pages,
            has_prev: page > 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl<T: Serialize> Envelope<T> {
    fn base(success: bool, message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            success,
            message: message.into(),
            timestamp: OffsetDateTime::now_utc(),
            data,
            meta: None,
            error: None,
            errors: None,
            retry_after: None,
            reason: None,
        }
    }
}

impl Envelope<()> {
    pub(crate) fn failure(message: impl Into<String>, code: &str) -> Self {
        let mut env = Self::base(false, message, None);
        env.error = Some(code.to_string());
        env
    }
}

/// Successful handler output: a status code plus an enveloped payload.
pub struct ApiResponse<T: Serialize> {
    status: StatusCode,
    body: Envelope<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::OK,
            body: Envelope::base(true, message, Some(data)),
        }
    }

    pub fn created(message: impl Into<String>, data: T) -> Self {
        Self {
            status: StatusCode::CREATED,
            body: Envelope::base(true, message, Some(data)),
        }
    }

    pub fn paginated(message: impl Into<String>, data: T, pagination: Pagination) -> Self {
        let mut body = Envelope::base(true, message, Some(data));
        body.meta = Some(Meta { pagination });
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    pub fn with_status(mut self, status: StatusCode) -> Self {
        self.status = status;
        self
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::OK,
            body: Envelope::base(true, message, None),
        }
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

/// `?page=&limit=` query shared by list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}
fn default_limit() -> i64 {
    20
}

/// `?city=&page=&limit=` for city-scoped lists.
#[derive(Debug, Clone, Deserialize)]
pub struct CityPageQuery {
    pub city: Option<String>,
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

impl CityPageQuery {
    pub fn paging(&self) -> PageQuery {
        PageQuery {
            page: self.page,
            limit: self.limit,
        }
    }
}

impl PageQuery {
    pub fn clamped(&self) -> (i64, i64) {
        (self.page.max(1), self.limit.clamp(1, 100))
    }

    pub fn offset(&self) -> i64 {
        let (page, limit) = self.clamped();
        (page - 1) * limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_math() {
        let p = Pagination::new(2, 10, 25);
        assert_eq!(p.total_pages, 3);
        assert!(p.has_next);
        assert!(p.has_prev);

        let last = Pagination::new(3, 10, 25);
        assert!(!last.has_next);

        let empty = Pagination::new(1, 10, 0);
        assert_eq!(empty.total_pages, 0);
        assert!(!empty.has_next);
        assert!(!empty.has_prev);
    }

    #[test]
    fn page_query_clamps_and_offsets() {
        let q = PageQuery { page: 0, limit: 500 };
        assert_eq!(q.clamped(), (1, 100));
        assert_eq!(q.offset(), 0);

        let q = PageQuery { page: 3, limit: 20 };
        assert_eq!(q.offset(), 40);
    }

    #[test]
    fn envelope_omits_empty_fields() {
        let env = Envelope::base(true, "ok", Some(serde_json::json!({"a": 1})));
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["data"]["a"], 1);
        assert!(json.get("error").is_none());
        assert!(json.get("meta").is_none());
        assert!(json["timestamp"].as_str().unwrap().contains('T'));
    }
}
