use std::net::SocketAddr;

use axum::{
    http::{header, HeaderValue, Method},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};
use tracing::warn;

use crate::error::AppError;
use crate::state::AppState;
use crate::{
    auth, cities, monitoring, restaurants, rotation, rsvp, social, verification, visits, wishlist,
};

pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);
    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(auth::router())
                .merge(verification::router())
                .merge(cities::router())
                .merge(restaurants::router())
                .merge(rotation::router())
                .merge(rsvp::router())
                .merge(wishlist::router())
                .merge(visits::router())
                .merge(social::router())
                .merge(monitoring::router()),
        )
        .fallback(|| async { AppError::not_found("Route not found") })
        .with_state(state)
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        let ms = latency.as_millis() as u64;
                        if status.is_server_error() {
                            tracing::error!(%status, ms, "response");
                        } else {
                            tracing::info!(%status, ms, "response");
                        }
                    },
                ),
        )
}

/// Credentialed CORS for the configured web origins only.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "ignoring malformed CORS origin");
                None
            }
        })
        .collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
}

pub async fn serve(app: Router) -> anyhow::Result<()> {
    let addr: SocketAddr = format!(
        "{}:{}",
        std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
        std::env::var("APP_PORT").unwrap_or_else(|_| "8080".into())
    )
    .parse()?;

    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt;

    async fn call(req: Request<Body>) -> (StatusCode, Value) {
        let res = build_app(AppState::fake()).oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn protected_routes_need_a_token() {
        for uri in ["/api/rsvp", "/api/wishlist", "/api/verified-visits", "/api/auth/me"] {
            let (status, body) = call(get(uri)).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
            assert_eq!(body["success"], false);
            assert_eq!(body["error"], "UNAUTHORIZED");
            assert!(body["timestamp"].is_string());
        }
    }

    #[tokio::test]
    async fn garbage_token_is_rejected() {
        let req = Request::builder()
            .uri("/api/rsvp")
            .header(header::AUTHORIZATION, "Bearer not.a.jwt")
            .body(Body::empty())
            .unwrap();
        let (status, _) = call(req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_route_is_enveloped_404() {
        let (status, body) = call(get("/api/nope")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "NOT_FOUND");
        assert_eq!(body["message"], "Route not found");
    }

    #[tokio::test]
    async fn invalid_phone_is_a_field_error() {
        let (status, body) =
            call(post_json("/api/verification/send-code", serde_json::json!({"phone": "12"}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["errors"][0]["field"], "phone");
    }

    #[tokio::test]
    async fn send_code_accepts_a_us_number() {
        let (status, body) = call(post_json(
            "/api/verification/send-code",
            serde_json::json!({"phone": "(512) 555-0100"}),
        ))
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["phone"], "+15125550100");
        assert_eq!(body["data"]["expiresIn"], 600);
    }

    #[tokio::test]
    async fn malformed_json_is_enveloped_400() {
        let req = Request::builder()
            .method("POST")
            .uri("/api/verification/send-code")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{"))
            .unwrap();
        let (status, body) = call(req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn wrongly_typed_json_is_a_field_error() {
        let (status, body) =
            call(post_json("/api/verification/send-code", serde_json::json!({"phone": 5125550100u64})))
                .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "VALIDATION_ERROR");
        assert_eq!(body["errors"][0]["field"], "body");
    }

    #[tokio::test]
    async fn missing_content_type_is_enveloped() {
        let req = Request::builder()
            .method("POST")
            .uri("/api/verification/send-code")
            .body(Body::from(r#"{"phone":"5125550100"}"#))
            .unwrap();
        let (status, body) = call(req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn non_uuid_path_is_enveloped_400() {
        let (status, body) = call(get("/api/verified-visits/restaurant/r1")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn bad_query_is_a_field_error() {
        let (status, body) = call(get("/api/social/feed?page=abc")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["errors"][0]["field"], "query");
    }

    #[tokio::test]
    async fn allowed_origin_gets_credentialed_cors() {
        let req = Request::builder()
            .method("OPTIONS")
            .uri("/api/cities")
            .header(header::ORIGIN, "http://localhost:5173")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
            .body(Body::empty())
            .unwrap();
        let res = build_app(AppState::fake()).oneshot(req).await.unwrap();
        assert_eq!(
            res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "http://localhost:5173"
        );
        assert_eq!(
            res.headers().get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
            "true"
        );
    }

    #[tokio::test]
    async fn unknown_origin_gets_no_cors_headers() {
        let req = Request::builder()
            .uri("/api/nope")
            .header(header::ORIGIN, "https://evil.example")
            .body(Body::empty())
            .unwrap();
        let res = build_app(AppState::fake()).oneshot(req).await.unwrap();
        assert!(res.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).is_none());
    }
}
