//! Security response headers and request limits.
//!
//! # Responsibilities
//! - Add `X-Content-Type-Options`, `X-Frame-Options` and `X-XSS-Protection` to responses
//! - Cap request body size
//!
//! # Design Decisions
//! - Headers are only added when the handler did not set them
//! - Applied to the whole app, static files included

use axum::http::{header, HeaderValue};
use axum::Router;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::SecurityConfig;

/// Wrap `app` with the configured hardening layers.
pub fn apply(app: Router, config: &SecurityConfig) -> Router {
    let app = app.layer(RequestBodyLimitLayer::new(config.max_body_size));
    if !config.enable_headers {
        return app;
    }
    app.layer(SetResponseHeaderLayer::if_not_present(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    ))
    .layer(SetResponseHeaderLayer::if_not_present(
        header::X_FRAME_OPTIONS,
        HeaderValue::from_static("DENY"),
    ))
    .layer(SetResponseHeaderLayer::if_not_present(
        header::X_XSS_PROTECTION,
        HeaderValue::from_static("1; mode=block"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;
    use tower::ServiceExt;

    fn app() -> Router {
        Router::new().route("/", get(|| async { "ok" }))
    }

    #[tokio::test]
    async fn test_headers_added() {
        let app = apply(app(), &SecurityConfig::default());
        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(response.headers()[header::X_FRAME_OPTIONS], "DENY");
        assert_eq!(response.headers()[header::X_XSS_PROTECTION], "1; mode=block");
    }

    #[tokio::test]
    async fn test_headers_disabled() {
        let config = SecurityConfig {
            enable_headers: false,
            ..SecurityConfig::default()
        };
        let response = apply(app(), &config)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.headers().get(header::X_FRAME_OPTIONS).is_none());
    }
}
