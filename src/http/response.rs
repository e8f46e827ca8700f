//! Response construction helpers.
//!
//! # Responsibilities
//! - Build plain-text, HTML and JSON responses without fallible builders
//! - Name the response headers the runtime sets
//!
//! # Design Decisions
//! - Headers are set through `headers_mut`, so construction cannot fail
//! - Page responses always carry an explicit Content-Type

use axum::body::Body;
use axum::http::{header, HeaderName, HeaderValue, Response, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::Value;

/// Whether a page came from the response cache (`hit`) or was rendered (`miss`).
pub const X_RENDER_CACHE: HeaderName = HeaderName::from_static("x-render-cache");

const HTML: HeaderValue = HeaderValue::from_static("text/html; charset=utf-8");
const TEXT: HeaderValue = HeaderValue::from_static("text/plain; charset=utf-8");

pub fn with_status(status: StatusCode, body: Body) -> Response<Body> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
}

pub fn plain(status: StatusCode, message: &'static str) -> Response<Body> {
    let mut response = with_status(status, Body::from(message));
    response.headers_mut().insert(header::CONTENT_TYPE, TEXT);
    response
}

pub fn html(status: StatusCode, body: Body) -> Response<Body> {
    let mut response = with_status(status, body);
    response.headers_mut().insert(header::CONTENT_TYPE, HTML);
    response
}

pub fn json(status: StatusCode, value: Value) -> Response<Body> {
    (status, Json(value)).into_response()
}
