//! Request context handed to middleware, pages and actions.
//!
//! # Responsibilities
//! - Capture method, path, query and headers from the incoming request
//! - Carry the request ID assigned by the request-id layer
//! - Carry route parameters once the router has bound them
//!
//! # Design Decisions
//! - Owned and cheap to clone, so closures can take it by value
//! - Body is not part of the context; actions read it separately

use std::collections::HashMap;

use axum::http::request::Parts;
use axum::http::uri::InvalidUri;
use axum::http::{header, HeaderMap, Method, Uri};

/// Header carrying the request ID.
pub const X_REQUEST_ID: &str = "x-request-id";

#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    pub path: String,
    /// Raw query string without the leading `?`.
    pub query: Option<String>,
    pub headers: HeaderMap,
    /// Route parameters, percent-decoded.
    pub params: HashMap<String, String>,
    pub request_id: Option<String>,
}

impl RequestContext {
    pub fn from_parts(parts: &Parts) -> Self {
        Self {
            method: parts.method.clone(),
            path: parts.uri.path().to_string(),
            query: parts.uri.query().map(str::to_string),
            headers: parts.headers.clone(),
            params: HashMap::new(),
            request_id: parts
                .headers
                .get(X_REQUEST_ID)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        }
    }

    /// A synthetic GET request, as used for preloading.
    pub fn get(uri: &str) -> Result<Self, InvalidUri> {
        let uri: Uri = uri.parse()?;
        Ok(Self {
            method: Method::GET,
            path: uri.path().to_string(),
            query: uri.query().map(str::to_string),
            headers: HeaderMap::new(),
            params: HashMap::new(),
            request_id: None,
        })
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn if_none_match(&self) -> Option<&str> {
        self.headers
            .get(header::IF_NONE_MATCH)
            .and_then(|v| v.to_str().ok())
    }

    /// Request ID for log fields.
    pub fn id(&self) -> &str {
        self.request_id.as_deref().unwrap_or("unknown")
    }
}
