//! Server actions: JSON mutations posted to a path.
//!
//! # Responsibilities
//! - Look up the action registered for a path
//! - Parse the JSON body and hand it to the action
//! - Invalidate cached routes the action names
//! - Map validation failures to 400 and other failures to a generic 500
//!
//! # Design Decisions
//! - Actions are keyed by exact request path; no parameters
//! - Responses are JSON: `{"status":"success","result":...}` or `{"error":...}`

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Response, StatusCode};
use serde_json::{json, Value};
use thiserror::Error;

use crate::cache::ResponseCache;
use crate::http::request::RequestContext;
use crate::http::response;

#[derive(Debug, Error)]
pub enum ActionError {
    /// The input was rejected; the message is shown to the caller.
    #[error("{0}")]
    Invalid(String),

    /// The action failed; the message is only logged.
    #[error("{0}")]
    Failed(String),
}

/// What an action produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub result: Value,
    /// Route paths whose cached pages are now stale.
    pub invalidate: Vec<String>,
}

impl ActionOutcome {
    pub fn new(result: Value) -> Self {
        Self {
            result,
            invalidate: Vec::new(),
        }
    }

    pub fn invalidating(mut self, path: impl Into<String>) -> Self {
        self.invalidate.push(path.into());
        self
    }
}

#[async_trait]
pub trait Action: Send + Sync {
    async fn run(&self, req: &RequestContext, input: Value) -> Result<ActionOutcome, ActionError>;
}

struct ActionFn<F>(F);

#[async_trait]
impl<F, Fut> Action for ActionFn<F>
where
    F: Fn(RequestContext, Value) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ActionOutcome, ActionError>> + Send,
{
    async fn run(&self, req: &RequestContext, input: Value) -> Result<ActionOutcome, ActionError> {
        (self.0)(req.clone(), input).await
    }
}

/// An action built from an async closure.
pub fn action_fn<F, Fut>(f: F) -> Arc<dyn Action>
where
    F: Fn(RequestContext, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ActionOutcome, ActionError>> + Send + 'static,
{
    Arc::new(ActionFn(f))
}

/// Actions by path.
#[derive(Clone, Default)]
pub struct ActionRegistry {
    actions: HashMap<String, Arc<dyn Action>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `action` at `path`, replacing any previous one.
    pub fn register(&mut self, path: impl Into<String>, action: Arc<dyn Action>) -> &mut Self {
        self.actions.insert(path.into(), action);
        self
    }

    pub fn get(&self, path: &str) -> Option<&Arc<dyn Action>> {
        self.actions.get(path)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Run the action registered for `req.path` with a JSON `body`.
pub async fn handle(
    registry: &ActionRegistry,
    cache: &ResponseCache,
    req: &RequestContext,
    body: Body,
    max_body_size: usize,
) -> Response<Body> {
    let Some(action) = registry.get(&req.path) else {
        return response::plain(StatusCode::NOT_FOUND, "Not Found");
    };

    let bytes = match axum::body::to_bytes(body, max_body_size).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(request_id = req.id(), error = %e, "Failed to read action body");
            return response::json(StatusCode::BAD_REQUEST, json!({ "error": "Unreadable request body" }));
        }
    };

    let input: Value = if bytes.is_empty() {
        Value::Null
    } else {
        match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(e) => {
                return response::json(
                    StatusCode::BAD_REQUEST,
                    json!({ "error": format!("Invalid JSON: {}", e) }),
                );
            }
        }
    };

    match action.run(req, input).await {
        Ok(outcome) => {
            for path in &outcome.invalidate {
                let removed = cache.invalidate_route(path);
                tracing::debug!(request_id = req.id(), path = %path, removed, "Cache invalidated by action");
            }
            response::json(
                StatusCode::OK,
                json!({ "status": "success", "result": outcome.result }),
            )
        }
        Err(ActionError::Invalid(message)) => {
            response::json(StatusCode::BAD_REQUEST, json!({ "error": message }))
        }
        Err(ActionError::Failed(message)) => {
            tracing::error!(request_id = req.id(), path = %req.path, error = %message, "Action failed");
            response::json(
                StatusCode::INTERNAL_SERVER_ERROR,
                json!({ "error": "Internal Server Error" }),
            )
        }
    }
}
