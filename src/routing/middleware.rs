//! Per-route middleware chains.
//!
//! # Responsibilities
//! - Run the middleware of enclosing layouts, then the matched route
//! - Let any middleware stop the chain with its own response
//! - Reject middleware that continues more than once
//!
//! # Design Decisions
//! - `Next` is a continuation token; calling `proceed` records the intent to continue
//! - A middleware that neither continues nor responds gets a 403 on its behalf
//! - A response returned alongside a continue is ignored with a warning

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Response, StatusCode};
use thiserror::Error;

use crate::http::request::RequestContext;
use crate::http::response;

/// Middleware failed; the request ends with a generic 500.
#[derive(Debug, Error)]
pub enum MiddlewareError {
    #[error("middleware #{index} called next more than once")]
    NextCalledTwice { index: usize },

    #[error("middleware failed: {0}")]
    Failed(String),
}

/// Continuation handed to each middleware.
#[derive(Clone, Debug)]
pub struct Next {
    index: usize,
    calls: Arc<AtomicUsize>,
}

impl Next {
    fn new(index: usize) -> Self {
        Self {
            index,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Continue with the next middleware (or the page).
    pub fn proceed(&self) -> Result<(), MiddlewareError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) > 0 {
            return Err(MiddlewareError::NextCalledTwice { index: self.index });
        }
        Ok(())
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

/// A step of a route's middleware chain.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Call `next.proceed()` to continue, or return a response to stop.
    async fn handle(&self, req: &RequestContext, next: Next) -> Result<Option<Response<Body>>, MiddlewareError>;
}

/// Result of running a chain.
#[derive(Debug)]
pub enum ChainOutcome {
    Continue,
    Respond(Response<Body>),
}

/// Run `chain` in order.
pub async fn run_chain(
    req: &RequestContext,
    chain: &[&Arc<dyn Middleware>],
) -> Result<ChainOutcome, MiddlewareError> {
    for (index, middleware) in chain.iter().enumerate() {
        let next = Next::new(index);
        let result = middleware.handle(req, next.clone()).await;

        if next.calls() > 1 {
            return Err(MiddlewareError::NextCalledTwice { index });
        }
        let response = result?;

        if next.calls() == 0 {
            let response = response.unwrap_or_else(|| {
                tracing::debug!(index, path = %req.path, "Middleware stopped without a response");
                response::plain(StatusCode::FORBIDDEN, "Forbidden")
            });
            return Ok(ChainOutcome::Respond(response));
        }

        if response.is_some() {
            tracing::warn!(index, path = %req.path, "Middleware continued and returned a response; response ignored");
        }
    }
    Ok(ChainOutcome::Continue)
}

struct MiddlewareFn<F>(F);

#[async_trait]
impl<F, Fut> Middleware for MiddlewareFn<F>
where
    F: Fn(RequestContext, Next) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<Response<Body>>, MiddlewareError>> + Send,
{
    async fn handle(&self, req: &RequestContext, next: Next) -> Result<Option<Response<Body>>, MiddlewareError> {
        (self.0)(req.clone(), next).await
    }
}

/// Middleware built from an async closure.
pub fn middleware_fn<F, Fut>(f: F) -> Arc<dyn Middleware>
where
    F: Fn(RequestContext, Next) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<Response<Body>>, MiddlewareError>> + Send + 'static,
{
    Arc::new(MiddlewareFn(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn req() -> RequestContext {
        RequestContext::get("/admin").unwrap()
    }

    fn recorder(log: Arc<Mutex<Vec<&'static str>>>, name: &'static str) -> Arc<dyn Middleware> {
        middleware_fn(move |_req, next| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(name);
                next.proceed()?;
                Ok(None)
            }
        })
    }

    #[tokio::test]
    async fn test_chain_runs_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = [recorder(log.clone(), "root"), recorder(log.clone(), "leaf")];
        let refs: Vec<_> = chain.iter().collect();

        let outcome = run_chain(&req(), &refs).await.unwrap();
        assert!(matches!(outcome, ChainOutcome::Continue));
        assert_eq!(*log.lock().unwrap(), vec!["root", "leaf"]);
    }

    #[tokio::test]
    async fn test_short_circuit_with_response() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = [
            middleware_fn(|_req, _next| async {
                Ok(Some(response::plain(StatusCode::UNAUTHORIZED, "login")))
            }),
            recorder(log.clone(), "never"),
        ];
        let refs: Vec<_> = chain.iter().collect();

        match run_chain(&req(), &refs).await.unwrap() {
            ChainOutcome::Respond(r) => assert_eq!(r.status(), StatusCode::UNAUTHORIZED),
            other => panic!("unexpected {:?}", other),
        }
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_silent_stop_is_forbidden() {
        let chain = [middleware_fn(|_req, _next| async { Ok(None) })];
        let refs: Vec<_> = chain.iter().collect();

        match run_chain(&req(), &refs).await.unwrap() {
            ChainOutcome::Respond(r) => assert_eq!(r.status(), StatusCode::FORBIDDEN),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_next_called_twice() {
        // Ignores the error from the second call; the chain still notices.
        let chain = [middleware_fn(|_req, next| async move {
            next.proceed()?;
            let _ = next.proceed();
            Ok(None)
        })];
        let refs: Vec<_> = chain.iter().collect();

        let err = run_chain(&req(), &refs).await.unwrap_err();
        assert!(matches!(err, MiddlewareError::NextCalledTwice { index: 0 }));
    }
}
