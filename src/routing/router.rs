//! Route registration and dispatch.
//!
//! # Responsibilities
//! - Collect registrations into a route tree at startup
//! - Match a request, bind its parameters, run its middleware
//! - Hand matched requests to the render pipeline
//!
//! # Design Decisions
//! - Immutable after `build` (shared across requests without locks)
//! - Explicit no-match (`None`) rather than a silent default
//! - Middleware failures map to a generic 500 without detail

use std::sync::Arc;

use axum::http::StatusCode;

use crate::http::request::RequestContext;
use crate::http::response;
use crate::render::pipeline::{RenderPipeline, Rendered};
use crate::routing::handler::{Handler, Layout, Page};
use crate::routing::middleware::{run_chain, ChainOutcome};
use crate::routing::tree::{RouteInfo, RouteMatch, RouteOptions, RouteTree};
use crate::routing::RouteError;

/// Collects route registrations.
#[derive(Default)]
pub struct RouterBuilder {
    tree: RouteTree,
}

impl RouterBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` at `path`.
    pub fn add_route(
        &mut self,
        path: &str,
        handler: Handler,
        options: RouteOptions,
    ) -> Result<&mut Self, RouteError> {
        self.tree.insert(path, handler, options)?;
        tracing::debug!(path, "Route registered");
        Ok(self)
    }

    pub fn page(&mut self, path: &str, page: Arc<dyn Page>) -> Result<&mut Self, RouteError> {
        self.add_route(path, Handler::Page(page), RouteOptions::default())
    }

    pub fn layout(&mut self, path: &str, layout: Arc<dyn Layout>) -> Result<&mut Self, RouteError> {
        self.add_route(path, Handler::Layout(layout), RouteOptions::default())
    }

    pub fn build(self) -> Router {
        Router { tree: self.tree }
    }
}

/// Immutable router.
pub struct Router {
    tree: RouteTree,
}

impl Router {
    pub fn builder() -> RouterBuilder {
        RouterBuilder::new()
    }

    /// Match a request path against the page routes.
    pub fn match_path(&self, pathname: &str) -> Option<RouteMatch<'_>> {
        self.tree.match_path(pathname)
    }

    /// All page routes in registration order.
    pub fn all_routes(&self) -> Vec<RouteInfo> {
        self.tree.routes()
    }

    /// Render `req`, or `None` when no route matches its path.
    pub async fn render(
        &self,
        pipeline: &RenderPipeline,
        req: RequestContext,
    ) -> Option<axum::response::Response> {
        self.dispatch(pipeline, req).await.map(|rendered| rendered.response)
    }

    /// Like `render`, but exposes the background cache fill.
    pub async fn dispatch(&self, pipeline: &RenderPipeline, mut req: RequestContext) -> Option<Rendered> {
        let Some(matched) = self.match_path(&req.path) else {
            tracing::debug!(path = %req.path, "No route matched");
            return None;
        };
        req.params = matched.params.clone();

        match run_chain(&req, &matched.middleware()).await {
            Ok(ChainOutcome::Continue) => Some(pipeline.render(&matched, &req).await),
            Ok(ChainOutcome::Respond(response)) => Some(Rendered::immediate(response)),
            Err(e) => {
                tracing::error!(
                    request_id = req.request_id.as_deref().unwrap_or("unknown"),
                    path = %req.path,
                    error = %e,
                    "Middleware failed"
                );
                Some(Rendered::immediate(response::plain(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error",
                )))
            }
        }
    }
}
