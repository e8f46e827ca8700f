//! Page and layout handlers.
//!
//! A page produces the view for a route and may fetch server data first.
//! A layout wraps whatever a deeper route rendered.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::http::request::RequestContext;
use crate::render::{RenderError, ViewNode};

/// Renders the view for a matched route.
#[async_trait]
pub trait Page: Send + Sync {
    /// Fetch data for `render`. Pages without a data source return `Ok(None)`.
    async fn server_data(&self, _req: &RequestContext) -> Result<Option<Value>, RenderError> {
        Ok(None)
    }

    /// Build the view. `data` is `None` when there is no data source or
    /// when fetching it failed and the runtime degraded.
    async fn render(&self, req: &RequestContext, data: Option<Value>) -> Result<ViewNode, RenderError>;
}

/// Wraps the view of every route beneath it.
pub trait Layout: Send + Sync {
    fn wrap(&self, req: &RequestContext, children: ViewNode) -> ViewNode;
}

/// What a registration attaches to a route node.
#[derive(Clone)]
pub enum Handler {
    Page(Arc<dyn Page>),
    Layout(Arc<dyn Layout>),
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Handler::Page(_) => f.write_str("Handler::Page"),
            Handler::Layout(_) => f.write_str("Handler::Layout"),
        }
    }
}

struct PageFn<F>(F);

#[async_trait]
impl<F, Fut> Page for PageFn<F>
where
    F: Fn(RequestContext, Option<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ViewNode, RenderError>> + Send,
{
    async fn render(&self, req: &RequestContext, data: Option<Value>) -> Result<ViewNode, RenderError> {
        (self.0)(req.clone(), data).await
    }
}

/// A page without a data source, built from an async closure.
pub fn page_fn<F, Fut>(f: F) -> Handler
where
    F: Fn(RequestContext, Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ViewNode, RenderError>> + Send + 'static,
{
    Handler::Page(Arc::new(PageFn(f)))
}

struct LayoutFn<F>(F);

impl<F> Layout for LayoutFn<F>
where
    F: Fn(&RequestContext, ViewNode) -> ViewNode + Send + Sync,
{
    fn wrap(&self, req: &RequestContext, children: ViewNode) -> ViewNode {
        (self.0)(req, children)
    }
}

/// A layout built from a closure.
pub fn layout_fn<F>(f: F) -> Handler
where
    F: Fn(&RequestContext, ViewNode) -> ViewNode + Send + Sync + 'static,
{
    Handler::Layout(Arc::new(LayoutFn(f)))
}
