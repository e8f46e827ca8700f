use async_trait::async_trait;
use serde_json::Value;

use crate::http::request::RequestContext;
use crate::render::{RenderError, ViewNode};
use crate::routing::Page;

/// Documentation at any depth under `/docs`.
pub struct DocsPage;

#[async_trait]
impl Page for DocsPage {
    async fn render(&self, req: &RequestContext, _data: Option<Value>) -> Result<ViewNode, RenderError> {
        let slug = req.param("slug").unwrap_or_default();
        let crumbs = slug
            .split('/')
            .map(|part| ViewNode::element("li").child(ViewNode::text(part)));

        Ok(ViewNode::element("article").children([
            ViewNode::element("h1").child(ViewNode::text(format!("Docs: {}", slug))),
            ViewNode::element("ol").attr("class", "breadcrumbs").children(crumbs),
        ]))
    }
}
