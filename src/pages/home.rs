use async_trait::async_trait;
use serde_json::Value;

use crate::http::request::RequestContext;
use crate::render::{RenderError, ViewNode};
use crate::routing::Page;

pub struct HomePage;

#[async_trait]
impl Page for HomePage {
    async fn render(&self, _req: &RequestContext, _data: Option<Value>) -> Result<ViewNode, RenderError> {
        Ok(ViewNode::element("section").children([
            ViewNode::element("h1").child(ViewNode::text("Welcome")),
            ViewNode::element("p").child(ViewNode::text(
                "Pages are rendered on the server, streamed, and cached.",
            )),
        ]))
    }
}

pub struct AboutPage;

#[async_trait]
impl Page for AboutPage {
    async fn render(&self, _req: &RequestContext, _data: Option<Value>) -> Result<ViewNode, RenderError> {
        Ok(ViewNode::element("section").children([
            ViewNode::element("h1").child(ViewNode::text("About")),
            ViewNode::element("p").child(ViewNode::text(
                "This page lives in a route group and is served at /about.",
            )),
        ]))
    }
}
