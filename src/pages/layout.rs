use crate::http::request::RequestContext;
use crate::render::ViewNode;
use crate::routing::Layout;

/// Site chrome around every page.
pub struct SiteLayout;

impl Layout for SiteLayout {
    fn wrap(&self, _req: &RequestContext, children: ViewNode) -> ViewNode {
        let link = |href: &str, label: &str| {
            ViewNode::element("a")
                .attr("href", href)
                .child(ViewNode::text(label))
        };
        ViewNode::fragment(vec![
            ViewNode::element("header").child(ViewNode::element("nav").children([
                link("/", "Home"),
                link("/about", "About"),
                link("/users/1", "Users"),
                link("/docs/getting-started", "Docs"),
            ])),
            ViewNode::element("main").child(children),
            ViewNode::element("footer").child(ViewNode::text("render-runtime")),
        ])
    }
}
