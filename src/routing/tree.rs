//! Segment tree of registered routes.
//!
//! # Responsibilities
//! - Store page and layout handlers per node
//! - Match request paths with static > dynamic > catch-all precedence
//! - Collect the layout chain of a matched node
//! - Enumerate registered routes for preloading
//!
//! # Design Decisions
//! - Nodes live in an arena (`Vec<RouteNode>`) and refer to each other by index
//! - Children keep registration order, so the first registered dynamic child wins
//! - Matching backtracks; a failed branch unbinds the parameters it bound
//! - Catch-all nodes terminate matching and require a page

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, OnceLock};

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use crate::routing::handler::{Handler, Layout, Page};
use crate::routing::middleware::Middleware;
use crate::routing::segment::{parse_route, split_path, Segment, SegmentKind};
use crate::routing::RouteError;

/// Characters left as-is when building URLs from parameters.
const PARAM_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

type NodeId = usize;

const ROOT: NodeId = 0;

/// Registration options.
#[derive(Clone, Default)]
pub struct RouteOptions {
    /// Mark the final segment as a group. Only static segments qualify.
    pub group: bool,
    /// Middleware attached to the route's node, run after enclosing layouts' middleware.
    pub middleware: Vec<Arc<dyn Middleware>>,
}

impl RouteOptions {
    pub fn group() -> Self {
        Self {
            group: true,
            ..Self::default()
        }
    }

    pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middleware.push(middleware);
        self
    }
}

pub(crate) struct RouteNode {
    segment: Segment,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    child_index: HashMap<String, NodeId>,
    page: Option<Arc<dyn Page>>,
    layout: Option<Arc<dyn Layout>>,
    middleware: Vec<Arc<dyn Middleware>>,
    layout_chain: OnceLock<Vec<NodeId>>,
}

impl RouteNode {
    fn new(segment: Segment, parent: Option<NodeId>) -> Self {
        Self {
            segment,
            parent,
            children: Vec::new(),
            child_index: HashMap::new(),
            page: None,
            layout: None,
            middleware: Vec::new(),
            layout_chain: OnceLock::new(),
        }
    }

    fn kind(&self) -> SegmentKind {
        self.segment.kind
    }
}

/// A successful path match.
pub struct RouteMatch<'a> {
    tree: &'a RouteTree,
    node: NodeId,
    /// Bound parameters, percent-decoded.
    pub params: HashMap<String, String>,
}

impl<'a> RouteMatch<'a> {
    /// The page registered at the matched node.
    pub fn page(&self) -> Option<&'a Arc<dyn Page>> {
        self.tree.nodes[self.node].page.as_ref()
    }

    /// Layouts from the outermost (root) to the innermost (matched node).
    pub fn layouts(&self) -> Vec<&'a Arc<dyn Layout>> {
        self.tree
            .layout_chain(self.node)
            .iter()
            .filter_map(|&id| self.tree.nodes[id].layout.as_ref())
            .collect()
    }

    /// Middleware of the enclosing layouts (outermost first), then the
    /// matched node's own. Ancestors without a layout contribute nothing.
    pub fn middleware(&self) -> Vec<&'a Arc<dyn Middleware>> {
        let chain = self.tree.layout_chain(self.node);
        let mut nodes: Vec<NodeId> = chain.to_vec();
        if chain.last() != Some(&self.node) {
            nodes.push(self.node);
        }
        nodes
            .into_iter()
            .flat_map(|id| self.tree.nodes[id].middleware.iter())
            .collect()
    }

    /// Registered path of the matched node, e.g. `/users/[id]`.
    pub fn route_path(&self) -> String {
        self.tree.path_of(self.node)
    }
}

/// A registered page route, for enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteInfo {
    /// Registered path, group segments included.
    pub path: String,
    /// Dynamic and catch-all parameter names in order.
    pub params: Vec<String>,
    segments: Vec<Segment>,
}

impl RouteInfo {
    /// Whether the route needs no parameters.
    pub fn is_static(&self) -> bool {
        self.params.is_empty()
    }

    /// Whether `pattern` names this route. `:id` and `[id]` spellings are
    /// interchangeable and group segments may be left out.
    pub fn is_named_by(&self, pattern: &str) -> bool {
        let Ok(other) = parse_route(pattern) else {
            return false;
        };
        let visible = |segments: &[Segment]| -> Vec<(SegmentKind, String)> {
            segments
                .iter()
                .filter(|s| s.kind != SegmentKind::Group)
                .map(|s| (s.kind, s.param.clone().unwrap_or_else(|| s.raw.clone())))
                .collect()
        };
        visible(&self.segments) == visible(&other)
    }

    /// Build a concrete URL from parameter values. Group segments are
    /// dropped and values are percent-encoded. `None` if a parameter is missing.
    pub fn url_for(&self, values: &BTreeMap<String, String>) -> Option<String> {
        let mut url = String::new();
        for segment in &self.segments {
            match segment.kind {
                SegmentKind::Group => continue,
                SegmentKind::Static => {
                    url.push('/');
                    url.push_str(&segment.raw);
                }
                SegmentKind::Dynamic => {
                    let value = values.get(segment.param.as_deref()?)?;
                    url.push('/');
                    url.extend(utf8_percent_encode(value, PARAM_ENCODE));
                }
                SegmentKind::CatchAll => {
                    let value = values.get(segment.param.as_deref()?)?;
                    for part in value.split('/').filter(|p| !p.is_empty()) {
                        url.push('/');
                        url.extend(utf8_percent_encode(part, PARAM_ENCODE));
                    }
                }
            }
        }
        if url.is_empty() {
            url.push('/');
        }
        Some(url)
    }
}

/// Arena-backed route tree. Node 0 is the root.
pub struct RouteTree {
    nodes: Vec<RouteNode>,
}

impl RouteTree {
    pub fn new() -> Self {
        let root = Segment {
            raw: String::new(),
            kind: SegmentKind::Static,
            param: None,
        };
        Self {
            nodes: vec![RouteNode::new(root, None)],
        }
    }

    /// Register `handler` at `path`.
    pub fn insert(&mut self, path: &str, handler: Handler, options: RouteOptions) -> Result<(), RouteError> {
        let mut segments = parse_route(path)?;

        {
            let mut seen = HashSet::new();
            for param in segments.iter().filter_map(|s| s.param.as_deref()) {
                if !seen.insert(param) {
                    return Err(RouteError::DuplicateParam {
                        path: path.to_string(),
                        param: param.to_string(),
                    });
                }
            }
        }

        if options.group {
            if let Some(last) = segments.last_mut() {
                match last.kind {
                    SegmentKind::Static | SegmentKind::Group => last.kind = SegmentKind::Group,
                    _ => {
                        return Err(RouteError::InvalidGroup {
                            path: path.to_string(),
                            segment: last.raw.clone(),
                        })
                    }
                }
            }
        }

        let mut current = ROOT;
        for segment in segments {
            current = self.child_for(current, segment, path)?;
        }

        let node = &mut self.nodes[current];
        match handler {
            Handler::Page(page) => {
                if node.page.is_some() {
                    return Err(RouteError::DuplicateRoute(path.to_string()));
                }
                node.page = Some(page);
            }
            Handler::Layout(layout) => {
                if node.layout.is_some() {
                    return Err(RouteError::DuplicateLayout(path.to_string()));
                }
                node.layout = Some(layout);
            }
        }
        node.middleware.extend(options.middleware);

        // A new layout changes the chains of every node below it.
        for node in &mut self.nodes {
            node.layout_chain.take();
        }
        Ok(())
    }

    fn child_for(&mut self, parent: NodeId, segment: Segment, path: &str) -> Result<NodeId, RouteError> {
        if let Some(&existing) = self.nodes[parent].child_index.get(&segment.raw) {
            let node = &mut self.nodes[existing];
            let unused = node.children.is_empty() && node.page.is_none() && node.layout.is_none();
            match (node.kind(), segment.kind) {
                (a, b) if a == b => {}
                // A group registered through options is referenced by plain text afterwards.
                (SegmentKind::Group, SegmentKind::Static) => {}
                (SegmentKind::Static, SegmentKind::Group) if unused => {
                    node.segment.kind = SegmentKind::Group;
                }
                _ => {
                    return Err(RouteError::InvalidGroup {
                        path: path.to_string(),
                        segment: segment.raw,
                    })
                }
            }
            return Ok(existing);
        }

        if segment.kind == SegmentKind::CatchAll {
            // Groups are transparent, so siblings are counted from the nearest real level.
            let mut level = parent;
            while self.nodes[level].kind() == SegmentKind::Group {
                match self.nodes[level].parent {
                    Some(up) => level = up,
                    None => break,
                }
            }
            if let Some(other) = self
                .visible_children(level)
                .into_iter()
                .find(|&c| self.nodes[c].kind() == SegmentKind::CatchAll)
            {
                return Err(RouteError::MultipleCatchAll {
                    path: path.to_string(),
                    segment: segment.raw,
                    existing: self.nodes[other].segment.raw.clone(),
                });
            }
        }

        let id = self.nodes.len();
        let raw = segment.raw.clone();
        self.nodes.push(RouteNode::new(segment, Some(parent)));
        let parent_node = &mut self.nodes[parent];
        parent_node.children.push(id);
        parent_node.child_index.insert(raw, id);
        Ok(id)
    }

    /// Match a request path. Only nodes with a page can match.
    pub fn match_path(&self, pathname: &str) -> Option<RouteMatch<'_>> {
        let segments = split_path(pathname);
        let mut bound = Vec::new();
        let node = self.match_from(ROOT, &segments, 0, &mut bound)?;
        Some(RouteMatch {
            tree: self,
            node,
            params: bound.into_iter().collect(),
        })
    }

    fn match_from(
        &self,
        id: NodeId,
        segments: &[String],
        index: usize,
        bound: &mut Vec<(String, String)>,
    ) -> Option<NodeId> {
        if index == segments.len() {
            if self.nodes[id].page.is_some() {
                return Some(id);
            }
            return self.nodes[id]
                .children
                .iter()
                .filter(|&&c| self.nodes[c].kind() == SegmentKind::Group)
                .find_map(|&c| self.match_from(c, segments, index, bound));
        }

        let candidates = self.visible_children(id);
        let segment = &segments[index];

        for &child in &candidates {
            let node = &self.nodes[child];
            if node.kind() == SegmentKind::Static && node.segment.raw == *segment {
                if let Some(found) = self.match_from(child, segments, index + 1, bound) {
                    return Some(found);
                }
            }
        }

        for &child in &candidates {
            let node = &self.nodes[child];
            if node.kind() != SegmentKind::Dynamic {
                continue;
            }
            let Some(name) = node.segment.param.clone() else {
                continue;
            };
            bound.push((name, segment.clone()));
            if let Some(found) = self.match_from(child, segments, index + 1, bound) {
                return Some(found);
            }
            bound.pop();
        }

        for &child in &candidates {
            let node = &self.nodes[child];
            if node.kind() != SegmentKind::CatchAll || node.page.is_none() {
                continue;
            }
            if let Some(name) = node.segment.param.clone() {
                bound.push((name, segments[index..].join("/")));
                return Some(child);
            }
        }

        None
    }

    /// Children reachable from `id` at the next URL segment, seeing through groups.
    fn visible_children(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        for &child in &self.nodes[id].children {
            if self.nodes[child].kind() == SegmentKind::Group {
                out.extend(self.visible_children(child));
            } else {
                out.push(child);
            }
        }
        out
    }

    /// Nodes carrying a layout, outermost first, computed once per node.
    fn layout_chain(&self, id: NodeId) -> &[NodeId] {
        self.nodes[id].layout_chain.get_or_init(|| {
            let mut chain = Vec::new();
            let mut current = Some(id);
            while let Some(node) = current {
                if self.nodes[node].layout.is_some() {
                    chain.push(node);
                }
                current = self.nodes[node].parent;
            }
            chain.reverse();
            chain
        })
    }

    fn path_of(&self, id: NodeId) -> String {
        let mut parts = Vec::new();
        let mut current = Some(id);
        while let Some(node) = current {
            if node != ROOT {
                parts.push(self.nodes[node].segment.raw.as_str());
            }
            current = self.nodes[node].parent;
        }
        parts.reverse();
        format!("/{}", parts.join("/"))
    }

    /// Every node with a page, in registration order.
    pub fn routes(&self) -> Vec<RouteInfo> {
        let mut out = Vec::new();
        self.collect_routes(ROOT, &mut Vec::new(), &mut out);
        out
    }

    fn collect_routes(&self, id: NodeId, trail: &mut Vec<Segment>, out: &mut Vec<RouteInfo>) {
        let node = &self.nodes[id];
        if node.page.is_some() {
            let path = format!(
                "/{}",
                trail.iter().map(|s| s.raw.as_str()).collect::<Vec<_>>().join("/")
            );
            out.push(RouteInfo {
                path,
                params: trail.iter().filter_map(|s| s.param.clone()).collect(),
                segments: trail.clone(),
            });
        }
        for &child in &node.children {
            trail.push(self.nodes[child].segment.clone());
            self.collect_routes(child, trail, out);
            trail.pop();
        }
    }
}

impl Default for RouteTree {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::handler::{layout_fn, page_fn};
    use crate::routing::middleware::middleware_fn;
    use crate::render::ViewNode;

    fn page(label: &'static str) -> Handler {
        page_fn(move |_req, _data| async move { Ok(ViewNode::text(label)) })
    }

    fn tree(paths: &[&str]) -> RouteTree {
        let mut tree = RouteTree::new();
        for path in paths {
            tree.insert(path, page(""), RouteOptions::default()).unwrap();
        }
        tree
    }

    fn matched(tree: &RouteTree, path: &str) -> Option<(String, HashMap<String, String>)> {
        tree.match_path(path).map(|m| (m.route_path(), m.params))
    }

    #[test]
    fn test_static_beats_dynamic() {
        let tree = tree(&["/users/:id", "/users/new"]);
        let (route, params) = matched(&tree, "/users/new").unwrap();
        assert_eq!(route, "/users/new");
        assert!(params.is_empty());

        let (route, params) = matched(&tree, "/users/42").unwrap();
        assert_eq!(route, "/users/:id");
        assert_eq!(params["id"], "42");
    }

    #[test]
    fn test_first_registered_dynamic_child_wins() {
        let tree = tree(&["/items/:slug", "/items/[id]"]);
        let (route, params) = matched(&tree, "/items/7").unwrap();
        assert_eq!(route, "/items/:slug");
        assert_eq!(params["slug"], "7");
    }

    #[test]
    fn test_backtracks_from_static_branch() {
        let tree = tree(&["/a/b/c", "/a/:x/d"]);
        let (route, params) = matched(&tree, "/a/b/d").unwrap();
        assert_eq!(route, "/a/:x/d");
        assert_eq!(params["x"], "b");
    }

    #[test]
    fn test_failed_dynamic_branch_unbinds() {
        let tree = tree(&["/p/:a/x", "/p/*rest"]);
        let (route, params) = matched(&tree, "/p/1/y").unwrap();
        assert_eq!(route, "/p/*rest");
        assert_eq!(params.len(), 1);
        assert_eq!(params["rest"], "1/y");
    }

    #[test]
    fn test_catch_all_joins_remaining() {
        let tree = tree(&["/docs/[...slug]"]);
        let (_, params) = matched(&tree, "/docs/guide/intro/setup").unwrap();
        assert_eq!(params["slug"], "guide/intro/setup");
        assert!(matched(&tree, "/docs").is_none());
    }

    #[test]
    fn test_groups_are_transparent() {
        let tree = tree(&["/(marketing)/about", "/(legal)/privacy", "/(root)"]);
        assert_eq!(matched(&tree, "/about").unwrap().0, "/(marketing)/about");
        assert_eq!(matched(&tree, "/privacy").unwrap().0, "/(legal)/privacy");
        assert_eq!(matched(&tree, "/").unwrap().0, "/(root)");
        assert!(matched(&tree, "/marketing/about").is_none());
    }

    #[test]
    fn test_group_option_marks_last_segment() {
        let mut tree = RouteTree::new();
        tree.insert("/shop", layout_fn(|_, c| c), RouteOptions::group())
            .unwrap();
        tree.insert("/shop/cart", page(""), RouteOptions::default()).unwrap();
        assert_eq!(matched(&tree, "/cart").unwrap().0, "/shop/cart");
        assert!(matched(&tree, "/shop/cart").is_none());
    }

    #[test]
    fn test_params_are_decoded() {
        let tree = tree(&["/files/[name]"]);
        let (_, params) = matched(&tree, "/files/hello%20world").unwrap();
        assert_eq!(params["name"], "hello world");
    }

    #[test]
    fn test_layout_only_node_does_not_match() {
        let mut tree = RouteTree::new();
        tree.insert("/dash", layout_fn(|_, c| c), RouteOptions::default())
            .unwrap();
        assert!(tree.match_path("/dash").is_none());
    }

    #[test]
    fn test_registration_errors() {
        let mut tree = tree(&["/a"]);
        assert_eq!(
            tree.insert("/a", page(""), RouteOptions::default()).unwrap_err(),
            RouteError::DuplicateRoute("/a".into())
        );

        tree.insert("/a", layout_fn(|_, c| c), RouteOptions::default())
            .unwrap();
        assert_eq!(
            tree.insert("/a", layout_fn(|_, c| c), RouteOptions::default())
                .unwrap_err(),
            RouteError::DuplicateLayout("/a".into())
        );

        tree.insert("/f/*rest", page(""), RouteOptions::default()).unwrap();
        // Same catch-all again is a different handler kind, not a second catch-all.
        tree.insert("/f/*rest", layout_fn(|_, c| c), RouteOptions::default())
            .unwrap();
        assert!(matches!(
            tree.insert("/f/[...other]", page(""), RouteOptions::default()),
            Err(RouteError::MultipleCatchAll { .. })
        ));

        assert!(matches!(
            tree.insert("/u/:", page(""), RouteOptions::default()),
            Err(RouteError::MissingParamName { .. })
        ));

        assert_eq!(
            tree.insert("/a/:x/:x", page(""), RouteOptions::default())
                .unwrap_err(),
            RouteError::DuplicateParam {
                path: "/a/:x/:x".into(),
                param: "x".into(),
            }
        );
        assert!(matches!(
            tree.insert("/g/[id]/*id", page(""), RouteOptions::default()),
            Err(RouteError::DuplicateParam { .. })
        ));
    }

    #[test]
    fn test_one_catch_all_per_level_through_groups() {
        let mut grouped = tree(&["/(a)/*x"]);
        assert!(matches!(
            grouped.insert("/*y", page(""), RouteOptions::default()),
            Err(RouteError::MultipleCatchAll { .. })
        ));
        assert!(matches!(
            grouped.insert("/(b)/[...z]", page(""), RouteOptions::default()),
            Err(RouteError::MultipleCatchAll { .. })
        ));

        let mut nested = tree(&["/files/*rest"]);
        assert!(matches!(
            nested.insert("/files/(admin)/*other", page(""), RouteOptions::default()),
            Err(RouteError::MultipleCatchAll { .. })
        ));
        // Separate levels stay independent.
        nested.insert("/files/x/*deeper", page(""), RouteOptions::default())
            .unwrap();
    }

    #[test]
    fn test_middleware_comes_from_layouts_and_route() {
        let stop = || middleware_fn(|_req, _next| async { Ok(None) });
        let mut tree = RouteTree::new();
        tree.insert("/users", page("list"), RouteOptions::default().with_middleware(stop()))
            .unwrap();
        tree.insert("/users/:id", page("user"), RouteOptions::default().with_middleware(stop()))
            .unwrap();

        // `/users` is a page, not a layout, so its guard stays on `/users`.
        assert_eq!(tree.match_path("/users/1").unwrap().middleware().len(), 1);
        assert_eq!(tree.match_path("/users").unwrap().middleware().len(), 1);

        tree.insert("/users", layout_fn(|_, c| c), RouteOptions::default())
            .unwrap();
        assert_eq!(tree.match_path("/users/1").unwrap().middleware().len(), 2);
        // The matched node's own middleware is not run twice when it is also a layout.
        assert_eq!(tree.match_path("/users").unwrap().middleware().len(), 1);
    }

    #[test]
    fn test_layout_chain_outermost_first() {
        let mut tree = RouteTree::new();
        tree.insert("/", layout_fn(|_, c| ViewNode::element("root").child(c)), RouteOptions::default())
            .unwrap();
        tree.insert("/users", layout_fn(|_, c| ViewNode::element("users").child(c)), RouteOptions::default())
            .unwrap();
        tree.insert("/users/:id", page("leaf"), RouteOptions::default()).unwrap();

        let m = tree.match_path("/users/7").unwrap();
        let req = crate::http::request::RequestContext::get("/users/7").unwrap();
        let tags: Vec<_> = m
            .layouts()
            .iter()
            .map(|l| match l.wrap(&req, ViewNode::text("")) {
                ViewNode::Element { tag, .. } => tag,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(tags, vec!["root", "users"]);
    }

    #[test]
    fn test_routes_enumeration_and_urls() {
        let tree = tree(&["/", "/about", "/users/[id]", "/(legal)/privacy", "/docs/[...slug]"]);
        let routes = tree.routes();
        let paths: Vec<_> = routes.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["/", "/about", "/users/[id]", "/(legal)/privacy", "/docs/[...slug]"]);

        let privacy = &routes[3];
        assert!(privacy.is_static());
        assert_eq!(privacy.url_for(&BTreeMap::new()).unwrap(), "/privacy");

        let user = &routes[2];
        assert_eq!(user.params, vec!["id"]);
        assert!(user.url_for(&BTreeMap::new()).is_none());
        let values = BTreeMap::from([("id".to_string(), "a b".to_string())]);
        assert_eq!(user.url_for(&values).unwrap(), "/users/a%20b");

        let docs = &routes[4];
        let values = BTreeMap::from([("slug".to_string(), "guide/intro".to_string())]);
        assert_eq!(docs.url_for(&values).unwrap(), "/docs/guide/intro");

        assert!(user.is_named_by("/users/:id"));
        assert!(user.is_named_by("/users/[id]"));
        assert!(!user.is_named_by("/users/:name"));
        assert!(privacy.is_named_by("/privacy"));
        assert!(docs.is_named_by("/docs/*slug"));
        assert!(!docs.is_named_by("/docs/[slug]"));
    }
}
