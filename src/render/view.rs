//! View tree handed to the render engine.
//!
//! Pages and layouts build a `ViewNode`; the pipeline never inspects it
//! beyond passing it to the engine.

/// A node of a view tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewNode {
    /// An element with attributes and children.
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
        children: Vec<ViewNode>,
    },
    /// Text content; escaped when serialized.
    Text(String),
    /// Pre-serialized markup emitted verbatim.
    Raw(String),
    /// Children without a wrapping element.
    Fragment(Vec<ViewNode>),
}

impl ViewNode {
    pub fn element(tag: impl Into<String>) -> Self {
        ViewNode::Element {
            tag: tag.into(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        ViewNode::Text(text.into())
    }

    pub fn raw(markup: impl Into<String>) -> Self {
        ViewNode::Raw(markup.into())
    }

    pub fn fragment(children: Vec<ViewNode>) -> Self {
        ViewNode::Fragment(children)
    }

    /// Add an attribute. No-op on anything but an element.
    pub fn attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        if let ViewNode::Element { attrs, .. } = &mut self {
            attrs.push((name.into(), value.into()));
        }
        self
    }

    /// Append a child. On text or raw nodes the two become a fragment.
    pub fn child(self, node: ViewNode) -> Self {
        match self {
            ViewNode::Element { tag, attrs, mut children } => {
                children.push(node);
                ViewNode::Element { tag, attrs, children }
            }
            ViewNode::Fragment(mut children) => {
                children.push(node);
                ViewNode::Fragment(children)
            }
            other => ViewNode::Fragment(vec![other, node]),
        }
    }

    pub fn children<I>(self, nodes: I) -> Self
    where
        I: IntoIterator<Item = ViewNode>,
    {
        nodes.into_iter().fold(self, ViewNode::child)
    }
}

impl From<&str> for ViewNode {
    fn from(text: &str) -> Self {
        ViewNode::text(text)
    }
}

impl From<String> for ViewNode {
    fn from(text: String) -> Self {
        ViewNode::Text(text)
    }
}
