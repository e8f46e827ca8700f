//! Render engines turn a view tree into a byte stream.
//!
//! # Design Decisions
//! - The engine is a trait object so applications can plug in their own
//! - `HtmlEngine` serializes lazily and yields chunks of roughly `chunk_size` bytes

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream, StreamExt};

use crate::render::document::escape_into;
use crate::render::{RenderError, ViewNode};

/// Rendered output, chunk by chunk.
pub type ByteStream = BoxStream<'static, Result<Bytes, RenderError>>;

#[async_trait]
pub trait RenderEngine: Send + Sync {
    async fn render_tree(&self, view: ViewNode) -> Result<ByteStream, RenderError>;
}

/// Elements that never have a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "track",
    "wbr",
];

/// Streams a view tree as HTML.
#[derive(Debug, Clone)]
pub struct HtmlEngine {
    chunk_size: usize,
}

impl HtmlEngine {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }
}

impl Default for HtmlEngine {
    fn default() -> Self {
        Self::new(8 * 1024)
    }
}

#[async_trait]
impl RenderEngine for HtmlEngine {
    async fn render_tree(&self, view: ViewNode) -> Result<ByteStream, RenderError> {
        let mut walker = Walker {
            stack: vec![Work::Open(view)],
            chunk_size: self.chunk_size,
        };
        Ok(stream::iter(std::iter::from_fn(move || walker.next_chunk()))
            .map(Ok)
            .boxed())
    }
}

enum Work {
    Open(ViewNode),
    Close(String),
}

struct Walker {
    stack: Vec<Work>,
    chunk_size: usize,
}

impl Walker {
    fn next_chunk(&mut self) -> Option<Bytes> {
        let mut buf = String::new();
        while let Some(work) = self.stack.pop() {
            match work {
                Work::Close(tag) => {
                    buf.push_str("</");
                    buf.push_str(&tag);
                    buf.push('>');
                }
                Work::Open(ViewNode::Text(text)) => escape_into(&mut buf, &text),
                Work::Open(ViewNode::Raw(markup)) => buf.push_str(&markup),
                Work::Open(ViewNode::Fragment(children)) => {
                    self.stack.extend(children.into_iter().rev().map(Work::Open));
                }
                Work::Open(ViewNode::Element { tag, attrs, children }) => {
                    buf.push('<');
                    buf.push_str(&tag);
                    for (name, value) in &attrs {
                        buf.push(' ');
                        buf.push_str(name);
                        buf.push_str("=\"");
                        escape_into(&mut buf, value);
                        buf.push('"');
                    }
                    buf.push('>');
                    if !VOID_ELEMENTS.contains(&tag.as_str()) {
                        self.stack.push(Work::Close(tag));
                        self.stack.extend(children.into_iter().rev().map(Work::Open));
                    }
                }
            }
            if buf.len() >= self.chunk_size {
                break;
            }
        }
        (!buf.is_empty()).then(|| Bytes::from(buf))
    }
}
