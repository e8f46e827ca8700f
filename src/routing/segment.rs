//! Route path syntax.
//!
//! # Syntax
//! - `(name)`            group: structures the tree, consumes no URL segment
//! - `:name`, `[name]`   dynamic: binds one URL segment to `name`
//! - `*name`, `[...name]` catch-all: binds the remaining segments, joined by `/`
//! - anything else       static literal
//!
//! # Design Decisions
//! - Children are keyed by raw segment text, so `:id` and `[id]` are distinct nodes
//! - Empty parameter names are rejected at registration time

use percent_encoding::percent_decode_str;

use crate::routing::RouteError;

/// What a route segment matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    Static,
    Dynamic,
    CatchAll,
    Group,
}

/// One parsed segment of a registered route path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Raw text as registered, e.g. `[...slug]`.
    pub raw: String,
    pub kind: SegmentKind,
    /// Parameter bound by dynamic and catch-all segments.
    pub param: Option<String>,
}

impl Segment {
    /// Parse a single segment of `path` (used only for error messages).
    pub fn parse(raw: &str, path: &str) -> Result<Self, RouteError> {
        let (kind, param) = if raw.starts_with('(') && raw.ends_with(')') && raw.len() >= 2 {
            if raw.len() == 2 {
                return Err(RouteError::InvalidGroup {
                    path: path.to_string(),
                    segment: raw.to_string(),
                });
            }
            (SegmentKind::Group, None)
        } else if let Some(name) = raw.strip_prefix('*') {
            (SegmentKind::CatchAll, Some(name))
        } else if let Some(name) = raw.strip_prefix(':') {
            (SegmentKind::Dynamic, Some(name))
        } else if raw.starts_with('[') && raw.ends_with(']') && raw.len() >= 2 {
            let inner = &raw[1..raw.len() - 1];
            match inner.strip_prefix("...") {
                Some(name) => (SegmentKind::CatchAll, Some(name)),
                None => (SegmentKind::Dynamic, Some(inner)),
            }
        } else {
            (SegmentKind::Static, None)
        };

        if let Some(name) = param {
            if name.is_empty() {
                return Err(RouteError::MissingParamName {
                    path: path.to_string(),
                    segment: raw.to_string(),
                });
            }
        }

        Ok(Self {
            raw: raw.to_string(),
            kind,
            param: param.map(str::to_string),
        })
    }
}

/// Split a registered route path into parsed segments.
pub fn parse_route(path: &str) -> Result<Vec<Segment>, RouteError> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| Segment::parse(s, path))
        .collect()
}

/// Split a request path into percent-decoded segments. `/` yields none.
pub fn split_path(pathname: &str) -> Vec<String> {
    pathname
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
        .collect()
}
