//! HTML document envelope.
//!
//! # Responsibilities
//! - Build the fixed head (doctype, title, stylesheet, public env, root container)
//! - Build the fixed tail closing the container and document
//! - Wrap cached payloads and live streams in head and tail
//! - Render the escaped 500 error page
//!
//! # Design Decisions
//! - Head and tail are built once at startup and shared as `Bytes`
//! - Public environment is embedded as JSON with `<` escaped, so it cannot close the script
//! - A failed live stream is cut short but the tail is still sent

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::future::ready;

use axum::body::Body;
use axum::http::{Response, StatusCode};
use bytes::{Bytes, BytesMut};
use futures_util::stream::{self, StreamExt};

use crate::config::DocumentConfig;
use crate::http::response;
use crate::render::tee::StreamToken;

const TAIL: &str = "</div></body></html>";

/// Head and tail wrapped around every page body.
#[derive(Debug, Clone)]
pub struct Document {
    head: Bytes,
    tail: Bytes,
}

impl Document {
    /// Build the envelope, embedding the given public environment.
    pub fn new(config: &DocumentConfig, public_env: &BTreeMap<String, String>) -> Self {
        let mut head = String::from("<!DOCTYPE html><html><head><meta charset=\"utf-8\">");
        head.push_str("<title>");
        escape_into(&mut head, &config.title);
        head.push_str("</title>");
        if let Some(href) = &config.stylesheet {
            head.push_str("<link rel=\"stylesheet\" href=\"");
            escape_into(&mut head, href);
            head.push_str("\">");
        }
        // A map of strings always serializes.
        let env = serde_json::to_string(public_env).unwrap_or_else(|_| "{}".to_string());
        head.push_str("<script>window.__APP_ENV__ = ");
        head.push_str(&env.replace('<', "\\u003c"));
        head.push_str(";</script></head><body><div id=\"root\">");

        Self {
            head: Bytes::from(head),
            tail: Bytes::from_static(TAIL.as_bytes()),
        }
    }

    /// Build the envelope from process environment variables carrying the configured prefix.
    pub fn from_env(config: &DocumentConfig) -> Self {
        let public_env = public_env(std::env::vars(), &config.public_env_prefix);
        tracing::debug!(count = public_env.len(), "Public environment collected");
        Self::new(config, &public_env)
    }

    pub fn head(&self) -> &Bytes {
        &self.head
    }

    pub fn tail(&self) -> &Bytes {
        &self.tail
    }

    /// A complete document around a cached payload.
    pub fn wrap_payload(&self, payload: &Bytes) -> Body {
        let mut buf = BytesMut::with_capacity(self.head.len() + payload.len() + self.tail.len());
        buf.extend_from_slice(&self.head);
        buf.extend_from_slice(payload);
        buf.extend_from_slice(&self.tail);
        Body::from(buf.freeze())
    }

    /// A streaming document: head, the already-received first chunk, the rest
    /// of the live branch, then tail.
    pub fn wrap_stream(&self, first: Option<Bytes>, rest: StreamToken) -> Body {
        let head = stream::once(ready(self.head.clone()));
        let first = stream::iter(first);
        let rest = rest.scan((), |_, item| {
            ready(match item {
                Ok(chunk) => Some(chunk),
                Err(e) => {
                    tracing::warn!(error = %e, "Render stream failed mid-response; closing document");
                    None
                }
            })
        });
        let tail = stream::once(ready(self.tail.clone()));

        Body::from_stream(
            head.chain(first)
                .chain(rest)
                .chain(tail)
                .map(Ok::<Bytes, Infallible>),
        )
    }
}

/// Variables whose name starts with `prefix`.
pub fn public_env<I>(vars: I, prefix: &str) -> BTreeMap<String, String>
where
    I: IntoIterator<Item = (String, String)>,
{
    vars.into_iter()
        .filter(|(name, _)| name.starts_with(prefix))
        .collect()
}

/// 500 page showing `message`, escaped.
pub fn error_page(message: &str) -> Response<Body> {
    let mut page = String::from(
        "<!DOCTYPE html><html><body><h1>500 - Server Error</h1><pre>",
    );
    escape_into(&mut page, message);
    page.push_str("</pre></body></html>");
    response::html(StatusCode::INTERNAL_SERVER_ERROR, Body::from(page))
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    escape_into(&mut out, text);
    out
}

pub fn escape_into(out: &mut String, text: &str) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
}
