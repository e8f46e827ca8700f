//! Streaming render pipeline.
//!
//! # Responsibilities
//! - Serve cached pages, answering matching `If-None-Match` with 304
//! - Render misses: server data, page handler, layouts, engine
//! - Stream the live branch to the client inside the document envelope
//! - Fill the response cache from the cache branch in the background
//! - Turn failures before the first byte into an escaped 500 page
//!
//! # Design Decisions
//! - Server data and the layout chain are resolved concurrently
//! - Server data errors always degrade to "no data"; timeouts follow the configured policy
//! - The first chunk is awaited before the response is committed, so engine
//!   failures on the first chunk still produce a well-formed 500
//! - ETag is only sent for cached payloads; fresh renders have no stable validator yet

use std::sync::Arc;
use std::time::Instant;

use axum::body::Body;
use axum::http::{header, HeaderValue, Method, Response, StatusCode};
use bytes::{Bytes, BytesMut};
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::cache::{cache_key, CachedPayload, ResponseCache};
use crate::config::{DataTimeoutPolicy, RenderConfig, TimeoutConfig};
use crate::http::request::RequestContext;
use crate::http::response::{self, X_RENDER_CACHE};
use crate::observability::metrics;
use crate::render::document::{error_page, Document};
use crate::render::engine::RenderEngine;
use crate::render::tee::{tee, StreamToken, Tee};
use crate::render::RenderError;
use crate::resilience::timeouts::{with_deadline, TimeoutError};
use crate::routing::handler::Page;
use crate::routing::tree::RouteMatch;

const DEFAULT_CACHE_CONTROL: &str = "public, max-age=3600, stale-while-revalidate=59";

/// A response plus the background cache fill it started, if any.
pub struct Rendered {
    pub response: Response<Body>,
    pub cache_fill: Option<JoinHandle<()>>,
}

impl Rendered {
    pub fn immediate(response: Response<Body>) -> Self {
        Self {
            response,
            cache_fill: None,
        }
    }
}

/// Renders matched routes through the cache, the engine and the tee.
pub struct RenderPipeline {
    cache: Arc<ResponseCache>,
    engine: Arc<dyn RenderEngine>,
    document: Document,
    timeouts: TimeoutConfig,
    render: RenderConfig,
    cache_control: HeaderValue,
}

impl RenderPipeline {
    pub fn new(
        cache: Arc<ResponseCache>,
        engine: Arc<dyn RenderEngine>,
        document: Document,
        timeouts: &TimeoutConfig,
        render: &RenderConfig,
    ) -> Self {
        let cache_control = HeaderValue::from_str(&render.cache_control).unwrap_or_else(|_| {
            tracing::warn!(
                value = %render.cache_control,
                "Invalid Cache-Control value; using default"
            );
            HeaderValue::from_static(DEFAULT_CACHE_CONTROL)
        });
        Self {
            cache,
            engine,
            document,
            timeouts: timeouts.clone(),
            render: render.clone(),
            cache_control,
        }
    }

    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Render a matched route. Never fails; failures become error responses.
    pub async fn render(&self, matched: &RouteMatch<'_>, req: &RequestContext) -> Rendered {
        let start = Instant::now();
        // HEAD shares GET's entry; the transport drops the body.
        let method = if req.method == Method::HEAD {
            Method::GET.as_str()
        } else {
            req.method.as_str()
        };
        let key = cache_key(method, &req.path, req.query.as_deref());

        if let Some(payload) = self.cache.get(&key) {
            return Rendered::immediate(self.serve_cached(req, &payload, start));
        }

        // Taken before rendering, so an invalidation during the render wins.
        let ticket = self.cache.begin_fill(&key);
        match self.render_fresh(matched, req).await {
            Ok((first, branches)) => {
                let Tee { live, cache, .. } = branches;
                let fill = spawn_cache_fill(self.cache.clone(), key, ticket, cache);
                let response = self.stream_response(first, live);
                metrics::record_render("miss", start);
                Rendered {
                    response,
                    cache_fill: Some(fill),
                }
            }
            Err(e) => {
                self.cache.cancel_fill(&key, ticket);
                tracing::error!(
                    request_id = req.id(),
                    path = %req.path,
                    route = %matched.route_path(),
                    error = %e,
                    "Render failed"
                );
                metrics::record_render("error", start);
                Rendered::immediate(error_page(&e.to_string()))
            }
        }
    }

    fn serve_cached(&self, req: &RequestContext, payload: &CachedPayload, start: Instant) -> Response<Body> {
        let etag = HeaderValue::from_str(&payload.etag).ok();

        if req
            .if_none_match()
            .is_some_and(|tags| etag_matches(tags, &payload.etag))
        {
            metrics::record_render("not_modified", start);
            let mut response = response::with_status(StatusCode::NOT_MODIFIED, Body::empty());
            if let Some(etag) = etag {
                response.headers_mut().insert(header::ETAG, etag);
            }
            return response;
        }

        metrics::record_render("hit", start);
        let mut response = response::html(StatusCode::OK, self.document.wrap_payload(&payload.body));
        let headers = response.headers_mut();
        headers.insert(header::CACHE_CONTROL, self.cache_control.clone());
        headers.insert(X_RENDER_CACHE, HeaderValue::from_static("hit"));
        if let Some(etag) = etag {
            headers.insert(header::ETAG, etag);
        }
        response
    }

    fn stream_response(&self, first: Option<Bytes>, live: StreamToken) -> Response<Body> {
        let mut response = response::html(StatusCode::OK, self.document.wrap_stream(first, live));
        let headers = response.headers_mut();
        headers.insert(header::CACHE_CONTROL, self.cache_control.clone());
        headers.insert(X_RENDER_CACHE, HeaderValue::from_static("miss"));
        response
    }

    /// Produce the view, start the engine and wait for its first chunk.
    async fn render_fresh(
        &self,
        matched: &RouteMatch<'_>,
        req: &RequestContext,
    ) -> Result<(Option<Bytes>, Tee), RenderError> {
        let page = matched
            .page()
            .ok_or_else(|| RenderError::Handler("route has no page".to_string()))?;

        let (data, layouts) = tokio::join!(self.server_data(page.as_ref(), req), async {
            matched.layouts()
        });
        let data = data?;

        let limit = self.timeouts.render();
        let mut view = with_deadline("page handler", limit, page.render(req, data)).await??;
        for layout in layouts.iter().rev() {
            view = layout.wrap(req, view);
        }

        let started = Instant::now();
        let stream = with_deadline("render engine", limit, self.engine.render_tree(view)).await??;
        let mut branches = tee(
            stream,
            self.render.live_buffer_chunks,
            self.cache.max_payload_bytes(),
        );

        let remaining = limit.saturating_sub(started.elapsed());
        let first = match tokio::time::timeout(remaining, branches.live.next_chunk()).await {
            Ok(Some(Ok(chunk))) => Some(chunk),
            Ok(None) => None,
            Ok(Some(Err(e))) => {
                branches.producer.abort();
                return Err(e);
            }
            Err(_) => {
                branches.producer.abort();
                return Err(TimeoutError {
                    operation: "render engine",
                    after: limit,
                }
                .into());
            }
        };
        Ok((first, branches))
    }

    async fn server_data(&self, page: &dyn Page, req: &RequestContext) -> Result<Option<Value>, RenderError> {
        let limit = self.timeouts.server_data();
        match with_deadline("server data", limit, page.server_data(req)).await {
            Ok(Ok(data)) => Ok(data),
            Ok(Err(e)) => {
                tracing::warn!(request_id = req.id(), path = %req.path, error = %e, "Server data failed; rendering without it");
                Ok(None)
            }
            Err(timeout) => match self.render.on_data_timeout {
                DataTimeoutPolicy::Fail => Err(timeout.into()),
                DataTimeoutPolicy::Degrade => {
                    tracing::warn!(request_id = req.id(), path = %req.path, error = %timeout, "Server data timed out; rendering without it");
                    Ok(None)
                }
            },
        }
    }
}

/// Whether an `If-None-Match` value names `etag`.
///
/// Each comma-separated entry is compared byte-for-byte after trimming.
/// Weak tags (`W/"..."`) and `*` never match; those requests get the full page.
fn etag_matches(header_value: &str, etag: &str) -> bool {
    header_value.split(',').any(|tag| tag.trim() == etag)
}

/// Drain the cache branch and store the payload if it completes within bounds
/// and its key was not invalidated in the meantime.
fn spawn_cache_fill(
    cache: Arc<ResponseCache>,
    key: String,
    ticket: u64,
    mut branch: StreamToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = BytesMut::new();
        while let Some(item) = branch.next_chunk().await {
            match item {
                Ok(chunk) => buf.extend_from_slice(&chunk),
                Err(RenderError::PayloadTooLarge { limit }) => {
                    tracing::debug!(key = %key, limit, "Payload too large; not caching");
                    metrics::record_cache_fill_abandoned("too_large");
                    cache.cancel_fill(&key, ticket);
                    return;
                }
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Render stream failed; not caching");
                    metrics::record_cache_fill_abandoned("stream_error");
                    cache.cancel_fill(&key, ticket);
                    return;
                }
            }
        }

        if buf.len() < cache.min_payload_bytes() {
            tracing::debug!(key = %key, bytes = buf.len(), "Payload below minimum size; not caching");
            metrics::record_cache_fill_abandoned("too_small");
            cache.cancel_fill(&key, ticket);
            return;
        }

        let bytes = buf.len();
        if !cache.complete_fill(&key, ticket, CachedPayload::new(buf.freeze())) {
            tracing::debug!(key = %key, "Key invalidated during render; not caching");
            metrics::record_cache_fill_abandoned("invalidated");
            return;
        }
        metrics::record_cache_fill(bytes);
        tracing::debug!(key = %key, bytes, "Cache filled");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheConfig, DocumentConfig};
    use crate::render::engine::{ByteStream, HtmlEngine};
    use crate::render::ViewNode;
    use crate::routing::handler::page_fn;
    use crate::routing::tree::{RouteOptions, RouteTree};
    use async_trait::async_trait;
    use futures_util::stream::{self, StreamExt};
    use http_body_util::BodyExt;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn pipeline_with(engine: Arc<dyn RenderEngine>, render: RenderConfig, timeouts: TimeoutConfig) -> RenderPipeline {
        let cache = Arc::new(ResponseCache::new(&CacheConfig::default()));
        let document = Document::new(&DocumentConfig::default(), &BTreeMap::new());
        RenderPipeline::new(cache, engine, document, &timeouts, &render)
    }

    fn pipeline() -> RenderPipeline {
        pipeline_with(
            Arc::new(HtmlEngine::default()),
            RenderConfig::default(),
            TimeoutConfig::default(),
        )
    }

    fn counting_tree(calls: Arc<AtomicUsize>) -> RouteTree {
        let mut tree = RouteTree::new();
        tree.insert(
            "/hello/:name",
            page_fn(move |req, _data| {
                let calls = calls.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    let name = req.param("name").unwrap_or("?").to_string();
                    Ok(ViewNode::element("p").child(ViewNode::text(name)))
                }
            }),
            RouteOptions::default(),
        )
        .unwrap();
        tree
    }

    fn request<'a>(tree: &'a RouteTree, path: &str) -> (RouteMatch<'a>, RequestContext) {
        let matched = tree.match_path(path).unwrap();
        let mut req = RequestContext::get(path).unwrap();
        req.params = matched.params.clone();
        (matched, req)
    }

    async fn body_text(response: Response<Body>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let calls = Arc::new(AtomicUsize::new(0));
        let tree = counting_tree(calls.clone());
        let pipeline = pipeline();

        let (matched, req) = request(&tree, "/hello/ada");
        let first = pipeline.render(&matched, &req).await;
        assert_eq!(first.response.headers()[X_RENDER_CACHE], "miss");
        assert!(first.response.headers().get(header::ETAG).is_none());
        let miss_body = body_text(first.response).await;
        first.cache_fill.unwrap().await.unwrap();

        let second = pipeline.render(&matched, &req).await;
        assert!(second.cache_fill.is_none());
        let headers = second.response.headers().clone();
        assert_eq!(headers[X_RENDER_CACHE], "hit");
        assert!(headers[header::ETAG].to_str().unwrap().starts_with("\"v1-"));
        assert_eq!(body_text(second.response).await, miss_body);
        assert!(miss_body.contains("<div id=\"root\"><p>ada</p></div>"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_invalidation_during_render_is_not_undone_by_fill() {
        let calls = Arc::new(AtomicUsize::new(0));
        let tree = counting_tree(calls.clone());
        let pipeline = pipeline();
        let (matched, req) = request(&tree, "/hello/eve");

        let rendered = pipeline.render(&matched, &req).await;
        pipeline.cache().invalidate_route("/hello/eve");
        rendered.cache_fill.unwrap().await.unwrap();
        assert!(pipeline.cache().is_empty());

        let again = pipeline.render(&matched, &req).await;
        assert_eq!(again.response.headers()[X_RENDER_CACHE], "miss");
        again.cache_fill.unwrap().await.unwrap();
        assert_eq!(pipeline.cache().len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_if_none_match_returns_304() {
        let tree = counting_tree(Arc::new(AtomicUsize::new(0)));
        let pipeline = pipeline();
        let (matched, mut req) = request(&tree, "/hello/bob");

        let first = pipeline.render(&matched, &req).await;
        first.cache_fill.unwrap().await.unwrap();
        let hit = pipeline.render(&matched, &req).await;
        let etag = hit.response.headers()[header::ETAG].clone();

        req.headers.insert(header::IF_NONE_MATCH, etag.clone());
        let revalidated = pipeline.render(&matched, &req).await;
        assert_eq!(revalidated.response.status(), StatusCode::NOT_MODIFIED);
        assert_eq!(revalidated.response.headers()[header::ETAG], etag);
        assert!(body_text(revalidated.response).await.is_empty());
    }

    #[tokio::test]
    async fn test_query_string_is_part_of_key() {
        let calls = Arc::new(AtomicUsize::new(0));
        let tree = counting_tree(calls.clone());
        let pipeline = pipeline();

        for path in ["/hello/x?a=1", "/hello/x?a=2"] {
            let (matched, req) = request(&tree, path.split('?').next().unwrap());
            let req = RequestContext {
                query: path.split_once('?').map(|(_, q)| q.to_string()),
                ..req
            };
            let rendered = pipeline.render(&matched, &req).await;
            rendered.cache_fill.unwrap().await.unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(pipeline.cache().len(), 2);
    }

    #[tokio::test]
    async fn test_handler_error_is_escaped_500() {
        let mut tree = RouteTree::new();
        tree.insert(
            "/broken",
            page_fn(|_req, _data| async { Err(RenderError::Handler("<oops>".into())) }),
            RouteOptions::default(),
        )
        .unwrap();
        let pipeline = pipeline();
        let (matched, req) = request(&tree, "/broken");

        let rendered = pipeline.render(&matched, &req).await;
        assert!(rendered.cache_fill.is_none());
        assert_eq!(rendered.response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_text(rendered.response).await;
        assert!(body.contains("page handler failed: &lt;oops&gt;"));
        assert!(pipeline.cache().is_empty());
    }

    struct SlowData;

    #[async_trait]
    impl Page for SlowData {
        async fn server_data(&self, _req: &RequestContext) -> Result<Option<Value>, RenderError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Some(Value::Bool(true)))
        }

        async fn render(&self, _req: &RequestContext, data: Option<Value>) -> Result<ViewNode, RenderError> {
            Ok(ViewNode::text(format!("data={}", data.is_some())))
        }
    }

    fn slow_tree() -> RouteTree {
        let mut tree = RouteTree::new();
        tree.insert("/slow", crate::routing::Handler::Page(Arc::new(SlowData)), RouteOptions::default())
            .unwrap();
        tree
    }

    fn short_timeouts() -> TimeoutConfig {
        TimeoutConfig {
            server_data_ms: 30,
            render_ms: 100,
            ..TimeoutConfig::default()
        }
    }

    #[tokio::test]
    async fn test_data_timeout_degrades() {
        let tree = slow_tree();
        let pipeline = pipeline_with(Arc::new(HtmlEngine::default()), RenderConfig::default(), short_timeouts());
        let (matched, req) = request(&tree, "/slow");

        let rendered = pipeline.render(&matched, &req).await;
        assert_eq!(rendered.response.status(), StatusCode::OK);
        assert!(body_text(rendered.response).await.contains("data=false"));
    }

    #[tokio::test]
    async fn test_data_timeout_fails_when_configured() {
        let tree = slow_tree();
        let render = RenderConfig {
            on_data_timeout: DataTimeoutPolicy::Fail,
            ..RenderConfig::default()
        };
        let pipeline = pipeline_with(Arc::new(HtmlEngine::default()), render, short_timeouts());
        let (matched, req) = request(&tree, "/slow");

        let rendered = pipeline.render(&matched, &req).await;
        assert_eq!(rendered.response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(rendered.response)
            .await
            .contains("server data timed out after 30ms"));
    }

    /// Emits one chunk, then fails.
    struct FlakyEngine;

    #[async_trait]
    impl RenderEngine for FlakyEngine {
        async fn render_tree(&self, _view: ViewNode) -> Result<ByteStream, RenderError> {
            Ok(stream::iter(vec![
                Ok(Bytes::from_static(b"<p>partial")),
                Err(RenderError::Engine("lost connection".into())),
            ])
            .boxed())
        }
    }

    /// Never produces a chunk.
    struct StuckEngine;

    #[async_trait]
    impl RenderEngine for StuckEngine {
        async fn render_tree(&self, _view: ViewNode) -> Result<ByteStream, RenderError> {
            Ok(stream::pending().boxed())
        }
    }

    #[tokio::test]
    async fn test_mid_stream_failure_closes_document_and_skips_cache() {
        let tree = counting_tree(Arc::new(AtomicUsize::new(0)));
        let pipeline = pipeline_with(Arc::new(FlakyEngine), RenderConfig::default(), TimeoutConfig::default());
        let (matched, req) = request(&tree, "/hello/x");

        let rendered = pipeline.render(&matched, &req).await;
        assert_eq!(rendered.response.status(), StatusCode::OK);
        let body = body_text(rendered.response).await;
        assert!(body.contains("<p>partial"));
        assert!(body.ends_with("</div></body></html>"));
        rendered.cache_fill.unwrap().await.unwrap();
        assert!(pipeline.cache().is_empty());
    }

    #[tokio::test]
    async fn test_engine_without_output_times_out() {
        let tree = counting_tree(Arc::new(AtomicUsize::new(0)));
        let pipeline = pipeline_with(Arc::new(StuckEngine), RenderConfig::default(), short_timeouts());
        let (matched, req) = request(&tree, "/hello/x");

        let rendered = pipeline.render(&matched, &req).await;
        assert_eq!(rendered.response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body_text(rendered.response)
            .await
            .contains("render engine timed out after 100ms"));
    }

    #[tokio::test]
    async fn test_oversized_payload_is_streamed_not_cached() {
        let tree = counting_tree(Arc::new(AtomicUsize::new(0)));
        let cache = Arc::new(ResponseCache::new(&CacheConfig {
            max_payload_bytes: 4,
            ..CacheConfig::default()
        }));
        let pipeline = RenderPipeline::new(
            cache,
            Arc::new(HtmlEngine::default()),
            Document::new(&DocumentConfig::default(), &BTreeMap::new()),
            &TimeoutConfig::default(),
            &RenderConfig::default(),
        );
        let (matched, req) = request(&tree, "/hello/someone");

        let rendered = pipeline.render(&matched, &req).await;
        assert!(body_text(rendered.response).await.contains("<p>someone</p>"));
        rendered.cache_fill.unwrap().await.unwrap();
        assert!(pipeline.cache().is_empty());
    }

    #[test]
    fn test_etag_matching() {
        assert!(etag_matches("\"v1-3-9\"", "\"v1-3-9\""));
        assert!(etag_matches("\"a\", \"v1-3-9\"", "\"v1-3-9\""));
        assert!(!etag_matches("\"v1-3-8\"", "\"v1-3-9\""));
        // Weak tags, wildcards and unquoted values are not treated as matches.
        assert!(!etag_matches("W/\"v1-3-9\"", "\"v1-3-9\""));
        assert!(!etag_matches("*", "\"v1-3-9\""));
        assert!(!etag_matches("v1-3-9", "\"v1-3-9\""));
    }
}
