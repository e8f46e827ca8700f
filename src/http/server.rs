//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum app: static files first, then dynamic dispatch
//! - Wire up middleware (timeout, request ID, tracing, limits, headers, compression)
//! - Dispatch by method: GET/HEAD render, POST/PATCH run actions, others 405
//! - Run the background cache sweep
//! - Serve until the shutdown signal fires

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{
    compression::CompressionLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::http::action;
use crate::http::request::RequestContext;
use crate::http::response;
use crate::observability::metrics;
use crate::runtime::Runtime;
use crate::security;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<Runtime>,
}

/// HTTP server for the render runtime.
pub struct HttpServer {
    router: Router,
    runtime: Arc<Runtime>,
}

impl HttpServer {
    pub fn new(runtime: Arc<Runtime>) -> Self {
        let router = Self::build_router(runtime.clone());
        Self { router, runtime }
    }

    /// Build the Axum app with all middleware layers.
    #[allow(deprecated)]
    fn build_router(runtime: Arc<Runtime>) -> Router {
        let config = runtime.config.clone();
        let dynamic = Router::new()
            .fallback(dispatch)
            .with_state(AppState { runtime });

        let static_root = Path::new(&config.static_files.root);
        let app = if config.static_files.enabled && static_root.is_dir() {
            tracing::info!(root = %static_root.display(), "Serving static files");
            let files = ServeDir::new(static_root)
                .append_index_html_on_directories(false)
                .call_fallback_on_method_not_allowed(true)
                .fallback(dynamic);
            Router::new().fallback_service(files)
        } else {
            dynamic
        };

        let app = security::headers::apply(app, &config.security);
        let app = if config.security.compression {
            app.layer(CompressionLayer::new())
        } else {
            app
        };

        app.layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The app without a listener, for in-process use.
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let cache_config = &self.runtime.config.cache;
        if cache_config.sweep_interval_secs > 0 {
            let sweeper = CacheSweeper {
                runtime: self.runtime.clone(),
                interval: Duration::from_secs(cache_config.sweep_interval_secs),
                batch: cache_config.sweep_batch,
            };
            let stop = shutdown.resubscribe();
            tokio::spawn(async move {
                sweeper.run(stop).await;
            });
        }

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received; draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Dynamic request handler.
async fn dispatch(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let (parts, body) = request.into_parts();
    let ctx = RequestContext::from_parts(&parts);
    let runtime = &state.runtime;

    tracing::debug!(
        request_id = ctx.id(),
        method = %ctx.method,
        path = %ctx.path,
        "Handling request"
    );

    let method = ctx.method.clone();
    match method {
        Method::GET | Method::HEAD => match runtime.router.render(&runtime.pipeline, ctx).await {
            Some(response) => response,
            None => {
                metrics::record_render("not_found", start);
                response::plain(StatusCode::NOT_FOUND, "Not Found")
            }
        },
        Method::POST | Method::PATCH => {
            action::handle(
                &runtime.actions,
                &runtime.cache,
                &ctx,
                body,
                runtime.config.security.max_body_size,
            )
            .await
        }
        _ => response::plain(StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed"),
    }
}

/// Periodically drops expired cache entries.
struct CacheSweeper {
    runtime: Arc<Runtime>,
    interval: Duration,
    batch: usize,
}

impl CacheSweeper {
    async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.runtime.cache.sweep(self.batch);
                    if removed > 0 {
                        tracing::debug!(removed, remaining = self.runtime.cache.len(), "Expired cache entries swept");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Cache sweeper stopping");
                    return;
                }
            }
        }
    }
}
