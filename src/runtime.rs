//! Shared runtime context.
//!
//! Everything a request needs (configuration, router, render pipeline,
//! response cache, actions) lives in one value built at startup and shared
//! behind an `Arc`.

use std::sync::Arc;

use crate::cache::ResponseCache;
use crate::config::RuntimeConfig;
use crate::http::action::ActionRegistry;
use crate::render::{Document, HtmlEngine, RenderEngine, RenderPipeline};
use crate::routing::Router;

pub struct Runtime {
    pub config: RuntimeConfig,
    pub router: Router,
    pub pipeline: RenderPipeline,
    pub cache: Arc<ResponseCache>,
    pub actions: ActionRegistry,
}

impl Runtime {
    /// Build a runtime rendering with the built-in HTML engine.
    pub fn new(config: RuntimeConfig, router: Router, actions: ActionRegistry) -> Self {
        Self::with_engine(config, router, actions, Arc::new(HtmlEngine::default()))
    }

    pub fn with_engine(
        config: RuntimeConfig,
        router: Router,
        actions: ActionRegistry,
        engine: Arc<dyn RenderEngine>,
    ) -> Self {
        let cache = Arc::new(ResponseCache::new(&config.cache));
        let document = Document::from_env(&config.document);
        let pipeline = RenderPipeline::new(
            cache.clone(),
            engine,
            document,
            &config.timeouts,
            &config.render,
        );
        tracing::debug!(
            capacity = config.cache.capacity,
            ttl_secs = config.cache.ttl_secs,
            actions = actions.len(),
            "Runtime initialized"
        );
        Self {
            config,
            router,
            pipeline,
            cache,
            actions,
        }
    }
}
