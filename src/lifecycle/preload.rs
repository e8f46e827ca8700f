//! Cache warm-up at startup.
//!
//! # Responsibilities
//! - Render every static page route once
//! - Render dynamic routes for the sampled parameter sets in config
//! - Wait for each cache fill so the cache is warm before traffic arrives
//!
//! # Design Decisions
//! - Renders go straight to the pipeline; middleware still runs for real requests
//!   before any cache lookup
//! - Failures are counted and logged, never fatal
//! - Routes are warmed one at a time to keep startup load predictable

use crate::http::request::RequestContext;
use crate::runtime::Runtime;

/// What a preload pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PreloadReport {
    /// Pages rendered and cached (or already cached).
    pub warmed: usize,
    /// Dynamic routes with no configured sample.
    pub skipped: usize,
    pub failed: usize,
}

/// Warm the response cache according to `runtime.config.preload`.
pub async fn preload_all(runtime: &Runtime) -> PreloadReport {
    let config = &runtime.config.preload;
    let mut report = PreloadReport::default();
    if !config.enabled {
        return report;
    }

    for route in runtime.router.all_routes() {
        let mut samples = Vec::new();
        if route.is_static() {
            if config.static_routes {
                samples.push(Default::default());
            }
        } else {
            samples.extend(
                config
                    .samples
                    .iter()
                    .filter(|s| route.is_named_by(&s.route))
                    .map(|s| s.params.clone()),
            );
            if samples.is_empty() {
                tracing::debug!(route = %route.path, "No preload sample for dynamic route");
                report.skipped += 1;
            }
        }

        for params in samples {
            let Some(url) = route.url_for(&params) else {
                tracing::warn!(route = %route.path, "Preload sample is missing parameters");
                report.failed += 1;
                continue;
            };
            if warm(runtime, &url).await {
                report.warmed += 1;
            } else {
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        warmed = report.warmed,
        skipped = report.skipped,
        failed = report.failed,
        entries = runtime.cache.len(),
        "Preload complete"
    );
    report
}

async fn warm(runtime: &Runtime, url: &str) -> bool {
    let mut req = match RequestContext::get(url) {
        Ok(req) => req,
        Err(e) => {
            tracing::warn!(url, error = %e, "Preload URL is invalid");
            return false;
        }
    };
    let Some(matched) = runtime.router.match_path(&req.path) else {
        tracing::warn!(url, "Preload URL matches no route");
        return false;
    };
    req.params = matched.params.clone();

    let rendered = runtime.pipeline.render(&matched, &req).await;
    if !rendered.response.status().is_success() {
        tracing::warn!(url, status = %rendered.response.status(), "Preload render failed");
        return false;
    }

    // Nobody reads the live branch; drop it so only the cache fill remains.
    let fill = rendered.cache_fill;
    drop(rendered.response);
    if let Some(fill) = fill {
        if let Err(e) = fill.await {
            tracing::warn!(url, error = %e, "Preload cache fill panicked");
            return false;
        }
    }
    tracing::debug!(url, "Preloaded");
    true
}
