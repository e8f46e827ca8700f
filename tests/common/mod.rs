//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use render_runtime::config::RuntimeConfig;
use render_runtime::http::action::ActionRegistry;
use render_runtime::lifecycle::Shutdown;
use render_runtime::routing::{Router, RouterBuilder};
use render_runtime::{HttpServer, Runtime};
use tokio::net::TcpListener;

/// A server running on an ephemeral port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub runtime: Arc<Runtime>,
    pub shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Defaults suitable for tests: no static files, no sweeper, no preload.
pub fn test_config() -> RuntimeConfig {
    let mut config = RuntimeConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.static_files.enabled = false;
    config.cache.sweep_interval_secs = 0;
    config.preload.enabled = false;
    config
}

/// Register routes with `register` and serve them.
pub async fn start_server<F>(config: RuntimeConfig, register: F) -> TestServer
where
    F: FnOnce(&mut RouterBuilder, &mut ActionRegistry),
{
    let mut builder = Router::builder();
    let mut actions = ActionRegistry::new();
    register(&mut builder, &mut actions);
    let runtime = Arc::new(Runtime::new(config, builder.build(), actions));
    serve(runtime).await
}

/// Serve an already-built runtime.
pub async fn serve(runtime: Arc<Runtime>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();

    let server = HttpServer::new(runtime.clone());
    let stop = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, stop).await;
    });

    TestServer {
        addr,
        runtime,
        shutdown,
    }
}

/// Client without connection pooling or proxies.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Wait until background cache fills have stored `expected` entries.
pub async fn wait_for_entries(runtime: &Runtime, expected: usize) {
    for _ in 0..100 {
        if runtime.cache.len() >= expected {
            return;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!(
        "cache holds {} entries, expected {}",
        runtime.cache.len(),
        expected
    );
}
