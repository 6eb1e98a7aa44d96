//! Metrics export: a Prometheus registry plus a minimal blocking HTTP
//! endpoint to scrape it from.
//!
//! No async runtime backs this: one OS thread accepts connections and writes
//! the rendered registry to each, matching the rest of the engine's
//! thread-per-concern concurrency model.

pub mod metrics;

pub use metrics::MetricsRegistry;

use std::io::Write;
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;
use tracing::{info, warn};

/// Spawn a blocking HTTP server on `bind_addr` that serves the registry's
/// current state at any path, Prometheus text-exposition format. Runs until
/// the process exits; there is no graceful shutdown because there is nothing
/// to flush.
pub fn spawn_metrics_server(bind_addr: &str, registry: Arc<MetricsRegistry>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(bind_addr)?;
    info!(%bind_addr, "metrics server listening");

    thread::Builder::new()
        .name("metrics-server".into())
        .spawn(move || {
            for stream in listener.incoming() {
                let mut stream = match stream {
                    Ok(s) => s,
                    Err(e) => {
                        warn!(error = %e, "metrics server accept failed");
                        continue;
                    }
                };
                let body = registry.render();
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: text/plain; version=0.0.4\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                if let Err(e) = stream.write_all(response.as_bytes()) {
                    warn!(error = %e, "metrics server write failed");
                }
            }
        })?;

    Ok(())
}
