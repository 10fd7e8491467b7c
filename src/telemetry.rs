use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::error::{BenchError, Result};

/// Logs go to stderr; stdout carries only the result table.
pub fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

pub fn install_metrics(addr: SocketAddr) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| BenchError::ConfigError(format!("metrics exporter: {}", e)))?;

    metrics::describe_counter!(
        "proxybench_endpoints_total",
        "Endpoints benchmarked, by outcome"
    );
    metrics::describe_counter!(
        "proxybench_probe_failures_total",
        "Latency probes that failed"
    );
    metrics::describe_histogram!(
        "proxybench_latency_ms",
        metrics::Unit::Milliseconds,
        "Average latency of reachable endpoints"
    );
    metrics::describe_histogram!(
        "proxybench_download_bytes_per_sec",
        "Aggregate download speed"
    );
    metrics::describe_histogram!(
        "proxybench_upload_bytes_per_sec",
        "Aggregate upload speed"
    );

    info!("metrics exporter listening on {}", addr);
    Ok(())
}
