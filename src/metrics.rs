use crate::config::MetricsConfig;
use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

pub fn init_metrics(config: &MetricsConfig) -> Result<()> {
    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .with_context(|| format!("invalid metrics listen address '{}'", config.listen_addr))?;

    let builder = PrometheusBuilder::new().with_http_listener(addr);
    builder.install()?;

    tracing::info!("Prometheus exporter listening on {}", addr);
    Ok(())
}
