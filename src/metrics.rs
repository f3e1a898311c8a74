// src/metrics.rs
//! Optional Prometheus exposition for the daemon.

use std::net::SocketAddr;

use anyhow::Context;
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::telemetry::ensure_metrics_described;

pub const ENV_METRICS_ADDR: &str = "CURATOR_METRICS_ADDR";

/// Install the Prometheus recorder with its HTTP listener on `addr`.
/// Must run inside the tokio runtime.
pub fn install_exporter(addr: SocketAddr) -> anyhow::Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("prometheus: listen on {addr}"))?;
    ensure_metrics_described();
    Ok(())
}

/// Install the exporter when `CURATOR_METRICS_ADDR` is set. Returns the bound
/// address, or `None` when metrics stay in-process only.
pub fn init_from_env() -> anyhow::Result<Option<SocketAddr>> {
    let Some(raw) = std::env::var(ENV_METRICS_ADDR)
        .ok()
        .filter(|v| !v.trim().is_empty())
    else {
        return Ok(None);
    };
    let addr: SocketAddr = raw
        .trim()
        .parse()
        .with_context(|| format!("{ENV_METRICS_ADDR}=`{raw}` is not a socket address"))?;
    install_exporter(addr)?;
    Ok(Some(addr))
}
