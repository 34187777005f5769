//! Prometheus metrics endpoint.

use crate::config::MetricsConfig;
use eyre::{Result, WrapErr};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and serve it over HTTP, if an address is configured.
///
/// Returns whether an exporter was installed. Must be called from within a tokio runtime.
pub fn install_metrics(config: &MetricsConfig) -> Result<bool> {
    let Some(addr) = config.addr else {
        return Ok(false);
    };

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .wrap_err_with(|| format!("Failed to start metrics endpoint on {addr}"))?;

    tracing::info!(%addr, "Serving Prometheus metrics");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_without_address() {
        assert!(!install_metrics(&MetricsConfig::default()).unwrap());
    }
}
