use axum::{routing::get, Router};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Installs the global Prometheus recorder and returns a router exposing the
/// rendered metrics at `/metrics`.
pub fn setup_metrics() -> anyhow::Result<Router> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    Ok(Router::new().route(
        "/metrics",
        get(move || {
            let handle = handle.clone();
            async move { handle.render() }
        }),
    ))
}
