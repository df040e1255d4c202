//! Prometheus recorder behind the `metrics` facade.
//!
//! `metrics_middleware` records through the facade; this installs the
//! process-wide recorder those calls land in and renders it for `/metrics`.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the recorder. Safe to call more than once; later calls reuse the
/// first handle.
pub fn init_http_metrics() -> &'static PrometheusHandle {
    METRICS_HANDLE.get_or_init(|| {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        if let Err(e) = metrics::set_global_recorder(recorder) {
            tracing::warn!(error = %e, "Metrics recorder already installed");
        }
        handle
    })
}

/// HTTP metrics in Prometheus text format, empty before `init_http_metrics`.
pub fn render_http_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_default()
}
