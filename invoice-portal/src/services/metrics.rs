//! Prometheus metrics for invoice-portal.

use once_cell::sync::Lazy;
use service_core::observability::{init_http_metrics, render_http_metrics};
use prometheus::{
    register_counter, register_counter_vec, register_histogram_vec, Counter, CounterVec,
    HistogramVec, TextEncoder,
};

/// Invoices created.
pub static INVOICES_CREATED: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "invoice_portal_invoices_created_total",
        "Total number of invoices created"
    )
    .expect("Failed to register invoices_created_total")
});

/// Invoices updated.
pub static INVOICES_UPDATED: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "invoice_portal_invoices_updated_total",
        "Total number of invoices updated"
    )
    .expect("Failed to register invoices_updated_total")
});

/// Invoices deleted.
pub static INVOICES_DELETED: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "invoice_portal_invoices_deleted_total",
        "Total number of invoices deleted"
    )
    .expect("Failed to register invoices_deleted_total")
});

/// PDF documents rendered by kind and outcome.
pub static DOCUMENTS_RENDERED: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoice_portal_documents_rendered_total",
        "Total number of PDF documents rendered",
        &["kind", "status"] // invoice|quotation, ok|error
    )
    .expect("Failed to register documents_rendered_total")
});

/// Analytics CSV exports.
pub static EXPORTS_TOTAL: Lazy<Counter> = Lazy::new(|| {
    register_counter!(
        "invoice_portal_exports_total",
        "Total number of analytics CSV exports"
    )
    .expect("Failed to register exports_total")
});

/// Login attempts by outcome.
pub static LOGIN_ATTEMPTS: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoice_portal_login_attempts_total",
        "Total number of login attempts",
        &["status"]
    )
    .expect("Failed to register login_attempts_total")
});

/// Error counter for alerting.
pub static ERRORS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "invoice_portal_errors_total",
        "Total number of errors by type",
        &["error_type"]
    )
    .expect("Failed to register errors_total")
});

/// Database query duration histogram.
pub static DB_QUERY_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "invoice_portal_db_query_duration_seconds",
        "Database query duration in seconds",
        &["operation"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    )
    .expect("Failed to register db_query_duration")
});

/// Initialize all metrics (forces lazy initialization) and the HTTP
/// request recorder.
pub fn init_metrics() {
    init_http_metrics();
    Lazy::force(&INVOICES_CREATED);
    Lazy::force(&INVOICES_UPDATED);
    Lazy::force(&INVOICES_DELETED);
    Lazy::force(&DOCUMENTS_RENDERED);
    Lazy::force(&EXPORTS_TOTAL);
    Lazy::force(&LOGIN_ATTEMPTS);
    Lazy::force(&ERRORS_TOTAL);
    Lazy::force(&DB_QUERY_DURATION);
}

/// Get metrics in Prometheus text format: the portal registry followed by
/// the HTTP request series.
pub fn get_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut output = encoder
        .encode_to_string(&metric_families)
        .unwrap_or_default();
    output.push_str(&render_http_metrics());
    output
}
