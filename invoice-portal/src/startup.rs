//! Application startup and lifecycle management.

use crate::config::PortalConfig;
use crate::handlers::{
    analytics::{analytics_page, export_csv},
    auth::{login, login_page, logout},
    documents::{invoice_pdf, quotation_pdf},
    health::{health_check, metrics_handler, readiness_check},
    invoices::{
        create_form, create_invoice, delete_confirm, delete_invoice, edit_form, list_invoices,
        update_invoice,
    },
};
use crate::middleware::auth::require_superuser;
use crate::services::{init_metrics, Database, PdfConverter, PrintPdfConverter};
use crate::utils::{hash_password, Password};
use axum::{body::Body, middleware, routing::get, Router};
use service_core::error::AppError;
use service_core::middleware::metrics::metrics_middleware;
use service_core::middleware::security_headers::security_headers_middleware;
use service_core::middleware::tracing::{make_request_span, request_id_middleware};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tower_sessions::{Expiry, MemoryStore, SessionManagerLayer};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: PortalConfig,
    pub db: Arc<Database>,
    pub converter: Arc<dyn PdfConverter>,
}

impl AppState {
    pub fn new(config: PortalConfig, db: Database, converter: Arc<dyn PdfConverter>) -> Self {
        Self {
            config,
            db: Arc::new(db),
            converter,
        }
    }
}

/// PDF converter for the configured font, if any.
pub fn pdf_converter(config: &PortalConfig) -> Result<PrintPdfConverter, AppError> {
    match &config.documents.font_path {
        Some(path) => {
            let converter = PrintPdfConverter::from_font_file(Path::new(path)).map_err(|e| {
                AppError::ConfigError(anyhow::anyhow!(
                    "Failed to read DOCUMENT_FONT_PATH {}: {}",
                    path,
                    e
                ))
            })?;
            tracing::info!(font = %path, "PDF documents use external font");
            Ok(converter)
        }
        None => Ok(PrintPdfConverter::new()),
    }
}

/// Assemble every route. Data pages sit behind the superuser guard; login,
/// logout and probes do not.
pub fn build_router(state: AppState) -> Router {
    init_metrics();

    let session_layer = SessionManagerLayer::new(MemoryStore::default())
        .with_secure(state.config.session.secure_cookie)
        .with_expiry(Expiry::OnInactivity(time::Duration::hours(
            state.config.session.inactivity_hours,
        )));

    let protected = Router::new()
        .route("/", get(list_invoices))
        .route("/list/", get(list_invoices))
        .route("/add/", get(create_form).post(create_invoice))
        .route("/update/:id/", get(edit_form).post(update_invoice))
        .route("/delete/:id/", get(delete_confirm).post(delete_invoice))
        .route("/generate-pdf/:id/", get(invoice_pdf))
        .route("/generate-quotation/:id/", get(quotation_pdf))
        .route("/analytics/", get(analytics_page))
        .route("/analytics/export/", get(export_csv))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_superuser,
        ));

    Router::new()
        .merge(protected)
        .route("/login/", get(login_page).post(login))
        .route("/logout/", get(logout).post(logout))
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .layer(session_layer)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span::<Body>))
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

/// Application container for managing server lifecycle.
pub struct Application {
    port: u16,
    listener: TcpListener,
    state: AppState,
}

impl Application {
    /// Connect, migrate, bootstrap the admin account and bind the listener.
    pub async fn build(config: PortalConfig) -> Result<Self, AppError> {
        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to connect to PostgreSQL");
            e
        })?;

        db.run_migrations().await.map_err(|e| {
            tracing::error!(error = %e, "Failed to run migrations");
            e
        })?;

        let converter = pdf_converter(&config)?;

        if let Some(admin) = &config.bootstrap_admin {
            let hash = hash_password(&Password::from(admin.password.clone()))?;
            db.ensure_superuser(&admin.username, hash.as_str()).await?;
        }

        let addr: SocketAddr = config.common.address().parse().map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "Invalid listen address {}: {}",
                config.common.address(),
                e
            ))
        })?;
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!(error = %e, addr = %addr, "Failed to bind HTTP listener");
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!(port = port, "Invoice portal listener bound");

        Ok(Self {
            port,
            listener,
            state: AppState::new(config, db, Arc::new(converter)),
        })
    }

    /// Get the port the server is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get a reference to the database.
    pub fn db(&self) -> &Database {
        &self.state.db
    }

    /// Run the application until stopped.
    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        let router = build_router(self.state);

        tracing::info!(
            service = "invoice-portal",
            version = env!("CARGO_PKG_VERSION"),
            port = self.port,
            "Service ready to accept connections"
        );

        axum::serve(self.listener, router).await.map_err(|e| {
            tracing::error!(error = %e, "HTTP server error");
            std::io::Error::other(format!("HTTP server error: {}", e))
        })
    }
}
