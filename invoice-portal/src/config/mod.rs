//! Configuration module for invoice-portal.

use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

use crate::services::amount_words::CurrencyLabels;

#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub common: core_config::Config,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub database: DatabaseConfig,
    pub session: SessionConfig,
    pub documents: DocumentConfig,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub secure_cookie: bool,
    pub inactivity_hours: i64,
}

#[derive(Debug, Clone)]
pub struct DocumentConfig {
    pub company_name: String,
    pub currency: CurrencyLabels,
    /// TrueType font for PDFs; the built-in Helvetica faces otherwise.
    pub font_path: Option<String>,
}

/// Superuser created at startup when no account with this name exists.
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: Secret<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secure_cookie: false,
            inactivity_hours: 24,
        }
    }
}

impl Default for DocumentConfig {
    fn default() -> Self {
        Self {
            company_name: "Invoice Portal".to_string(),
            currency: CurrencyLabels::default(),
            font_path: None,
        }
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl PortalConfig {
    pub fn from_env() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;

        let bootstrap_admin = match (
            non_empty_var("BOOTSTRAP_ADMIN_USERNAME"),
            env::var("BOOTSTRAP_ADMIN_PASSWORD").ok().filter(|p| !p.is_empty()),
        ) {
            (Some(username), Some(password)) => Some(BootstrapAdmin {
                username,
                password: Secret::new(password),
            }),
            (Some(_), None) => {
                return Err(AppError::ConfigError(anyhow::anyhow!(
                    "BOOTSTRAP_ADMIN_PASSWORD is required when BOOTSTRAP_ADMIN_USERNAME is set"
                )))
            }
            _ => None,
        };

        let defaults = DocumentConfig::default();

        Ok(Self {
            common,
            service_name: env::var("SERVICE_NAME").unwrap_or_else(|_| "invoice-portal".to_string()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            otlp_endpoint: non_empty_var("OTLP_ENDPOINT"),
            database: DatabaseConfig {
                url: env::var("DATABASE_URL").map_err(|_| {
                    AppError::ConfigError(anyhow::anyhow!("DATABASE_URL is required"))
                })?,
                max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
                min_connections: env::var("DATABASE_MIN_CONNECTIONS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2),
            },
            session: SessionConfig {
                secure_cookie: env::var("SESSION_SECURE_COOKIE")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(false),
                inactivity_hours: env::var("SESSION_INACTIVITY_HOURS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .filter(|h: &i64| *h > 0)
                    .unwrap_or(24),
            },
            documents: DocumentConfig {
                company_name: non_empty_var("COMPANY_NAME").unwrap_or(defaults.company_name),
                currency: CurrencyLabels {
                    major: non_empty_var("CURRENCY_MAJOR_LABEL").unwrap_or(defaults.currency.major),
                    minor: non_empty_var("CURRENCY_MINOR_LABEL").unwrap_or(defaults.currency.minor),
                },
                font_path: non_empty_var("DOCUMENT_FONT_PATH"),
            },
            bootstrap_admin,
        })
    }

    /// Configuration for tests and tooling that supply the database URL
    /// directly.
    pub fn for_database(database_url: &str) -> Self {
        Self {
            common: core_config::Config {
                port: 0,
                host: "127.0.0.1".to_string(),
            },
            service_name: "invoice-portal".to_string(),
            log_level: "info".to_string(),
            otlp_endpoint: None,
            database: DatabaseConfig {
                url: database_url.to_string(),
                max_connections: 5,
                min_connections: 1,
            },
            session: SessionConfig::default(),
            documents: DocumentConfig::default(),
            bootstrap_admin: None,
        }
    }
}
