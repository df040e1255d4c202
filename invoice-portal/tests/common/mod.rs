//! Common test utilities for invoice-portal integration tests.
//!
//! Each test gets its own PostgreSQL schema so tests can run in parallel
//! against one database. Set `TEST_DATABASE_URL` and run with
//! `cargo test -- --ignored`.

#![allow(dead_code)]

use invoice_portal::config::PortalConfig;
use invoice_portal::services::Database;
use invoice_portal::startup::Application;
use invoice_portal::utils::{hash_password, Password};
use reqwest::{redirect::Policy, Client, StatusCode};
use sqlx::postgres::PgPoolOptions;
use std::sync::Once;
use uuid::Uuid;

pub const ADMIN_USERNAME: &str = "admin";
pub const ADMIN_PASSWORD: &str = "correct-horse-battery";

static INIT: Once = Once::new();

/// Initialize tracing for tests (only once).
pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter("info,invoice_portal=debug,sqlx=warn")
            .with_test_writer()
            .try_init()
            .ok();
    });
}

fn database_url() -> String {
    std::env::var("TEST_DATABASE_URL").expect("TEST_DATABASE_URL must be set")
}

fn with_search_path(url: &str, schema: &str) -> String {
    let separator = if url.contains('?') { '&' } else { '?' };
    format!("{}{}options=-c%20search_path%3D{}", url, separator, schema)
}

/// A running application bound to a random port with a logged-in client.
pub struct TestApp {
    pub address: String,
    pub client: Client,
    pub db: Database,
    pub schema: String,
}

/// Form fields for a valid invoice; override what the test cares about.
pub fn invoice_form<'a>(client_name: &'a str, reference_no: &'a str, date: &'a str, amount: &'a str) -> Vec<(&'static str, &'a str)> {
    vec![
        ("client_name", client_name),
        ("reference_no", reference_no),
        ("date", date),
        ("subject", "Interior works"),
        ("address", "Office 12\nBusiness Bay"),
        ("mobile_number", "+971500000000"),
        ("amount", amount),
        ("work_description", "Supply and install partitions"),
    ]
}

impl TestApp {
    /// Spawn the application in a fresh schema and log in as a superuser.
    pub async fn spawn() -> TestApp {
        init_tracing();

        let base_url = database_url();
        let schema = format!("test_{}", Uuid::new_v4().simple());

        let admin_pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(&base_url)
            .await
            .expect("Failed to connect to TEST_DATABASE_URL");
        sqlx::query(&format!("CREATE SCHEMA {}", schema))
            .execute(&admin_pool)
            .await
            .expect("Failed to create test schema");
        admin_pool.close().await;

        let config = PortalConfig::for_database(&with_search_path(&base_url, &schema));
        let app = Application::build(config)
            .await
            .expect("Failed to build application");

        let db = app.db().clone();
        let hash = hash_password(&Password::new(ADMIN_PASSWORD.to_string())).unwrap();
        db.create_user(ADMIN_USERNAME, hash.as_str(), true)
            .await
            .expect("Failed to seed superuser");

        let address = format!("http://127.0.0.1:{}", app.port());
        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let client = Client::builder()
            .cookie_store(true)
            .redirect(Policy::none())
            .build()
            .unwrap();

        let test_app = TestApp {
            address,
            client,
            db,
            schema,
        };
        test_app.wait_until_ready().await;
        test_app.login(ADMIN_USERNAME, ADMIN_PASSWORD).await;
        test_app
    }

    async fn wait_until_ready(&self) {
        for _ in 0..20 {
            if let Ok(response) = self.client.get(self.url("/health")).send().await {
                if response.status().is_success() {
                    return;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
        panic!("Application did not become ready");
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// A client with its own (empty) cookie jar.
    pub fn anonymous_client(&self) -> Client {
        Client::builder()
            .cookie_store(true)
            .redirect(Policy::none())
            .build()
            .unwrap()
    }

    pub async fn login(&self, username: &str, password: &str) -> reqwest::Response {
        let response = self
            .client
            .post(self.url("/login/"))
            .form(&[("username", username), ("password", password), ("next", "/")])
            .send()
            .await
            .expect("Failed to POST /login/");
        response
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .form(form)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Submit the create form and return the new invoice id.
    pub async fn create_invoice(&self, client_name: &str, reference_no: &str, date: &str, amount: &str) -> i64 {
        let response = self
            .post_form("/add/", &invoice_form(client_name, reference_no, date, amount))
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let location = response
            .headers()
            .get("location")
            .and_then(|v| v.to_str().ok())
            .expect("create redirects")
            .to_string();
        location
            .strip_prefix("/add/?created_id=")
            .and_then(|id| id.parse().ok())
            .unwrap_or_else(|| panic!("unexpected redirect target {}", location))
    }

    /// Drop the test schema.
    pub async fn cleanup(self) {
        let pool = PgPoolOptions::new()
            .max_connections(1)
            .connect(&database_url())
            .await
            .expect("Failed to connect for cleanup");
        sqlx::query(&format!("DROP SCHEMA IF EXISTS {} CASCADE", self.schema))
            .execute(&pool)
            .await
            .ok();
        pool.close().await;
    }
}
