//! Database service for invoice-portal.

use crate::models::pagination::{page_offset, resolve_page};
use crate::models::{
    ClientRevenue, DateRange, Invoice, InvoiceInput, ListInvoicesFilter, Page, User, PAGE_SIZE,
};
use crate::services::metrics::{DB_QUERY_DURATION, INVOICES_CREATED, INVOICES_DELETED, INVOICES_UPDATED};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use service_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, instrument};

const INVOICE_COLUMNS: &str = "id, invoice_number, client_name, reference_no, date, subject, \
     address, mobile_number, amount, work_description, created_at";

const USER_COLUMNS: &str =
    "id, username, password_hash, is_superuser, is_active, created_at, last_login_at";

/// Shared search and date predicate for list queries ($1 pattern, $2 from, $3 to).
const LIST_PREDICATE: &str = r#"
    ($1::text IS NULL
        OR client_name ILIKE $1
        OR invoice_number::text ILIKE $1
        OR reference_no ILIKE $1)
    AND ($2::date IS NULL OR date >= $2)
    AND ($3::date IS NULL OR date <= $3)
"#;

/// Date-range predicate for analytics queries ($1 start, $2 end).
const RANGE_PREDICATE: &str = "($1::date IS NULL OR date >= $1) AND ($2::date IS NULL OR date <= $2)";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "invoice-portal"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    /// Create an invoice. The number is assigned inside the INSERT by
    /// `next_invoice_number()`, which serializes concurrent creates.
    #[instrument(skip(self, input), fields(client_name = %input.client_name))]
    pub async fn create_invoice(&self, input: &InvoiceInput) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (invoice_number, client_name, reference_no, date, subject,
                address, mobile_number, amount, work_description)
            VALUES (next_invoice_number(), $1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(&input.client_name)
        .bind(&input.reference_no)
        .bind(input.date)
        .bind(&input.subject)
        .bind(&input.address)
        .bind(&input.mobile_number)
        .bind(input.amount)
        .bind(&input.work_description)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("Invoice number already taken, retry"))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)),
        })?;

        timer.observe_duration();
        INVOICES_CREATED.inc();

        info!(
            invoice_id = invoice.id,
            invoice_number = invoice.invoice_number,
            "Invoice created"
        );

        Ok(invoice)
    }

    /// Get an invoice by ID.
    #[instrument(skip(self))]
    pub async fn get_invoice(&self, id: i64) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            "SELECT {INVOICE_COLUMNS} FROM invoices WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    /// Get an invoice by ID or fail with `NotFound`.
    pub async fn require_invoice(&self, id: i64) -> Result<Invoice, AppError> {
        self.get_invoice(id)
            .await?
            .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice {} not found", id)))
    }

    /// List one page of invoices matching `filter`, newest first.
    #[instrument(skip(self, filter))]
    pub async fn list_invoices(
        &self,
        filter: &ListInvoicesFilter,
        page: Option<&str>,
    ) -> Result<Page<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let pattern = filter.search_pattern();

        let total: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(*) FROM invoices WHERE {LIST_PREDICATE}"
        ))
        .bind(&pattern)
        .bind(filter.date_from)
        .bind(filter.date_to)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to count invoices: {}", e)))?;

        let number = resolve_page(page, total, PAGE_SIZE);

        let items = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE {LIST_PREDICATE}
            ORDER BY created_at DESC, id DESC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(&pattern)
        .bind(filter.date_from)
        .bind(filter.date_to)
        .bind(PAGE_SIZE)
        .bind(page_offset(number, PAGE_SIZE))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        timer.observe_duration();

        Ok(Page::new(items, number, total, PAGE_SIZE))
    }

    /// Overwrite the editable fields of an invoice. Number and creation time
    /// are left untouched.
    #[instrument(skip(self, input))]
    pub async fn update_invoice(&self, id: i64, input: &InvoiceInput) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET client_name = $2, reference_no = $3, date = $4, subject = $5,
                address = $6, mobile_number = $7, amount = $8, work_description = $9
            WHERE id = $1
            RETURNING {INVOICE_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&input.client_name)
        .bind(&input.reference_no)
        .bind(input.date)
        .bind(&input.subject)
        .bind(&input.address)
        .bind(&input.mobile_number)
        .bind(input.amount)
        .bind(&input.work_description)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice: {}", e)))?
        .ok_or_else(|| AppError::NotFound(anyhow::anyhow!("Invoice {} not found", id)))?;

        timer.observe_duration();
        INVOICES_UPDATED.inc();

        info!(invoice_id = invoice.id, invoice_number = invoice.invoice_number, "Invoice updated");

        Ok(invoice)
    }

    /// Delete an invoice.
    #[instrument(skip(self))]
    pub async fn delete_invoice(&self, id: i64) -> Result<(), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        let result = sqlx::query("DELETE FROM invoices WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete invoice: {}", e)))?;

        timer.observe_duration();

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(anyhow::anyhow!("Invoice {} not found", id)));
        }

        INVOICES_DELETED.inc();
        info!(invoice_id = id, "Invoice deleted");

        Ok(())
    }

    // -------------------------------------------------------------------------
    // Analytics Operations
    // -------------------------------------------------------------------------

    /// Summed amount and record count within `range`.
    #[instrument(skip(self))]
    pub async fn revenue_totals(&self, range: &DateRange) -> Result<(Decimal, i64), AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["revenue_totals"])
            .start_timer();

        let totals = sqlx::query_as::<_, (Decimal, i64)>(&format!(
            "SELECT COALESCE(SUM(amount), 0), COUNT(*) FROM invoices WHERE {RANGE_PREDICATE}"
        ))
        .bind(range.start)
        .bind(range.end)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to sum revenue: {}", e)))?;

        timer.observe_duration();

        Ok(totals)
    }

    /// Per-month summed amount for invoices dated in `[start, end]`, keyed
    /// by the first day of the month.
    #[instrument(skip(self))]
    pub async fn monthly_revenue(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(NaiveDate, Decimal)>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["monthly_revenue"])
            .start_timer();

        let rows = sqlx::query_as::<_, (NaiveDate, Decimal)>(
            r#"
            SELECT date_trunc('month', date)::date AS month, SUM(amount) AS revenue
            FROM invoices
            WHERE date >= $1 AND date <= $2
            GROUP BY 1
            ORDER BY 1
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to load monthly revenue: {}", e))
        })?;

        timer.observe_duration();

        Ok(rows)
    }

    /// Clients ranked by summed amount within `range`, ties by name.
    #[instrument(skip(self))]
    pub async fn top_clients(
        &self,
        range: &DateRange,
        limit: i64,
    ) -> Result<Vec<ClientRevenue>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["top_clients"])
            .start_timer();

        let clients = sqlx::query_as::<_, ClientRevenue>(&format!(
            r#"
            SELECT client_name, SUM(amount) AS total, COUNT(*) AS invoice_count
            FROM invoices
            WHERE {RANGE_PREDICATE}
            GROUP BY client_name
            ORDER BY total DESC, client_name ASC
            LIMIT $3
            "#
        ))
        .bind(range.start)
        .bind(range.end)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to rank clients: {}", e)))?;

        timer.observe_duration();

        Ok(clients)
    }

    /// Every invoice within `range`, ordered by date then number.
    #[instrument(skip(self))]
    pub async fn invoices_in_range(&self, range: &DateRange) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["invoices_in_range"])
            .start_timer();

        let invoices = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE {RANGE_PREDICATE}
            ORDER BY date ASC, invoice_number ASC
            "#
        ))
        .bind(range.start)
        .bind(range.end)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to load invoices: {}", e)))?;

        timer.observe_duration();

        Ok(invoices)
    }

    // -------------------------------------------------------------------------
    // User Operations
    // -------------------------------------------------------------------------

    /// Get a user by ID.
    #[instrument(skip(self))]
    pub async fn get_user(&self, id: i64) -> Result<Option<User>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_user"])
            .start_timer();

        let user = sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get user: {}", e)))?;

        timer.observe_duration();

        Ok(user)
    }

    /// Get a user by username.
    #[instrument(skip(self))]
    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_user_by_username"])
            .start_timer();

        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get user: {}", e)))?;

        timer.observe_duration();

        Ok(user)
    }

    /// Create a user with an already-hashed password.
    #[instrument(skip(self, password_hash))]
    pub async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        is_superuser: bool,
    ) -> Result<User, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_user"])
            .start_timer();

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (username, password_hash, is_superuser)
            VALUES ($1, $2, $3)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(username)
        .bind(password_hash)
        .bind(is_superuser)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(anyhow::anyhow!("User '{}' already exists", username))
            }
            _ => AppError::DatabaseError(anyhow::anyhow!("Failed to create user: {}", e)),
        })?;

        timer.observe_duration();

        info!(user_id = user.id, username = %user.username, is_superuser = is_superuser, "User created");

        Ok(user)
    }

    /// Record a successful login.
    #[instrument(skip(self))]
    pub async fn touch_last_login(&self, user_id: i64) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = $1")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to record login: {}", e))
            })?;
        Ok(())
    }

    /// Create the superuser `username` unless an account with that name
    /// already exists. Returns whether a row was inserted.
    #[instrument(skip(self, password_hash))]
    pub async fn ensure_superuser(
        &self,
        username: &str,
        password_hash: &str,
    ) -> Result<bool, AppError> {
        let inserted = sqlx::query(
            r#"
            INSERT INTO users (username, password_hash, is_superuser)
            VALUES ($1, $2, TRUE)
            ON CONFLICT (username) DO NOTHING
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to bootstrap superuser: {}", e)))?
        .rows_affected()
            > 0;

        if inserted {
            info!(username = %username, "Bootstrap superuser created");
        }

        Ok(inserted)
    }
}
