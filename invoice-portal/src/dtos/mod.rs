pub mod auth;
pub mod invoice;

pub use auth::{safe_next, LoginForm, NextParams};
pub use invoice::{AnalyticsParams, CreatedParams, FormErrors, InvoiceForm, ListParams};
