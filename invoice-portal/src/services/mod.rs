//! Services module for invoice-portal.

pub mod amount_words;
pub mod analytics;
pub mod database;
pub mod documents;
pub mod metrics;
pub mod money;

pub use database::Database;
pub use documents::{render_document, DocumentKind, PdfConverter, PrintPdfConverter};
pub use metrics::{get_metrics, init_metrics};
