//! Domain models for invoice-portal.

mod analytics;
mod invoice;
pub mod pagination;
mod user;

pub use analytics::{
    month_end, month_start, ClientRevenue, DateRange, MonthlyRevenue, Period, RevenueSummary,
};
pub use invoice::{Invoice, InvoiceInput, ListInvoicesFilter, FIRST_INVOICE_NUMBER};
pub use pagination::{Page, PAGE_SIZE};
pub use user::{AuthUser, User};
