//! Invoice model for invoice-portal.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::services::money::{vat_for, with_vat};

/// First number handed out when no invoice has been numbered yet.
pub const FIRST_INVOICE_NUMBER: i64 = 10000;

/// A persisted invoice. The same record backs both the invoice and the
/// quotation document.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub id: i64,
    pub invoice_number: i64,
    pub client_name: String,
    pub reference_no: String,
    pub date: NaiveDate,
    pub subject: String,
    pub address: String,
    pub mobile_number: String,
    pub amount: Decimal,
    pub work_description: String,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    pub fn vat_amount(&self) -> Decimal {
        vat_for(self.amount)
    }

    pub fn total_with_vat(&self) -> Decimal {
        with_vat(self.amount)
    }

    /// Label shown in confirmation pages and logs.
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.reference_no, self.client_name)
    }
}

/// Validated field values for creating or editing an invoice. The number and
/// creation timestamp are never part of the input.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceInput {
    pub client_name: String,
    pub reference_no: String,
    pub date: NaiveDate,
    pub subject: String,
    pub address: String,
    pub mobile_number: String,
    pub amount: Decimal,
    pub work_description: String,
}

/// Filter parameters for listing invoices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListInvoicesFilter {
    pub search: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

impl ListInvoicesFilter {
    /// LIKE pattern for the search term with `%`, `_` and `\` escaped, so
    /// user input is matched literally.
    pub fn search_pattern(&self) -> Option<String> {
        self.search.as_deref().map(|term| {
            let mut escaped = String::with_capacity(term.len() + 2);
            escaped.push('%');
            for ch in term.chars() {
                if matches!(ch, '%' | '_' | '\\') {
                    escaped.push('\\');
                }
                escaped.push(ch);
            }
            escaped.push('%');
            escaped
        })
    }
}
