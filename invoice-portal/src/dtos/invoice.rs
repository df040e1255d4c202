//! Form and query-string payloads for invoice pages.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::str::FromStr;
use validator::Validate;

use crate::models::{InvoiceInput, ListInvoicesFilter};

/// Largest whole part `NUMERIC(10, 2)` can hold: 8 integer digits.
const MAX_INTEGER_DIGITS: usize = 8;

/// Field name to first error message, in field order for display.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormErrors(BTreeMap<String, String>);

impl FormErrors {
    pub fn insert(&mut self, field: &str, message: impl Into<String>) {
        self.0.entry(field.to_string()).or_insert_with(|| message.into());
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

/// Raw invoice form submission. Values stay as strings so a rejected form
/// can be re-rendered exactly as typed.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct InvoiceForm {
    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "Client name is required (max 255 characters)"))]
    pub client_name: String,

    #[serde(default)]
    #[validate(length(min = 1, max = 100, message = "Reference is required (max 100 characters)"))]
    pub reference_no: String,

    #[serde(default)]
    pub date: String,

    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "Subject is required (max 255 characters)"))]
    pub subject: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Address is required"))]
    pub address: String,

    #[serde(default)]
    #[validate(length(min = 1, max = 20, message = "Mobile number is required (max 20 characters)"))]
    pub mobile_number: String,

    #[serde(default)]
    pub amount: String,

    #[serde(default)]
    #[validate(length(min = 1, message = "Work description is required"))]
    pub work_description: String,
}

impl InvoiceForm {
    /// Prefill from an existing input, as on the edit page.
    pub fn from_input(input: &InvoiceInput) -> Self {
        Self {
            client_name: input.client_name.clone(),
            reference_no: input.reference_no.clone(),
            date: input.date.format("%Y-%m-%d").to_string(),
            subject: input.subject.clone(),
            address: input.address.clone(),
            mobile_number: input.mobile_number.clone(),
            amount: format!("{:.2}", input.amount),
            work_description: input.work_description.clone(),
        }
    }

    fn trimmed(&self) -> Self {
        Self {
            client_name: self.client_name.trim().to_string(),
            reference_no: self.reference_no.trim().to_string(),
            date: self.date.trim().to_string(),
            subject: self.subject.trim().to_string(),
            address: self.address.trim().to_string(),
            mobile_number: self.mobile_number.trim().to_string(),
            amount: self.amount.trim().to_string(),
            work_description: self.work_description.trim().to_string(),
        }
    }

    /// Validate every field and collect all errors at once.
    pub fn parse(&self) -> Result<InvoiceInput, FormErrors> {
        let form = self.trimmed();
        let mut errors = FormErrors::default();

        if let Err(validation) = form.validate() {
            for (field, field_errors) in validation.field_errors() {
                let message = field_errors
                    .first()
                    .and_then(|e| e.message.as_ref())
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Invalid value".to_string());
                errors.insert(&field.to_string(), message);
            }
        }

        let date = match parse_date(&form.date) {
            Some(date) => Some(date),
            None => {
                errors.insert("date", "Enter a valid date (YYYY-MM-DD)");
                None
            }
        };

        let amount = match parse_amount(&form.amount) {
            Ok(amount) => Some(amount),
            Err(message) => {
                errors.insert("amount", message);
                None
            }
        };

        match (date, amount) {
            (Some(date), Some(amount)) if errors.is_empty() => Ok(InvoiceInput {
                client_name: form.client_name,
                reference_no: form.reference_no,
                date,
                subject: form.subject,
                address: form.address,
                mobile_number: form.mobile_number,
                amount,
                work_description: form.work_description,
            }),
            _ => Err(errors),
        }
    }
}

/// `YYYY-MM-DD`, surrounding whitespace allowed.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

/// Decimal with at most two fractional and eight integer digits.
pub fn parse_amount(raw: &str) -> Result<Decimal, &'static str> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err("Amount is required");
    }
    let amount = Decimal::from_str(raw).map_err(|_| "Enter a number")?;
    if amount.scale() > 2 && amount.normalize().scale() > 2 {
        return Err("Ensure there are no more than 2 decimal places");
    }
    let whole = amount.abs().trunc().normalize().to_string();
    if whole != "0" && whole.len() > MAX_INTEGER_DIGITS {
        return Err("Ensure there are no more than 8 digits before the decimal point");
    }
    Ok(amount.round_dp(2))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Query string of the list page.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub page: Option<String>,
}

impl ListParams {
    /// Blank search means no search; unparseable dates are ignored.
    pub fn filter(&self) -> ListInvoicesFilter {
        ListInvoicesFilter {
            search: non_empty(&self.search).map(str::to_string),
            date_from: non_empty(&self.date_from).and_then(parse_date),
            date_to: non_empty(&self.date_to).and_then(parse_date),
        }
    }
}

/// Query string of the analytics page and export.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyticsParams {
    pub period: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

impl AnalyticsParams {
    pub fn period(&self) -> Option<&str> {
        non_empty(&self.period)
    }

    pub fn date_from(&self) -> Option<NaiveDate> {
        non_empty(&self.date_from).and_then(parse_date)
    }

    pub fn date_to(&self) -> Option<NaiveDate> {
        non_empty(&self.date_to).and_then(parse_date)
    }
}

/// `?created_id=` on the add page after a successful create.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreatedParams {
    pub created_id: Option<String>,
}

impl CreatedParams {
    pub fn created_id(&self) -> Option<i64> {
        non_empty(&self.created_id).and_then(|v| v.parse().ok())
    }
}
