//! Revenue analytics types and period-to-range resolution.

use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;

/// Named shorthand for a reporting window anchored on "today".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Period {
    ThisMonth,
    LastMonth,
    LastSixMonths,
    ThisYear,
}

impl Period {
    pub const ALL: [Period; 4] = [
        Period::ThisMonth,
        Period::LastMonth,
        Period::LastSixMonths,
        Period::ThisYear,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::ThisMonth => "this_month",
            Period::LastMonth => "last_month",
            Period::LastSixMonths => "last_6_months",
            Period::ThisYear => "this_year",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Period::ThisMonth => "This Month",
            Period::LastMonth => "Last Month",
            Period::LastSixMonths => "Last 6 Months",
            Period::ThisYear => "This Year",
        }
    }

    /// Unknown keywords resolve to `None` and are ignored by callers.
    pub fn parse(keyword: &str) -> Option<Self> {
        match keyword.trim() {
            "this_month" => Some(Period::ThisMonth),
            "last_month" => Some(Period::LastMonth),
            "last_6_months" => Some(Period::LastSixMonths),
            "this_year" => Some(Period::ThisYear),
            _ => None,
        }
    }

    /// Concrete inclusive bounds for this period as seen on `today`.
    pub fn bounds(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let this_month = month_start(today, 0);
        match self {
            Period::ThisMonth => (this_month, today),
            Period::LastMonth => {
                let end = this_month.pred_opt().unwrap_or(this_month);
                (month_start(today, 1), end)
            }
            Period::LastSixMonths => (month_start(today, 5), today),
            Period::ThisYear => (
                NaiveDate::from_ymd_opt(today.year(), 1, 1).unwrap_or(this_month),
                today,
            ),
        }
    }
}

/// First day of the month `months_back` calendar months before `date`'s month.
pub fn month_start(date: NaiveDate, months_back: u32) -> NaiveDate {
    let first = date.with_day(1).unwrap_or(date);
    first
        .checked_sub_months(Months::new(months_back))
        .unwrap_or(first)
}

/// Last day of the month that starts at `first`.
pub fn month_end(first: NaiveDate) -> NaiveDate {
    first
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .unwrap_or(first)
}

/// The active reporting window. Either bound may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub period: Option<Period>,
}

impl DateRange {
    /// Resolve the active range. A recognised period keyword wins over
    /// explicit dates; with neither, the range is unbounded.
    pub fn resolve(
        period: Option<&str>,
        date_from: Option<NaiveDate>,
        date_to: Option<NaiveDate>,
        today: NaiveDate,
    ) -> Self {
        match period.and_then(Period::parse) {
            Some(p) => {
                let (start, end) = p.bounds(today);
                Self {
                    start: Some(start),
                    end: Some(end),
                    period: Some(p),
                }
            }
            None => Self {
                start: date_from,
                end: date_to,
                period: None,
            },
        }
    }

    pub fn is_unbounded(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|s| s <= date) && self.end.is_none_or(|e| date <= e)
    }

    /// Human-readable description, e.g. "2026-10-01 to 2026-10-17".
    pub fn describe(&self) -> String {
        match (self.start, self.end) {
            (Some(s), Some(e)) => format!("{} to {}", s, e),
            (Some(s), None) => format!("From {}", s),
            (None, Some(e)) => format!("Up to {}", e),
            (None, None) => "All time".to_string(),
        }
    }

    /// Filename-safe tag for exports.
    pub fn file_tag(&self) -> String {
        match (self.period, self.start, self.end) {
            (Some(p), _, _) => p.as_str().to_string(),
            (None, None, None) => "all_time".to_string(),
            (None, s, e) => format!(
                "{}_{}",
                s.map(|d| d.to_string()).unwrap_or_else(|| "start".to_string()),
                e.map(|d| d.to_string()).unwrap_or_else(|| "today".to_string())
            ),
        }
    }
}

/// Totals over the active range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RevenueSummary {
    pub total_revenue: Decimal,
    pub total_vat: Decimal,
    pub invoice_count: i64,
    pub average_invoice: Decimal,
}

/// One point of the trailing monthly trend.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyRevenue {
    pub label: String,
    pub month_start: NaiveDate,
    pub revenue: Decimal,
}

/// Revenue attributed to one client within the active range.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct ClientRevenue {
    pub client_name: String,
    pub total: Decimal,
    pub invoice_count: i64,
}
