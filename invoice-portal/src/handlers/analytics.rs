//! Revenue dashboard and CSV export.

use askama::Template;
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension,
};
use chrono::{Local, NaiveDate};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use service_core::error::AppError;

use crate::dtos::AnalyticsParams;
use crate::handlers::render;
use crate::models::{AuthUser, ClientRevenue, DateRange, MonthlyRevenue, Period, RevenueSummary};
use crate::services::analytics::{
    build_trend, export_filename, resolve_range, summarize, trend_window, write_csv, TOP_CLIENTS,
};
use crate::services::metrics::EXPORTS_TOTAL;
use crate::services::money::format_money;
use crate::startup::AppState;

/// One row of the trend chart.
pub struct TrendBar {
    pub label: String,
    pub revenue: String,
    pub percent: u32,
}

impl TrendBar {
    /// Bars are scaled against the busiest month.
    pub fn from_trend(trend: &[MonthlyRevenue]) -> Vec<TrendBar> {
        let peak = trend
            .iter()
            .map(|point| point.revenue)
            .max()
            .unwrap_or(Decimal::ZERO);

        trend
            .iter()
            .map(|point| {
                let percent = if peak > Decimal::ZERO {
                    (point.revenue * Decimal::ONE_HUNDRED / peak)
                        .round()
                        .to_u32()
                        .unwrap_or(0)
                } else {
                    0
                };
                TrendBar {
                    label: point.label.clone(),
                    revenue: format_money(point.revenue),
                    percent,
                }
            })
            .collect()
    }
}

#[derive(Template)]
#[template(path = "analytics.html")]
pub struct AnalyticsTemplate {
    pub current_user: Option<AuthUser>,
    pub periods: Vec<Period>,
    pub period: String,
    pub date_from: String,
    pub date_to: String,
    pub export_query: String,
    pub range: DateRange,
    pub summary: RevenueSummary,
    pub trend: Vec<TrendBar>,
    pub top_clients: Vec<ClientRevenue>,
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn range_for(params: &AnalyticsParams) -> DateRange {
    resolve_range(params.period(), params.date_from(), params.date_to(), today())
}

/// Query string that reproduces the active selection on the export link.
fn export_query(range: &DateRange) -> String {
    if let Some(period) = range.period {
        return format!("?period={}", period.as_str());
    }
    let mut parts = Vec::new();
    if let Some(start) = range.start {
        parts.push(format!("date_from={}", start));
    }
    if let Some(end) = range.end {
        parts.push(format!("date_to={}", end));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!("?{}", parts.join("&"))
    }
}

/// GET /analytics/
pub async fn analytics_page(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<AnalyticsParams>,
) -> Result<Response, AppError> {
    let today = today();
    let range = range_for(&params);

    let (total, count) = state.db.revenue_totals(&range).await?;
    let summary = summarize(total, count);

    let (first, last) = trend_window(today);
    let sums = state.db.monthly_revenue(first, last).await?;
    let trend = build_trend(today, &sums);

    let top_clients = state.db.top_clients(&range, TOP_CLIENTS).await?;

    // Explicit dates are only echoed back when no period keyword is active.
    let show = |date: Option<NaiveDate>| match range.period {
        Some(_) => String::new(),
        None => date.map(|d| d.to_string()).unwrap_or_default(),
    };
    let date_from = show(range.start);
    let date_to = show(range.end);

    render(
        StatusCode::OK,
        &AnalyticsTemplate {
            current_user: Some(user),
            periods: Period::ALL.to_vec(),
            period: range.period.map(|p| p.as_str().to_string()).unwrap_or_default(),
            date_from,
            date_to,
            export_query: export_query(&range),
            summary,
            trend: TrendBar::from_trend(&trend),
            top_clients,
            range,
        },
    )
}

/// GET /analytics/export/
pub async fn export_csv(
    State(state): State<AppState>,
    Query(params): Query<AnalyticsParams>,
) -> Result<Response, AppError> {
    let range = range_for(&params);

    let (total, count) = state.db.revenue_totals(&range).await?;
    let summary = summarize(total, count);
    let invoices = state.db.invoices_in_range(&range).await?;

    let bytes = write_csv(&summary, &range, &invoices)?;
    EXPORTS_TOTAL.inc();

    tracing::info!(
        range = %range.describe(),
        rows = invoices.len(),
        "Analytics export generated"
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", export_filename(&range)),
            ),
        ],
        bytes,
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn point(label: &str, revenue: &str) -> MonthlyRevenue {
        MonthlyRevenue {
            label: label.to_string(),
            month_start: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
            revenue: Decimal::from_str(revenue).unwrap(),
        }
    }

    #[test]
    fn bars_scale_to_peak_month() {
        let bars = TrendBar::from_trend(&[point("Jan 2026", "50.00"), point("Feb 2026", "200.00")]);
        assert_eq!(bars[0].percent, 25);
        assert_eq!(bars[1].percent, 100);
        assert_eq!(bars[1].revenue, "200.00");
    }

    #[test]
    fn empty_trend_has_flat_bars() {
        let bars = TrendBar::from_trend(&[point("Jan 2026", "0")]);
        assert_eq!(bars[0].percent, 0);
    }

    #[test]
    fn export_query_mirrors_selection() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 17).unwrap();
        let by_period = resolve_range(Some("this_year"), None, None, today);
        assert_eq!(export_query(&by_period), "?period=this_year");

        let by_dates = resolve_range(None, NaiveDate::from_ymd_opt(2026, 1, 1), None, today);
        assert_eq!(export_query(&by_dates), "?date_from=2026-01-01");

        let all = resolve_range(None, None, None, today);
        assert_eq!(export_query(&all), "");
    }
}
