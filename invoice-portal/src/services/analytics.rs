//! Revenue analytics: range resolution, trend assembly and CSV export.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use service_core::error::AppError;

use crate::models::{month_end, month_start, DateRange, Invoice, MonthlyRevenue, RevenueSummary};
use crate::services::money::{average, format_money, round_money, vat_for};

/// Number of points in the monthly trend.
pub const TREND_MONTHS: u32 = 6;

/// Number of clients in the top-clients table.
pub const TOP_CLIENTS: i64 = 5;

const BOM: &str = "\u{FEFF}";
const CSV_HEADER: [&str; 7] = [
    "Date",
    "Invoice Number",
    "Client",
    "Reference",
    "Amount",
    "VAT",
    "Total",
];

/// Resolve the active reporting range from a period keyword or explicit
/// dates as seen on `today`.
pub fn resolve_range(
    period: Option<&str>,
    date_from: Option<NaiveDate>,
    date_to: Option<NaiveDate>,
    today: NaiveDate,
) -> DateRange {
    DateRange::resolve(period, date_from, date_to, today)
}

/// First days of the current month and the five before it, oldest first.
pub fn trend_months(today: NaiveDate) -> Vec<NaiveDate> {
    (0..TREND_MONTHS)
        .rev()
        .map(|back| month_start(today, back))
        .collect()
}

/// Inclusive date bounds of the trend: the first day of the oldest month
/// through the last day of the current month.
pub fn trend_window(today: NaiveDate) -> (NaiveDate, NaiveDate) {
    (
        month_start(today, TREND_MONTHS - 1),
        month_end(month_start(today, 0)),
    )
}

/// "May 2026"
pub fn month_label(first: NaiveDate) -> String {
    first.format("%b %Y").to_string()
}

/// Lay per-month sums onto the fixed trend window. Months without invoices
/// get zero; sums outside the window are ignored.
pub fn build_trend(today: NaiveDate, sums: &[(NaiveDate, Decimal)]) -> Vec<MonthlyRevenue> {
    trend_months(today)
        .into_iter()
        .map(|first| {
            let revenue = sums
                .iter()
                .filter(|(month, _)| month_start(*month, 0) == first)
                .map(|(_, amount)| *amount)
                .sum::<Decimal>();
            MonthlyRevenue {
                label: month_label(first),
                month_start: first,
                revenue: round_money(revenue),
            }
        })
        .collect()
}

/// Totals derived from the summed amount and record count of a range.
pub fn summarize(total_revenue: Decimal, invoice_count: i64) -> RevenueSummary {
    RevenueSummary {
        total_revenue: round_money(total_revenue),
        total_vat: vat_for(total_revenue),
        invoice_count,
        average_invoice: average(total_revenue, invoice_count),
    }
}

/// Export filename for `range`, e.g. `revenue_this_month.csv`.
pub fn export_filename(range: &DateRange) -> String {
    format!("revenue_{}.csv", range.file_tag())
}

/// Write the analytics export: byte-order mark, summary block, a blank line,
/// then one row per invoice in the order given.
pub fn write_csv(
    summary: &RevenueSummary,
    range: &DateRange,
    invoices: &[Invoice],
) -> Result<Vec<u8>, AppError> {
    let mut buf: Vec<u8> = Vec::with_capacity(256 + invoices.len() * 96);
    buf.extend_from_slice(BOM.as_bytes());

    {
        let mut writer = csv_builder().from_writer(&mut buf);
        let rows: [[String; 2]; 6] = [
            ["Revenue Report".to_string(), String::new()],
            ["Period".to_string(), range.describe()],
            ["Total Revenue".to_string(), format_money(summary.total_revenue)],
            ["Total VAT".to_string(), format_money(summary.total_vat)],
            ["Invoice Count".to_string(), summary.invoice_count.to_string()],
            ["Average Invoice".to_string(), format_money(summary.average_invoice)],
        ];
        for row in rows.iter() {
            if row[1].is_empty() {
                writer.write_record([row[0].as_str()]).map_err(csv_error)?;
            } else {
                writer.write_record(row).map_err(csv_error)?;
            }
        }
        writer.flush()?;
    }

    buf.extend_from_slice(b"\r\n");

    {
        let mut writer = csv_builder().from_writer(&mut buf);
        writer.write_record(CSV_HEADER).map_err(csv_error)?;
        for invoice in invoices {
            writer
                .write_record([
                    invoice.date.to_string(),
                    invoice.invoice_number.to_string(),
                    invoice.client_name.clone(),
                    invoice.reference_no.clone(),
                    format_money(invoice.amount),
                    format_money(invoice.vat_amount()),
                    format_money(invoice.total_with_vat()),
                ])
                .map_err(csv_error)?;
        }
        writer.flush()?;
    }

    Ok(buf)
}

fn csv_builder() -> csv::WriterBuilder {
    let mut builder = csv::WriterBuilder::new();
    builder.flexible(true).terminator(csv::Terminator::CRLF);
    builder
}

fn csv_error(e: csv::Error) -> AppError {
    AppError::InternalError(anyhow::anyhow!("Failed to write CSV: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::str::FromStr;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    fn invoice(number: i64, client: &str, date: NaiveDate, amount: &str) -> Invoice {
        Invoice {
            id: number,
            invoice_number: number,
            client_name: client.to_string(),
            reference_no: format!("REF-{}", number),
            date,
            subject: "Works".to_string(),
            address: "Dubai".to_string(),
            mobile_number: "0500000000".to_string(),
            amount: dec(amount),
            work_description: "Works".to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn trend_covers_six_months_oldest_first() {
        let months = trend_months(d(2026, 2, 10));
        assert_eq!(
            months,
            vec![
                d(2025, 9, 1),
                d(2025, 10, 1),
                d(2025, 11, 1),
                d(2025, 12, 1),
                d(2026, 1, 1),
                d(2026, 2, 1),
            ]
        );
    }

    #[test]
    fn trend_window_spans_whole_months() {
        assert_eq!(
            trend_window(d(2026, 10, 17)),
            (d(2026, 5, 1), d(2026, 10, 31))
        );
        assert_eq!(
            trend_window(d(2024, 2, 3)),
            (d(2023, 9, 1), d(2024, 2, 29))
        );
    }

    #[test]
    fn trend_fills_missing_months_with_zero() {
        let trend = build_trend(
            d(2026, 10, 17),
            &[
                (d(2026, 10, 1), dec("100.00")),
                (d(2026, 7, 1), dec("250.50")),
                (d(2025, 1, 1), dec("999.00")),
            ],
        );

        assert_eq!(trend.len(), 6);
        assert_eq!(trend[0].label, "May 2026");
        assert_eq!(trend[5].label, "Oct 2026");
        assert_eq!(trend[2].revenue, dec("250.50"));
        assert_eq!(trend[5].revenue, dec("100.00"));
        assert_eq!(trend[1].revenue, Decimal::ZERO);
        let total: Decimal = trend.iter().map(|p| p.revenue).sum();
        assert_eq!(total, dec("350.50"));
    }

    #[test]
    fn summary_derives_vat_and_average() {
        let summary = summarize(dec("3000.00"), 3);
        assert_eq!(summary.total_vat, dec("150.00"));
        assert_eq!(summary.average_invoice, dec("1000.00"));

        let empty = summarize(Decimal::ZERO, 0);
        assert_eq!(empty.average_invoice, Decimal::ZERO);
        assert_eq!(empty.total_vat, Decimal::ZERO);
    }

    #[test]
    fn csv_starts_with_bom_and_summary() {
        let range = resolve_range(Some("this_month"), None, None, d(2026, 10, 17));
        let invoices = vec![
            invoice(10000, "Acme, LLC", d(2026, 10, 2), "1000.00"),
            invoice(10001, "Zenith", d(2026, 10, 5), "123.45"),
        ];
        let summary = summarize(dec("1123.45"), 2);

        let bytes = write_csv(&summary, &range, &invoices).unwrap();
        let text = String::from_utf8(bytes).unwrap();

        assert!(text.starts_with('\u{FEFF}'));
        let lines: Vec<&str> = text.trim_start_matches('\u{FEFF}').split("\r\n").collect();
        assert_eq!(lines[0], "Revenue Report");
        assert_eq!(lines[1], "Period,2026-10-01 to 2026-10-17");
        assert_eq!(lines[2], "Total Revenue,1123.45");
        assert_eq!(lines[3], "Total VAT,56.17");
        assert_eq!(lines[4], "Invoice Count,2");
        assert_eq!(lines[5], "Average Invoice,561.72");
        assert_eq!(lines[6], "");
        assert_eq!(lines[7], "Date,Invoice Number,Client,Reference,Amount,VAT,Total");
        assert_eq!(
            lines[8],
            "2026-10-02,10000,\"Acme, LLC\",REF-10000,1000.00,50.00,1050.00"
        );
        assert_eq!(lines[9], "2026-10-05,10001,Zenith,REF-10001,123.45,6.17,129.62");
    }

    #[test]
    fn export_filename_reflects_range() {
        let range = resolve_range(None, Some(d(2026, 1, 1)), Some(d(2026, 3, 31)), d(2026, 10, 17));
        assert_eq!(export_filename(&range), "revenue_2026-01-01_2026-03-31.csv");
        let period = resolve_range(Some("last_month"), None, None, d(2026, 10, 17));
        assert_eq!(export_filename(&period), "revenue_last_month.csv");
    }
}
