//! Outbound webhook bodies. All payloads are flat JSON objects so that
//! spreadsheet-style automations can map fields one-to-one.

use std::fmt::Write;

use chrono::{DateTime, Local, NaiveDate};
use serde_json::{Value, json};

use crate::error::{CallAgentError, Result};
use crate::model::{AppSettings, CallReport};
use crate::stats::DailySummary;

/// Default `chrono` format for the `date` field (day.month.year).
pub const DEFAULT_DATE_FORMAT: &str = "%-d.%-m.%Y";

const TEST_AGENT: &str = "נציג בדיקה";
const TEST_MESSAGE: &str = "בדיקת תקשורת מוצלחת מהמערכת - CallAgent Pro";
const TEST_REASON: &str = "בדיקה";

/// Render `day` with a user-supplied `chrono` format. Unknown specifiers and
/// time fields a date cannot supply are errors instead of panics.
pub fn format_date(day: NaiveDate, format: &str) -> Result<String> {
    let mut out = String::new();
    write!(out, "{}", day.format(format))
        .map_err(|_| CallAgentError::Config(format!("invalid date format '{format}'")))?;
    Ok(out)
}

/// `daily_summary` payload. `auto_generated` is only emitted for scheduler sends.
pub fn daily_summary(
    summary: &DailySummary,
    settings: &AppSettings,
    day: NaiveDate,
    date_format: &str,
    auto_generated: bool,
) -> Value {
    let counts = &summary.rejection_counts;
    let mut body = json!({
        "type": "daily_summary",
        "agent_name": settings.agent_display_name(),
        "date": summary_date(day, date_format),
        "total_calls": summary.total,
        "total_sales": summary.closed_total,
        "failed_total": summary.failed_total,
        "conversion_rate": summary.conversion_rate(),
        "top_rejection_reason": summary.main_difficulty.label(),
        "count_no_credit": counts.no_credit,
        "count_no_money": counts.no_money,
        "count_not_interested": counts.not_interested,
        "count_other": counts.other,
    });
    if auto_generated {
        body["auto_generated"] = Value::Bool(true);
    }
    body
}

fn summary_date(day: NaiveDate, date_format: &str) -> String {
    format_date(day, date_format).unwrap_or_else(|e| {
        tracing::warn!("⚠️ {e}, using {DEFAULT_DATE_FORMAT}");
        day.format(DEFAULT_DATE_FORMAT).to_string()
    })
}

/// `single_call` payload: every report field except the internal id.
pub fn single_call(report: &CallReport) -> Value {
    json!({
        "type": "single_call",
        "agent_name": report.agent_name,
        "donation_closed": report.donation_closed,
        "rejection_reason": report.rejection_reason,
        "timestamp": report.timestamp,
    })
}

/// `test_connection` payload: summary-shaped, zero-filled.
pub fn test_connection(settings: &AppSettings, now: DateTime<Local>) -> Value {
    let agent = settings.agent_name.trim();
    json!({
        "type": "test_connection",
        "message": TEST_MESSAGE,
        "agent_name": if agent.is_empty() { TEST_AGENT } else { agent },
        "timestamp": now.to_rfc3339(),
        "total_calls": 0,
        "total_sales": 0,
        "failed_total": 0,
        "conversion_rate": "0%",
        "top_rejection_reason": TEST_REASON,
        "count_no_credit": 0,
        "count_no_money": 0,
        "count_not_interested": 0,
        "count_other": 0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RejectionReason;
    use crate::stats::calculate_daily_stats;
    use chrono::NaiveDateTime;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn test_daily_summary_fields() {
        let reports = vec![
            CallReport::new(None, true, None, at("2026-10-18 09:00")).unwrap(),
            CallReport::new(None, false, Some(RejectionReason::NoCredit), at("2026-10-18 09:10")).unwrap(),
        ];
        let summary = calculate_daily_stats(&reports).unwrap();
        let settings = AppSettings {
            agent_name: "Yael".into(),
            ..Default::default()
        };
        let day = NaiveDate::from_ymd_opt(2026, 10, 8).unwrap();

        let body = daily_summary(&summary, &settings, day, DEFAULT_DATE_FORMAT, false);
        assert_eq!(body["type"], "daily_summary");
        assert_eq!(body["agent_name"], "Yael");
        assert_eq!(body["date"], "8.10.2026");
        assert_eq!(body["total_calls"], 2);
        assert_eq!(body["total_sales"], 1);
        assert_eq!(body["failed_total"], 1);
        assert_eq!(body["conversion_rate"], "50%");
        assert_eq!(body["top_rejection_reason"], "אין אשראי");
        assert_eq!(body["count_no_credit"], 1);
        assert_eq!(body["count_other"], 0);
        assert!(body.get("auto_generated").is_none());

        let auto = daily_summary(&summary, &settings, day, DEFAULT_DATE_FORMAT, true);
        assert_eq!(auto["auto_generated"], true);
    }

    #[test]
    fn test_bad_date_format_falls_back() {
        let reports = vec![CallReport::new(None, true, None, at("2026-10-18 09:00")).unwrap()];
        let summary = calculate_daily_stats(&reports).unwrap();
        let day = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();

        for format in ["%Q", "%H:%M"] {
            assert!(format_date(day, format).is_err());
            let body = daily_summary(&summary, &AppSettings::default(), day, format, false);
            assert_eq!(body["date"], "18.10.2026");
        }
        assert_eq!(format_date(day, "%Y-%m-%d").unwrap(), "2026-10-18");
    }

    #[test]
    fn test_single_call_omits_id() {
        let report = CallReport::new(Some("Avi".into()), false, Some(RejectionReason::Other), at("2026-10-18 11:30")).unwrap();
        let body = single_call(&report);
        assert_eq!(body["type"], "single_call");
        assert_eq!(body["rejection_reason"], "other");
        assert_eq!(body["timestamp"], "2026-10-18 11:30");
        assert!(body.get("id").is_none());
    }

    #[test]
    fn test_connection_payload_is_zero_filled() {
        let body = test_connection(&AppSettings::default(), Local::now());
        assert_eq!(body["type"], "test_connection");
        assert_eq!(body["agent_name"], TEST_AGENT);
        assert_eq!(body["total_calls"], 0);
        assert_eq!(body["conversion_rate"], "0%");
        assert_eq!(body["count_not_interested"], 0);
    }
}
