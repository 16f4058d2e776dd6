//! API route handlers for the gateway.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
};
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::Deserialize;
use serde_json::{Value, json};

use callagent_core::stats::{calculate_daily_stats, reports_for_day};
use callagent_core::{AppSettings, CallAgentError, CallReport, RejectionReason};

use super::server::AppState;

type ApiResponse = (StatusCode, Json<Value>);

fn ok(body: Value) -> ApiResponse {
    (StatusCode::OK, Json(body))
}

/// Map an error to a status code and `{"ok": false}` body.
fn error_response(e: &CallAgentError) -> ApiResponse {
    let status = match e {
        CallAgentError::Validation(_) => StatusCode::BAD_REQUEST,
        CallAgentError::Delivery(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({"ok": false, "error": e.to_string()})))
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// `?date=` filter shared by the report and stats endpoints.
#[derive(Debug, Deserialize)]
pub struct DayQuery {
    /// `YYYY-MM-DD`, `all`, or absent for today.
    pub date: Option<String>,
}

enum DayScope {
    Day(NaiveDate),
    All,
}

impl DayQuery {
    fn scope(&self, today: NaiveDate) -> Result<DayScope, CallAgentError> {
        match self.date.as_deref().map(str::trim) {
            None | Some("") | Some("today") => Ok(DayScope::Day(today)),
            Some("all") => Ok(DayScope::All),
            Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map(DayScope::Day)
                .map_err(|_| CallAgentError::validation(format!("invalid date '{s}' (expected YYYY-MM-DD or all)"))),
        }
    }

    fn select(&self, all: Vec<CallReport>, today: NaiveDate) -> Result<(String, Vec<CallReport>), CallAgentError> {
        Ok(match self.scope(today)? {
            DayScope::All => ("all".to_string(), all),
            DayScope::Day(day) => (day.to_string(), reports_for_day(&all, day)),
        })
    }
}

/// Health check endpoint.
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "callagent",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "storage": state.service.store().backend_name(),
    }))
}

// ---- Reports ----

pub async fn list_reports(State(state): State<Arc<AppState>>, Query(query): Query<DayQuery>) -> ApiResponse {
    let all = state.service.store().get_reports();
    match query.select(all, local_now().date()) {
        Ok((date, reports)) => ok(json!({"ok": true, "date": date, "count": reports.len(), "reports": reports})),
        Err(e) => error_response(&e),
    }
}

/// Body of a report submission.
#[derive(Debug, Deserialize)]
pub struct NewReport {
    pub donation_closed: bool,
    #[serde(default)]
    pub rejection_reason: Option<RejectionReason>,
}

/// Record a call outcome and forward it to the configured webhooks.
pub async fn create_report(State(state): State<Arc<AppState>>, Json(body): Json<NewReport>) -> ApiResponse {
    match state
        .service
        .submit_report(body.donation_closed, body.rejection_reason, local_now())
        .await
    {
        Ok((report, delivery)) => (
            StatusCode::CREATED,
            Json(json!({"ok": true, "report": report, "delivery": delivery})),
        ),
        Err(e) => error_response(&e),
    }
}

/// Bulk clear. Settings and the last-sent date survive.
pub async fn clear_reports(State(state): State<Arc<AppState>>) -> ApiResponse {
    match state.service.store().clear_reports() {
        Ok(()) => {
            tracing::info!("🗑️ All reports cleared");
            ok(json!({"ok": true}))
        }
        Err(e) => error_response(&e),
    }
}

// ---- Stats & summary ----

pub async fn get_stats(State(state): State<Arc<AppState>>, Query(query): Query<DayQuery>) -> ApiResponse {
    let all = state.service.store().get_reports();
    let (date, reports) = match query.select(all, local_now().date()) {
        Ok(selected) => selected,
        Err(e) => return error_response(&e),
    };
    match calculate_daily_stats(&reports) {
        Some(stats) => ok(json!({
            "ok": true,
            "date": date,
            "top_rejection_reason": stats.main_difficulty.label(),
            "conversion_rate": stats.conversion_rate(),
            "stats": stats,
        })),
        None => ok(json!({"ok": true, "date": date, "stats": null})),
    }
}

/// Manual "send daily report" action.
pub async fn send_summary(State(state): State<Arc<AppState>>) -> ApiResponse {
    match state.service.send_daily_summary(local_now(), false).await {
        Ok(delivery) => ok(json!({"ok": true, "delivery": delivery})),
        Err(e) => {
            tracing::warn!("⚠️ Manual daily summary failed: {e}");
            error_response(&e)
        }
    }
}

// ---- Settings ----

pub async fn get_settings(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({"ok": true, "settings": state.service.store().get_settings()}))
}

/// Overwrite settings wholesale and reschedule the daily summary.
pub async fn update_settings(State(state): State<Arc<AppState>>, Json(settings): Json<AppSettings>) -> ApiResponse {
    match state.service.store().save_settings(&settings) {
        Ok(()) => {
            state.engine.reschedule();
            tracing::info!("⚙️ Settings saved (report time {})", settings.daily_report_time);
            ok(json!({"ok": true, "settings": settings}))
        }
        Err(e) => error_response(&e),
    }
}

/// Send a test payload using the submitted (possibly unsaved) settings.
pub async fn test_connection(State(state): State<Arc<AppState>>, Json(settings): Json<AppSettings>) -> ApiResponse {
    match state.service.test_connection(&settings).await {
        Ok(delivery) => ok(json!({"ok": delivery.any_delivered(), "delivery": delivery})),
        Err(e) => error_response(&e),
    }
}

// ---- Scheduler ----

pub async fn scheduler_status(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({"ok": true, "scheduler": state.engine.status(local_now())}))
}

/// Recent webhook deliveries, newest first.
pub async fn list_deliveries(State(state): State<Arc<AppState>>) -> Json<Value> {
    let mut history = state.service.history();
    history.reverse();
    Json(json!({"ok": true, "count": history.len(), "deliveries": history}))
}
