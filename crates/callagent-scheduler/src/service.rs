//! User-facing operations shared by the HTTP API, the CLI, and the scheduler:
//! submitting a report, sending the daily summary, and testing webhooks.

use std::sync::{Arc, Mutex};

use chrono::{Local, NaiveDateTime};
use serde_json::Value;

use callagent_core::stats::{calculate_daily_stats, reports_for_day};
use callagent_core::{AppSettings, CallAgentError, CallReport, RejectionReason, Result, payload};
use callagent_store::CallStore;

use crate::dispatch::{Deliver, DeliveryLog, DeliveryRecord, DeliveryReport};

/// Store + dispatcher + delivery history.
pub struct CallAgentService {
    store: Arc<CallStore>,
    dispatcher: Arc<dyn Deliver>,
    history: Mutex<DeliveryLog>,
    date_format: String,
}

impl CallAgentService {
    pub fn new(store: Arc<CallStore>, dispatcher: Arc<dyn Deliver>, date_format: &str) -> Self {
        Self {
            store,
            dispatcher,
            history: Mutex::new(DeliveryLog::new()),
            date_format: date_format.to_string(),
        }
    }

    pub fn store(&self) -> &Arc<CallStore> {
        &self.store
    }

    /// Snapshot of recent deliveries, oldest first.
    pub fn history(&self) -> Vec<DeliveryRecord> {
        match self.history.lock() {
            Ok(log) => log.history().to_vec(),
            Err(_) => Vec::new(),
        }
    }

    async fn deliver(&self, settings: &AppSettings, body: Value, auto_generated: bool) -> DeliveryReport {
        let report = self.dispatcher.deliver(&settings.endpoints(), &body).await;
        let kind = body["type"].as_str().unwrap_or("unknown").to_string();
        if let Ok(mut log) = self.history.lock() {
            log.record(DeliveryRecord {
                kind,
                auto_generated,
                at: Local::now(),
                report: report.clone(),
            });
        }
        report
    }

    /// Record a call outcome and forward it as a `single_call` event.
    ///
    /// Forwarding is best effort: the report is saved even when every
    /// endpoint fails.
    pub async fn submit_report(
        &self,
        donation_closed: bool,
        rejection_reason: Option<RejectionReason>,
        now: NaiveDateTime,
    ) -> Result<(CallReport, Option<DeliveryReport>)> {
        let settings = self.store.get_settings();
        let report = CallReport::new(
            Some(settings.agent_display_name().to_string()),
            donation_closed,
            rejection_reason,
            now,
        )?;
        self.store.save_report(report.clone())?;
        tracing::info!(
            "📞 Call recorded: closed={} reason={}",
            report.donation_closed,
            report.rejection_reason.map(|r| r.key()).unwrap_or("-")
        );

        if settings.endpoints().is_empty() {
            return Ok((report, None));
        }
        let delivery = self.deliver(&settings, payload::single_call(&report), false).await;
        Ok((report, Some(delivery)))
    }

    /// Send today's summary to every endpoint.
    ///
    /// Marks the day as sent when at least one endpoint accepted the payload.
    /// Fails when nothing is configured, there is nothing to report, or every
    /// endpoint failed.
    pub async fn send_daily_summary(&self, now: NaiveDateTime, auto_generated: bool) -> Result<DeliveryReport> {
        let settings = self.store.get_settings();
        if settings.endpoints().is_empty() {
            return Err(CallAgentError::validation("no webhook endpoint configured"));
        }

        let today = now.date();
        let reports = reports_for_day(&self.store.get_reports(), today);
        let summary = calculate_daily_stats(&reports)
            .ok_or_else(|| CallAgentError::validation(format!("no reports recorded on {today}")))?;

        let body = payload::daily_summary(&summary, &settings, today, &self.date_format, auto_generated);
        let delivery = self.deliver(&settings, body, auto_generated).await;

        if !delivery.any_delivered() {
            return Err(CallAgentError::Delivery(delivery.failures()));
        }
        if let Err(e) = self.store.set_last_daily_report_date(today) {
            // The summary is out; a failed mark may cause one duplicate send.
            tracing::error!("❌ Summary sent but last-sent date not saved: {e}");
        }
        tracing::info!(
            "📊 Daily summary sent: {} calls, {}% closed, {}/{} endpoints",
            summary.total,
            summary.closed_rate,
            delivery.delivered_count(),
            delivery.outcomes.len()
        );
        Ok(delivery)
    }

    /// Post a zero-filled `test_connection` payload using `settings`, which
    /// need not be saved yet.
    pub async fn test_connection(&self, settings: &AppSettings) -> Result<DeliveryReport> {
        settings.validate()?;
        if settings.endpoints().is_empty() {
            return Err(CallAgentError::validation("no webhook endpoint configured"));
        }
        let body = payload::test_connection(settings, Local::now());
        Ok(self.deliver(settings, body, false).await)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::dispatch::EndpointOutcome;
    use async_trait::async_trait;
    use callagent_core::Endpoints;

    /// Records payloads instead of sending them.
    #[derive(Default)]
    pub(crate) struct RecordingDeliver {
        pub sent: Mutex<Vec<Value>>,
        pub fail: bool,
    }

    #[async_trait]
    impl Deliver for RecordingDeliver {
        async fn deliver(&self, endpoints: &Endpoints, payload: &Value) -> DeliveryReport {
            self.sent.lock().unwrap().push(payload.clone());
            DeliveryReport {
                outcomes: endpoints
                    .iter()
                    .map(|(name, url)| EndpointOutcome {
                        endpoint: name.to_string(),
                        url: url.to_string(),
                        status: (!self.fail).then_some(200),
                        error: self.fail.then(|| "connection refused".to_string()),
                    })
                    .collect(),
            }
        }
    }

    pub(crate) fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    pub(crate) fn configured_store() -> Arc<CallStore> {
        let store = CallStore::in_memory();
        store
            .save_settings(&AppSettings {
                make_webhook_url: "https://hook.make.test/abc".into(),
                agent_name: "Noa".into(),
                ..Default::default()
            })
            .unwrap();
        Arc::new(store)
    }

    fn service(store: Arc<CallStore>, deliver: Arc<RecordingDeliver>) -> CallAgentService {
        CallAgentService::new(store, deliver, callagent_core::payload::DEFAULT_DATE_FORMAT)
    }

    #[tokio::test]
    async fn test_submit_report_forwards_single_call() {
        let deliver = Arc::new(RecordingDeliver::default());
        let svc = service(configured_store(), deliver.clone());

        let (report, delivery) = svc
            .submit_report(false, Some(RejectionReason::NoCredit), at("2026-10-18 10:15:00"))
            .await
            .unwrap();

        assert_eq!(report.agent_name.as_deref(), Some("Noa"));
        assert!(delivery.unwrap().any_delivered());
        assert_eq!(svc.store().get_reports().len(), 1);
        let sent = deliver.sent.lock().unwrap();
        assert_eq!(sent[0]["type"], "single_call");
        assert_eq!(sent[0]["rejection_reason"], "no_credit");
        assert_eq!(svc.history().len(), 1);
    }

    #[tokio::test]
    async fn test_submit_without_endpoints_only_saves() {
        let deliver = Arc::new(RecordingDeliver::default());
        let svc = service(Arc::new(CallStore::in_memory()), deliver.clone());
        let (report, delivery) = svc.submit_report(true, None, at("2026-10-18 10:15:00")).await.unwrap();
        assert_eq!(report.agent_name.as_deref(), Some(callagent_core::model::UNSET_AGENT));
        assert!(delivery.is_none());
        assert!(deliver.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_submit_rejects_missing_reason() {
        let svc = service(configured_store(), Arc::new(RecordingDeliver::default()));
        assert!(svc.submit_report(false, None, at("2026-10-18 10:15:00")).await.is_err());
        assert!(svc.store().get_reports().is_empty());
    }

    #[tokio::test]
    async fn test_manual_summary_covers_today_and_marks_sent() {
        let deliver = Arc::new(RecordingDeliver::default());
        let store = configured_store();
        let svc = service(store.clone(), deliver.clone());
        svc.submit_report(true, None, at("2026-10-17 12:00:00")).await.unwrap();
        svc.submit_report(true, None, at("2026-10-18 09:00:00")).await.unwrap();
        svc.submit_report(false, Some(RejectionReason::Other), at("2026-10-18 09:30:00")).await.unwrap();

        let now = at("2026-10-18 12:00:00");
        svc.send_daily_summary(now, false).await.unwrap();

        let sent = deliver.sent.lock().unwrap();
        let body = sent.last().unwrap();
        assert_eq!(body["type"], "daily_summary");
        assert_eq!(body["total_calls"], 2);
        assert_eq!(body["conversion_rate"], "50%");
        assert_eq!(body["date"], "18.10.2026");
        assert!(body.get("auto_generated").is_none());
        assert_eq!(store.last_daily_report_date(), Some(now.date()));
    }

    #[tokio::test]
    async fn test_manual_summary_errors() {
        let svc = service(Arc::new(CallStore::in_memory()), Arc::new(RecordingDeliver::default()));
        assert!(matches!(
            svc.send_daily_summary(at("2026-10-18 12:00:00"), false).await,
            Err(CallAgentError::Validation(_))
        ));

        let svc = service(configured_store(), Arc::new(RecordingDeliver::default()));
        assert!(matches!(
            svc.send_daily_summary(at("2026-10-18 12:00:00"), false).await,
            Err(CallAgentError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_delivery_does_not_mark_day() {
        let deliver = Arc::new(RecordingDeliver {
            fail: true,
            ..Default::default()
        });
        let store = configured_store();
        let svc = service(store.clone(), deliver);
        svc.submit_report(true, None, at("2026-10-18 09:00:00")).await.unwrap();

        let result = svc.send_daily_summary(at("2026-10-18 17:00:00"), true).await;
        assert!(matches!(result, Err(CallAgentError::Delivery(_))));
        assert!(store.last_daily_report_date().is_none());
    }

    #[tokio::test]
    async fn test_connection_uses_unsaved_settings() {
        let deliver = Arc::new(RecordingDeliver::default());
        let svc = service(Arc::new(CallStore::in_memory()), deliver.clone());
        let draft = AppSettings {
            zapier_webhook_url: "https://hooks.zapier.test/catch".into(),
            ..Default::default()
        };
        let report = svc.test_connection(&draft).await.unwrap();
        assert_eq!(report.outcomes[0].endpoint, "secondary");
        assert_eq!(deliver.sent.lock().unwrap()[0]["type"], "test_connection");

        assert!(svc.test_connection(&AppSettings::default()).await.is_err());
    }
}
