//! Daily report engine: sleeps until the next fire time and sends at most one
//! automatic summary per calendar day.
//!
//! The last-sent date in the store is the only de-duplication state, shared
//! with manual sends from the API.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use serde::Serialize;
use tokio::sync::Notify;

use callagent_core::stats::reports_for_day;

use crate::schedule::{self, Decision, Gate, SkipReason};
use crate::service::CallAgentService;

/// Longest single sleep. Bounds drift from wall-clock jumps (DST, suspend).
const MAX_SLEEP: Duration = Duration::from_secs(3600);

/// What one evaluation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum TickOutcome {
    Skipped { reason: SkipReason },
    Sent { delivered: usize, attempted: usize },
    Failed { error: String },
    /// Stored report time does not parse.
    Misconfigured { error: String },
}

/// Snapshot for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub daily_report_time: String,
    pub next_fire: Option<NaiveDateTime>,
    pub last_sent: Option<chrono::NaiveDate>,
    pub catch_up: bool,
    pub last_tick: Option<(NaiveDateTime, TickOutcome)>,
}

/// The scheduler engine.
pub struct DailyReportEngine {
    service: Arc<CallAgentService>,
    catch_up: bool,
    wake: Notify,
    last_tick: Mutex<Option<(NaiveDateTime, TickOutcome)>>,
}

impl DailyReportEngine {
    pub fn new(service: Arc<CallAgentService>, catch_up: bool) -> Self {
        Self {
            service,
            catch_up,
            wake: Notify::new(),
            last_tick: Mutex::new(None),
        }
    }

    /// Re-read settings and recompute the next fire time.
    pub fn reschedule(&self) {
        self.wake.notify_one();
    }

    /// When the next evaluation will happen, given `now`.
    pub fn next_fire_at(&self, now: NaiveDateTime) -> Option<NaiveDateTime> {
        let store = self.service.store();
        let time = store.get_settings().report_time().ok()?;
        Some(schedule::next_fire(now, time, store.last_daily_report_date(), self.catch_up))
    }

    pub fn status(&self, now: NaiveDateTime) -> SchedulerStatus {
        let store = self.service.store();
        SchedulerStatus {
            daily_report_time: store.get_settings().daily_report_time,
            next_fire: self.next_fire_at(now),
            last_sent: store.last_daily_report_date(),
            catch_up: self.catch_up,
            last_tick: self.last_tick.lock().ok().and_then(|t| t.clone()),
        }
    }

    /// Evaluate the gate at `now` and send if due. Failures are logged and
    /// swallowed; they never mark the day as sent.
    pub async fn tick_at(&self, now: NaiveDateTime) -> TickOutcome {
        let outcome = self.evaluate_and_send(now).await;
        if let Ok(mut last) = self.last_tick.lock() {
            *last = Some((now, outcome.clone()));
        }
        outcome
    }

    async fn evaluate_and_send(&self, now: NaiveDateTime) -> TickOutcome {
        let store = self.service.store();
        let settings = store.get_settings();
        let time = match settings.report_time() {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("⚠️ Daily report time unusable: {e}");
                return TickOutcome::Misconfigured { error: e.to_string() };
            }
        };

        let gate = Gate {
            time,
            last_sent: store.last_daily_report_date(),
            has_endpoints: !settings.endpoints().is_empty(),
            reports_today: reports_for_day(&store.get_reports(), now.date()).len(),
            catch_up: self.catch_up,
        };

        match schedule::evaluate(now, &gate) {
            Decision::Skip(reason) => {
                tracing::debug!("⏭️ Daily summary skipped at {now}: {reason:?}");
                TickOutcome::Skipped { reason }
            }
            Decision::Send => {
                tracing::info!("🔔 Daily summary due at {}", now.format("%H:%M"));
                match self.service.send_daily_summary(now, true).await {
                    Ok(delivery) => TickOutcome::Sent {
                        delivered: delivery.delivered_count(),
                        attempted: delivery.outcomes.len(),
                    },
                    Err(e) => {
                        tracing::warn!("⚠️ Auto daily summary failed: {e}");
                        TickOutcome::Failed { error: e.to_string() }
                    }
                }
            }
        }
    }
}

fn local_now() -> NaiveDateTime {
    Local::now().naive_local()
}

/// Scheduler loop. Never returns; run it with `tokio::spawn` and abort the
/// task to stop it.
pub async fn run_scheduler(engine: Arc<DailyReportEngine>) {
    tracing::info!("⏰ Daily report scheduler started (catch_up={})", engine.catch_up);

    loop {
        let now = local_now();
        let Some(fire_at) = engine.next_fire_at(now) else {
            // Bad report time: wait for a settings change.
            tokio::select! {
                _ = engine.wake.notified() => {}
                _ = tokio::time::sleep(MAX_SLEEP) => {}
            }
            continue;
        };

        let wait = (fire_at - now).to_std().unwrap_or_default().min(MAX_SLEEP);
        tracing::debug!("⏰ Next daily summary check at {fire_at} (sleeping {}s)", wait.as_secs());

        tokio::select! {
            _ = engine.wake.notified() => {
                tracing::debug!("⏰ Settings changed, rescheduling");
            }
            _ = tokio::time::sleep(wait) => {
                let now = local_now();
                if now >= fire_at {
                    let outcome = engine.tick_at(now).await;
                    tracing::debug!("⏰ Tick outcome: {outcome:?}");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::tests::{RecordingDeliver, at, configured_store};
    use callagent_core::RejectionReason;
    use callagent_core::payload::DEFAULT_DATE_FORMAT;
    use callagent_store::CallStore;

    fn engine_with(store: Arc<CallStore>, deliver: Arc<RecordingDeliver>, catch_up: bool) -> DailyReportEngine {
        let service = Arc::new(CallAgentService::new(store, deliver, DEFAULT_DATE_FORMAT));
        DailyReportEngine::new(service, catch_up)
    }

    fn seed(store: &CallStore, when: &str) {
        let report = callagent_core::CallReport::new(
            None,
            false,
            Some(RejectionReason::NotInterested),
            at(when),
        )
        .unwrap();
        store.save_report(report).unwrap();
    }

    #[tokio::test]
    async fn test_sends_once_at_report_time() {
        let store = configured_store();
        store.set_last_daily_report_date(at("2026-10-17 17:00:00").date()).unwrap();
        seed(&store, "2026-10-18 11:00:00");
        let deliver = Arc::new(RecordingDeliver::default());
        let engine = engine_with(store.clone(), deliver.clone(), false);

        let now = at("2026-10-18 17:00:00");
        assert_eq!(engine.tick_at(now).await, TickOutcome::Sent { delivered: 1, attempted: 1 });
        assert_eq!(store.last_daily_report_date(), Some(now.date()));
        {
            let sent = deliver.sent.lock().unwrap();
            assert_eq!(sent.len(), 1);
            assert_eq!(sent[0]["auto_generated"], true);
        }

        // A second tick in the same minute is de-duplicated.
        assert_eq!(
            engine.tick_at(at("2026-10-18 17:00:40")).await,
            TickOutcome::Skipped { reason: SkipReason::AlreadySent }
        );
        assert_eq!(deliver.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_already_sent_today_is_skipped() {
        let store = configured_store();
        store.set_last_daily_report_date(at("2026-10-18 08:00:00").date()).unwrap();
        seed(&store, "2026-10-18 11:00:00");
        let deliver = Arc::new(RecordingDeliver::default());
        let engine = engine_with(store, deliver.clone(), false);

        let outcome = engine.tick_at(at("2026-10-18 17:00:00")).await;
        assert_eq!(outcome, TickOutcome::Skipped { reason: SkipReason::AlreadySent });
        assert!(deliver.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_no_reports_today_is_skipped() {
        let store = configured_store();
        seed(&store, "2026-10-17 11:00:00");
        let engine = engine_with(store, Arc::new(RecordingDeliver::default()), false);
        assert_eq!(
            engine.tick_at(at("2026-10-18 17:00:00")).await,
            TickOutcome::Skipped { reason: SkipReason::NoReports }
        );
    }

    #[tokio::test]
    async fn test_failed_send_is_swallowed_and_not_retried() {
        let store = configured_store();
        seed(&store, "2026-10-18 11:00:00");
        let deliver = Arc::new(RecordingDeliver {
            fail: true,
            ..Default::default()
        });
        let engine = engine_with(store.clone(), deliver, false);

        let now = at("2026-10-18 17:00:00");
        assert!(matches!(engine.tick_at(now).await, TickOutcome::Failed { .. }));
        assert!(store.last_daily_report_date().is_none());
        // Without catch-up the next chance is tomorrow.
        assert_eq!(engine.next_fire_at(now), Some(at("2026-10-19 17:00:00")));
    }

    #[tokio::test]
    async fn test_catch_up_sends_after_missed_minute() {
        let store = configured_store();
        seed(&store, "2026-10-18 11:00:00");
        let deliver = Arc::new(RecordingDeliver::default());
        let engine = engine_with(store.clone(), deliver.clone(), true);

        let late = at("2026-10-18 18:12:05");
        assert_eq!(engine.next_fire_at(late), Some(at("2026-10-18 18:13:00")));
        assert!(matches!(engine.tick_at(late).await, TickOutcome::Sent { .. }));
        assert_eq!(engine.next_fire_at(late), Some(at("2026-10-19 17:00:00")));
    }

    #[tokio::test]
    async fn test_run_scheduler_survives_reschedule() {
        let engine = Arc::new(engine_with(configured_store(), Arc::new(RecordingDeliver::default()), false));
        let handle = tokio::spawn(run_scheduler(engine.clone()));

        tokio::time::sleep(Duration::from_millis(20)).await;
        engine.reschedule();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!handle.is_finished());

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_status_reports_last_tick() {
        let store = configured_store();
        let engine = engine_with(store, Arc::new(RecordingDeliver::default()), false);
        let now = at("2026-10-18 09:00:00");
        engine.tick_at(now).await;

        let status = engine.status(now);
        assert_eq!(status.daily_report_time, "17:00");
        assert_eq!(status.next_fire, Some(at("2026-10-18 17:00:00")));
        assert_eq!(
            status.last_tick,
            Some((now, TickOutcome::Skipped { reason: SkipReason::NotDue }))
        );
    }
}
