//! Typed access to the three persisted records.
//!
//! Reads never fail: a missing or unparsable record falls back to its empty
//! or default value and the problem is logged. Writes return errors so the
//! caller can decide whether a failed save matters.

use std::sync::{Mutex, MutexGuard};

use chrono::NaiveDate;
use serde::de::DeserializeOwned;

use callagent_core::{AppSettings, CallAgentError, CallReport, Result};

use crate::backend::KvBackend;

pub const REPORTS_KEY: &str = "call_agent_reports";
pub const SETTINGS_KEY: &str = "call_agent_settings";
pub const LAST_REPORT_DATE_KEY: &str = "call_agent_last_daily_report";

/// Reports, settings, and the last-sent date over an injectable backend.
pub struct CallStore {
    backend: Box<dyn KvBackend>,
    /// Held across the read-modify-write of the report list.
    reports_lock: Mutex<()>,
}

impl CallStore {
    pub fn new(backend: Box<dyn KvBackend>) -> Self {
        Self {
            backend,
            reports_lock: Mutex::new(()),
        }
    }

    /// Store backed by process memory.
    pub fn in_memory() -> Self {
        Self::new(Box::new(crate::backend::MemoryBackend::new()))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.backend.get(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("⚠️ Failed to read {key}: {e}");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("⚠️ Failed to parse {key}: {e}");
                None
            }
        }
    }

    fn lock_reports(&self) -> Result<MutexGuard<'_, ()>> {
        self.reports_lock
            .lock()
            .map_err(|_| CallAgentError::Storage("report list lock poisoned".into()))
    }

    fn write<T: serde::Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.backend.set(key, &json)
    }

    // ─── Reports ──────────────────────────────────────

    /// All reports in submission order.
    pub fn get_reports(&self) -> Vec<CallReport> {
        self.read(REPORTS_KEY).unwrap_or_default()
    }

    /// Append a report and return the updated list.
    pub fn save_report(&self, report: CallReport) -> Result<Vec<CallReport>> {
        report.validate()?;
        let _guard = self.lock_reports()?;
        let mut reports = self.get_reports();
        reports.push(report);
        self.write(REPORTS_KEY, &reports)?;
        Ok(reports)
    }

    /// Remove every report. Settings and the last-sent date are kept.
    pub fn clear_reports(&self) -> Result<()> {
        let _guard = self.lock_reports()?;
        self.backend.remove(REPORTS_KEY)
    }

    // ─── Settings ──────────────────────────────────────

    pub fn get_settings(&self) -> AppSettings {
        self.read(SETTINGS_KEY).unwrap_or_default()
    }

    /// Validate and overwrite the settings singleton.
    pub fn save_settings(&self, settings: &AppSettings) -> Result<()> {
        settings.validate()?;
        self.write(SETTINGS_KEY, settings)
    }

    // ─── Last daily report ──────────────────────────────────────

    pub fn last_daily_report_date(&self) -> Option<NaiveDate> {
        self.read(LAST_REPORT_DATE_KEY)
    }

    pub fn set_last_daily_report_date(&self, day: NaiveDate) -> Result<()> {
        self.write(LAST_REPORT_DATE_KEY, &day)
    }

    /// Wipe all three records.
    pub fn clear_all(&self) -> Result<()> {
        let _guard = self.lock_reports()?;
        self.backend.remove(REPORTS_KEY)?;
        self.backend.remove(SETTINGS_KEY)?;
        self.backend.remove(LAST_REPORT_DATE_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use callagent_core::RejectionReason;
    use chrono::NaiveDateTime;

    fn at(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M").unwrap()
    }

    #[test]
    fn test_reports_append_in_order() {
        let store = CallStore::in_memory();
        assert!(store.get_reports().is_empty());

        let first = CallReport::new(None, true, None, at("2026-10-18 09:00")).unwrap();
        let second =
            CallReport::new(None, false, Some(RejectionReason::NoMoney), at("2026-10-18 09:05")).unwrap();
        store.save_report(first.clone()).unwrap();
        let all = store.save_report(second.clone()).unwrap();

        assert_eq!(all, vec![first.clone(), second.clone()]);
        assert_eq!(store.get_reports(), vec![first, second]);
    }

    #[test]
    fn test_concurrent_saves_keep_every_report() {
        let store = CallStore::in_memory();
        std::thread::scope(|s| {
            for t in 0..8 {
                let store = &store;
                s.spawn(move || {
                    for i in 0..50 {
                        let when = at("2026-10-18 09:00") + chrono::Duration::minutes(t * 50 + i);
                        store
                            .save_report(CallReport::new(None, true, None, when).unwrap())
                            .unwrap();
                    }
                });
            }
        });

        let reports = store.get_reports();
        assert_eq!(reports.len(), 400);
        let mut ids: Vec<_> = reports.iter().map(|r| r.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 400);
    }

    #[test]
    fn test_invalid_report_is_rejected() {
        let store = CallStore::in_memory();
        let mut report = CallReport::new(None, true, None, at("2026-10-18 09:00")).unwrap();
        report.donation_closed = false;
        assert!(store.save_report(report).is_err());
        assert!(store.get_reports().is_empty());
    }

    #[test]
    fn test_settings_round_trip() {
        let store = CallStore::in_memory();
        assert_eq!(store.get_settings(), AppSettings::default());

        let settings = AppSettings {
            make_webhook_url: "https://hook.eu1.make.com/xyz".into(),
            zapier_webhook_url: "https://hooks.zapier.com/hooks/catch/1/abc".into(),
            agent_name: "מיכל".into(),
            daily_report_time: "18:30".into(),
        };
        store.save_settings(&settings).unwrap();
        assert_eq!(store.get_settings(), settings);
    }

    #[test]
    fn test_invalid_settings_not_saved() {
        let store = CallStore::in_memory();
        let bad = AppSettings {
            daily_report_time: "25:00".into(),
            ..Default::default()
        };
        assert!(store.save_settings(&bad).is_err());
        assert_eq!(store.get_settings().daily_report_time, "17:00");
    }

    #[test]
    fn test_corrupt_records_fall_back_to_defaults() {
        let backend = MemoryBackend::new();
        backend.set(REPORTS_KEY, "not json").unwrap();
        backend.set(SETTINGS_KEY, "{").unwrap();
        backend.set(LAST_REPORT_DATE_KEY, "\"Sun Oct 18 2026\"").unwrap();
        let store = CallStore::new(Box::new(backend));

        assert!(store.get_reports().is_empty());
        assert_eq!(store.get_settings(), AppSettings::default());
        assert!(store.last_daily_report_date().is_none());
    }

    #[test]
    fn test_last_report_date() {
        let store = CallStore::in_memory();
        assert!(store.last_daily_report_date().is_none());
        let day = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        store.set_last_daily_report_date(day).unwrap();
        assert_eq!(store.last_daily_report_date(), Some(day));
    }

    #[test]
    fn test_clear_reports_keeps_settings() {
        let store = CallStore::in_memory();
        store
            .save_report(CallReport::new(None, true, None, at("2026-10-18 09:00")).unwrap())
            .unwrap();
        let settings = AppSettings {
            agent_name: "Noa".into(),
            ..Default::default()
        };
        store.save_settings(&settings).unwrap();

        store.clear_reports().unwrap();
        assert!(store.get_reports().is_empty());
        assert_eq!(store.get_settings(), settings);

        store.clear_all().unwrap();
        assert_eq!(store.get_settings(), AppSettings::default());
    }
}
