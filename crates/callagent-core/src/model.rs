//! Data model: call reports, rejection reasons, and the settings singleton.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::{CallAgentError, Result};

/// Timestamp format stored on every report (local wall clock, minute precision).
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Agent name used when none is configured.
pub const UNSET_AGENT: &str = "לא הוגדר";

/// Why a call did not close. Declaration order is significant: it breaks
/// ties when picking the dominant reason.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    NoCredit,
    NoMoney,
    NotInterested,
    Other,
}

impl RejectionReason {
    /// All reasons in declaration order.
    pub const ALL: [RejectionReason; 4] = [
        RejectionReason::NoCredit,
        RejectionReason::NoMoney,
        RejectionReason::NotInterested,
        RejectionReason::Other,
    ];

    /// Stable wire key.
    pub fn key(&self) -> &'static str {
        match self {
            RejectionReason::NoCredit => "no_credit",
            RejectionReason::NoMoney => "no_money",
            RejectionReason::NotInterested => "not_interested",
            RejectionReason::Other => "other",
        }
    }

    /// Display label shown to agents and forwarded in summaries.
    pub fn label(&self) -> &'static str {
        match self {
            RejectionReason::NoCredit => "אין אשראי",
            RejectionReason::NoMoney => "אין לי כסף",
            RejectionReason::NotInterested => "לא מעוניין",
            RejectionReason::Other => "אחר",
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for RejectionReason {
    type Err = CallAgentError;

    fn from_str(s: &str) -> Result<Self> {
        RejectionReason::ALL
            .into_iter()
            .find(|r| r.key() == s.trim())
            .ok_or_else(|| {
                CallAgentError::validation(format!(
                    "unknown rejection reason '{s}' (expected no_credit, no_money, not_interested, other)"
                ))
            })
    }
}

/// One recorded call outcome. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallReport {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_name: Option<String>,
    pub donation_closed: bool,
    #[serde(default)]
    pub rejection_reason: Option<RejectionReason>,
    pub timestamp: String,
}

impl CallReport {
    /// Create a report stamped at `at`.
    ///
    /// A reason is required when the donation did not close and must be
    /// absent when it did.
    pub fn new(
        agent_name: Option<String>,
        donation_closed: bool,
        rejection_reason: Option<RejectionReason>,
        at: NaiveDateTime,
    ) -> Result<Self> {
        let report = Self {
            id: uuid::Uuid::new_v4().to_string(),
            agent_name,
            donation_closed,
            rejection_reason,
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
        };
        report.validate()?;
        Ok(report)
    }

    /// Check the closed/reason invariant.
    pub fn validate(&self) -> Result<()> {
        match (self.donation_closed, self.rejection_reason) {
            (true, Some(reason)) => Err(CallAgentError::validation(format!(
                "closed donation cannot carry rejection reason '{reason}'"
            ))),
            (false, None) => Err(CallAgentError::validation(
                "rejection reason is required when the donation did not close",
            )),
            _ => Ok(()),
        }
    }

    /// Calendar day the report was recorded on.
    pub fn local_date(&self) -> Option<NaiveDate> {
        let day = self.timestamp.get(..10)?;
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }
}

/// Daily report time of day, minute granularity ("HH:MM").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ReportTime {
    hour: u32,
    minute: u32,
}

impl ReportTime {
    pub fn new(hour: u32, minute: u32) -> Result<Self> {
        if hour > 23 || minute > 59 {
            return Err(CallAgentError::validation(format!(
                "report time {hour:02}:{minute:02} is out of range"
            )));
        }
        Ok(Self { hour, minute })
    }

    pub fn hour(&self) -> u32 {
        self.hour
    }

    pub fn minute(&self) -> u32 {
        self.minute
    }

    pub fn as_naive_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour, self.minute, 0).unwrap_or(NaiveTime::MIN)
    }

    /// Whether `t` falls inside this minute.
    pub fn matches(&self, t: NaiveTime) -> bool {
        t.hour() == self.hour && t.minute() == self.minute
    }
}

impl FromStr for ReportTime {
    type Err = CallAgentError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || CallAgentError::validation(format!("invalid report time '{s}' (expected HH:MM)"));
        let (h, m) = s.trim().split_once(':').ok_or_else(invalid)?;
        if h.is_empty() || h.len() > 2 || m.len() != 2 {
            return Err(invalid());
        }
        let hour: u32 = h.parse().map_err(|_| invalid())?;
        let minute: u32 = m.parse().map_err(|_| invalid())?;
        Self::new(hour, minute)
    }
}

impl fmt::Display for ReportTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Webhook targets. Both are optional and attempted independently.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoints {
    pub primary: Option<String>,
    pub secondary: Option<String>,
}

impl Endpoints {
    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.secondary.is_none()
    }

    /// Configured endpoints as `(name, url)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [("primary", self.primary.as_deref()), ("secondary", self.secondary.as_deref())]
            .into_iter()
            .filter_map(|(name, url)| url.map(|u| (name, u)))
    }
}

fn default_report_time() -> String {
    "17:00".into()
}

/// Application settings. Overwritten wholesale on save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Make scenario webhook (primary endpoint).
    #[serde(default)]
    pub make_webhook_url: String,
    /// Zapier catch hook (secondary endpoint).
    #[serde(default)]
    pub zapier_webhook_url: String,
    #[serde(default)]
    pub agent_name: String,
    #[serde(default = "default_report_time")]
    pub daily_report_time: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            make_webhook_url: String::new(),
            zapier_webhook_url: String::new(),
            agent_name: String::new(),
            daily_report_time: default_report_time(),
        }
    }
}

impl AppSettings {
    /// Validate before saving.
    pub fn validate(&self) -> Result<()> {
        self.report_time()?;
        for url in [&self.make_webhook_url, &self.zapier_webhook_url] {
            let url = url.trim();
            if !url.is_empty() && !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(CallAgentError::validation(format!(
                    "webhook url '{url}' must start with http:// or https://"
                )));
            }
        }
        Ok(())
    }

    pub fn report_time(&self) -> Result<ReportTime> {
        self.daily_report_time.parse()
    }

    /// Non-empty webhook URLs.
    pub fn endpoints(&self) -> Endpoints {
        let non_empty = |s: &str| {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        };
        Endpoints {
            primary: non_empty(&self.make_webhook_url),
            secondary: non_empty(&self.zapier_webhook_url),
        }
    }

    /// Agent name to stamp on reports and summaries.
    pub fn agent_display_name(&self) -> &str {
        let name = self.agent_name.trim();
        if name.is_empty() { UNSET_AGENT } else { name }
    }
}
