//! Daily statistics aggregator.
//!
//! A single pass over the reports: closed calls are counted, failed calls with
//! a reason land in one of four buckets. The result is recomputed on every call
//! and never cached.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::{CallReport, RejectionReason};

/// Label reported when no rejection has been recorded.
pub const NO_DATA_LABEL: &str = "אין נתונים";

/// Per-reason counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionCounts {
    pub no_credit: usize,
    pub no_money: usize,
    pub not_interested: usize,
    pub other: usize,
}

impl RejectionCounts {
    pub fn get(&self, reason: RejectionReason) -> usize {
        match reason {
            RejectionReason::NoCredit => self.no_credit,
            RejectionReason::NoMoney => self.no_money,
            RejectionReason::NotInterested => self.not_interested,
            RejectionReason::Other => self.other,
        }
    }

    fn bump(&mut self, reason: RejectionReason) {
        let slot = match reason {
            RejectionReason::NoCredit => &mut self.no_credit,
            RejectionReason::NoMoney => &mut self.no_money,
            RejectionReason::NotInterested => &mut self.not_interested,
            RejectionReason::Other => &mut self.other,
        };
        *slot += 1;
    }

    pub fn total(&self) -> usize {
        RejectionReason::ALL.iter().map(|r| self.get(*r)).sum()
    }

    /// Reason with the highest count. Earlier reasons win ties.
    pub fn dominant(&self) -> DominantReason {
        let mut best = DominantReason::NoData;
        let mut max = 0;
        for reason in RejectionReason::ALL {
            let count = self.get(reason);
            if count > max {
                max = count;
                best = DominantReason::Reason(reason);
            }
        }
        best
    }
}

/// Most frequent rejection reason, or a sentinel when nothing was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DominantReason {
    Reason(RejectionReason),
    NoData,
}

impl DominantReason {
    pub fn label(&self) -> &'static str {
        match self {
            DominantReason::Reason(r) => r.label(),
            DominantReason::NoData => NO_DATA_LABEL,
        }
    }
}

/// One non-empty bucket of the rejection breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSlice {
    pub reason: RejectionReason,
    pub label: String,
    pub value: usize,
}

/// Aggregate statistics over a set of reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySummary {
    pub total: usize,
    pub closed_total: usize,
    /// Integer percent, no decimals.
    pub closed_rate: String,
    pub failed_total: usize,
    pub rejection_counts: RejectionCounts,
    pub main_difficulty: DominantReason,
    /// Non-zero buckets only, in declaration order.
    pub chart: Vec<ChartSlice>,
}

impl DailySummary {
    /// Conversion rate as sent to webhooks, e.g. "75%".
    pub fn conversion_rate(&self) -> String {
        format!("{}%", self.closed_rate)
    }
}

/// Aggregate `reports`. Returns `None` when there is nothing to summarize.
pub fn calculate_daily_stats(reports: &[CallReport]) -> Option<DailySummary> {
    if reports.is_empty() {
        return None;
    }

    let total = reports.len();
    let mut closed = 0usize;
    let mut counts = RejectionCounts::default();

    for report in reports {
        if report.donation_closed {
            closed += 1;
        } else if let Some(reason) = report.rejection_reason {
            counts.bump(reason);
        }
    }

    let chart = RejectionReason::ALL
        .into_iter()
        .filter(|r| counts.get(*r) > 0)
        .map(|r| ChartSlice {
            reason: r,
            label: r.label().to_string(),
            value: counts.get(r),
        })
        .collect();

    Some(DailySummary {
        total,
        closed_total: closed,
        closed_rate: closed_rate(closed, total).to_string(),
        failed_total: counts.total(),
        rejection_counts: counts,
        main_difficulty: counts.dominant(),
        chart,
    })
}

/// round(100 * closed / total), halves rounded up. Integer math avoids
/// float artifacts at .5 boundaries.
fn closed_rate(closed: usize, total: usize) -> usize {
    if total == 0 {
        return 0;
    }
    (200 * closed + total) / (2 * total)
}

/// Reports recorded on `day`, in their original order.
pub fn reports_for_day(reports: &[CallReport], day: NaiveDate) -> Vec<CallReport> {
    reports
        .iter()
        .filter(|r| r.local_date() == Some(day))
        .cloned()
        .collect()
}
