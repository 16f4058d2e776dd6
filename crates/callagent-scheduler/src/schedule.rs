//! Daily summary timing.
//!
//! `next_fire` computes when the scheduler should wake next; `evaluate`
//! decides whether a wake-up actually sends. Both are pure so they can be
//! driven with fixed clocks in tests.

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;

use callagent_core::ReportTime;

/// Why a tick did not send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Not the configured minute (or, with catch-up, still before it).
    NotDue,
    /// A summary already went out today.
    AlreadySent,
    NoEndpoints,
    NoReports,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Send,
    Skip(SkipReason),
}

/// Inputs to a single gating decision.
#[derive(Debug, Clone, Copy)]
pub struct Gate {
    pub time: ReportTime,
    pub last_sent: Option<NaiveDate>,
    pub has_endpoints: bool,
    pub reports_today: usize,
    pub catch_up: bool,
}

/// Decide whether the summary goes out at `now`.
pub fn evaluate(now: NaiveDateTime, gate: &Gate) -> Decision {
    let due = if gate.catch_up {
        now.time() >= gate.time.as_naive_time()
    } else {
        gate.time.matches(now.time())
    };
    if !due {
        return Decision::Skip(SkipReason::NotDue);
    }
    if gate.last_sent == Some(now.date()) {
        return Decision::Skip(SkipReason::AlreadySent);
    }
    if !gate.has_endpoints {
        return Decision::Skip(SkipReason::NoEndpoints);
    }
    if gate.reports_today == 0 {
        return Decision::Skip(SkipReason::NoReports);
    }
    Decision::Send
}

/// Next minute-aligned instant strictly after `now` at which to evaluate.
///
/// Today's target if it is still ahead. Past it, catch-up mode keeps checking
/// every minute until today's summary is out; otherwise wait for tomorrow.
pub fn next_fire(
    now: NaiveDateTime,
    time: ReportTime,
    last_sent: Option<NaiveDate>,
    catch_up: bool,
) -> NaiveDateTime {
    let today_target = now.date().and_time(time.as_naive_time());
    if now < today_target {
        return today_target;
    }
    if catch_up && last_sent != Some(now.date()) {
        let minute_start = now
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .unwrap_or(now);
        let next = minute_start + Duration::minutes(1);
        // Past midnight the day rolls over; fall through to tomorrow's target.
        if next.date() == now.date() {
            return next;
        }
    }
    today_target + Duration::days(1)
}
