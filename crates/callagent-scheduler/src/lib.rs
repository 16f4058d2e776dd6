//! # CallAgent Scheduler
//!
//! Webhook delivery and the automatic end-of-day summary.
//!
//! ## Architecture
//! ```text
//! DailyReportEngine (tokio sleep until next fire)
//!   ├── schedule::next_fire  → when to wake
//!   ├── schedule::evaluate   → due? already sent? endpoints? reports?
//!   └── CallAgentService::send_daily_summary
//!         └── WebhookDispatcher (concurrent POSTs)
//!               ├── primary   (Make)
//!               └── secondary (Zapier)
//! ```

pub mod dispatch;
pub mod engine;
pub mod schedule;
pub mod service;

pub use dispatch::{Deliver, DeliveryLog, DeliveryRecord, DeliveryReport, EndpointOutcome, WebhookDispatcher};
pub use engine::{DailyReportEngine, SchedulerStatus, TickOutcome, run_scheduler};
pub use schedule::{Decision, Gate, SkipReason};
pub use service::CallAgentService;
