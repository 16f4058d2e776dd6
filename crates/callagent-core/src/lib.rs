//! # CallAgent Core
//!
//! Shared building blocks for the CallAgent workspace:
//! - `model`: call reports, rejection reasons, settings
//! - `stats`: the daily statistics aggregator
//! - `payload`: flat JSON bodies pushed to automation webhooks
//! - `config`: TOML runtime configuration
//! - `error`: the crate-wide error type

pub mod config;
pub mod error;
pub mod model;
pub mod payload;
pub mod stats;

pub use config::CallAgentConfig;
pub use error::{CallAgentError, Result};
pub use model::{AppSettings, CallReport, Endpoints, RejectionReason, ReportTime};
pub use stats::{ChartSlice, DailySummary, DominantReason, RejectionCounts};
