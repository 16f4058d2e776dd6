//! Webhook dispatch: posts a flat JSON payload to every configured endpoint.
//!
//! Endpoints are attempted concurrently and independently; one failing never
//! blocks or rolls back another. Nothing here returns an error: each endpoint's
//! outcome is captured in the `DeliveryReport` instead.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use callagent_core::Endpoints;

/// Result of posting to a single endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointOutcome {
    /// "primary" or "secondary".
    pub endpoint: String,
    pub url: String,
    /// HTTP status, when a response arrived.
    pub status: Option<u16>,
    /// Transport error, when no response arrived.
    pub error: Option<String>,
}

impl EndpointOutcome {
    /// Any response counts as delivered; only transport errors fail.
    pub fn delivered(&self) -> bool {
        self.error.is_none()
    }
}

/// Joined outcome of one payload sent to all endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReport {
    pub outcomes: Vec<EndpointOutcome>,
}

impl DeliveryReport {
    pub fn any_delivered(&self) -> bool {
        self.outcomes.iter().any(|o| o.delivered())
    }

    pub fn delivered_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.delivered()).count()
    }

    /// Joined error messages of failed endpoints.
    pub fn failures(&self) -> String {
        self.outcomes
            .iter()
            .filter_map(|o| o.error.as_ref().map(|e| format!("{}: {e}", o.endpoint)))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Delivery seam. The scheduler and API only talk to this trait.
#[async_trait]
pub trait Deliver: Send + Sync {
    async fn deliver(&self, endpoints: &Endpoints, payload: &Value) -> DeliveryReport;
}

/// HTTP webhook dispatcher backed by `reqwest`.
pub struct WebhookDispatcher {
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl WebhookDispatcher {
    /// `timeout` of `None` means requests are never cut off.
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }

    async fn post(&self, endpoint: &str, url: &str, payload: &Value) -> EndpointOutcome {
        let mut req = self.client.post(url).json(payload);
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }

        let kind = payload["type"].as_str().unwrap_or("payload");
        match req.send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    tracing::info!("✅ {kind} sent to {endpoint} webhook ({status})");
                } else {
                    tracing::warn!("⚠️ {endpoint} webhook answered {status} for {kind}; request might have failed");
                }
                EndpointOutcome {
                    endpoint: endpoint.to_string(),
                    url: url.to_string(),
                    status: Some(status.as_u16()),
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!("⚠️ {endpoint} webhook failed for {kind}: {e}");
                EndpointOutcome {
                    endpoint: endpoint.to_string(),
                    url: url.to_string(),
                    status: None,
                    error: Some(e.to_string()),
                }
            }
        }
    }
}

impl Default for WebhookDispatcher {
    fn default() -> Self {
        Self::new(None)
    }
}

#[async_trait]
impl Deliver for WebhookDispatcher {
    async fn deliver(&self, endpoints: &Endpoints, payload: &Value) -> DeliveryReport {
        let sends = endpoints
            .iter()
            .map(|(name, url)| self.post(name, url, payload));
        DeliveryReport {
            outcomes: join_all(sends).await,
        }
    }
}

/// A delivery kept in the history buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryRecord {
    /// Payload type: daily_summary, single_call, test_connection.
    pub kind: String,
    pub auto_generated: bool,
    pub at: DateTime<Local>,
    pub report: DeliveryReport,
}

/// Delivery history (in-memory ring buffer, max 100).
#[derive(Debug, Default)]
pub struct DeliveryLog {
    records: Vec<DeliveryRecord>,
}

impl DeliveryLog {
    const CAPACITY: usize = 100;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, record: DeliveryRecord) {
        self.records.push(record);
        if self.records.len() > Self::CAPACITY {
            self.records.remove(0);
        }
    }

    /// Oldest first.
    pub fn history(&self) -> &[DeliveryRecord] {
        &self.records
    }
}
