//! HTTP server implementation using Axum.

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use callagent_core::config::GatewayConfig;
use callagent_scheduler::{CallAgentService, DailyReportEngine};

/// Shared state for the gateway server.
#[derive(Clone)]
pub struct AppState {
    pub gateway_config: GatewayConfig,
    pub start_time: std::time::Instant,
    /// Reports, settings, and webhook delivery.
    pub service: Arc<CallAgentService>,
    /// Daily summary scheduler, woken when settings change.
    pub engine: Arc<DailyReportEngine>,
}

impl AppState {
    pub fn new(
        gateway_config: GatewayConfig,
        service: Arc<CallAgentService>,
        engine: Arc<DailyReportEngine>,
    ) -> Self {
        Self {
            gateway_config,
            start_time: std::time::Instant::now(),
            service,
            engine,
        }
    }
}

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let shared = Arc::new(state);

    let api = Router::new()
        .route(
            "/api/v1/reports",
            get(super::routes::list_reports)
                .post(super::routes::create_report)
                .delete(super::routes::clear_reports),
        )
        .route("/api/v1/stats", get(super::routes::get_stats))
        .route("/api/v1/summary/send", post(super::routes::send_summary))
        .route(
            "/api/v1/settings",
            get(super::routes::get_settings).put(super::routes::update_settings),
        )
        .route("/api/v1/settings/test", post(super::routes::test_connection))
        .route("/api/v1/scheduler", get(super::routes::scheduler_status))
        .route("/api/v1/deliveries", get(super::routes::list_deliveries));

    let public = Router::new().route("/health", get(super::routes::health_check));

    api.merge(public)
        .layer(
            CorsLayer::new()
                .allow_methods([
                    axum::http::Method::GET,
                    axum::http::Method::POST,
                    axum::http::Method::PUT,
                    axum::http::Method::DELETE,
                    axum::http::Method::OPTIONS,
                ])
                .allow_headers(Any)
                .allow_origin(Any)
                .max_age(std::time::Duration::from_secs(3600)),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

/// Start the HTTP server.
pub async fn start(state: AppState) -> anyhow::Result<()> {
    let addr = format!("{}:{}", state.gateway_config.host, state.gateway_config.port);
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("🌐 CallAgent API listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}
