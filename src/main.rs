//! # CallAgent: call outcome logging with daily webhook summaries
//!
//! Usage:
//!   callagent                              # Start API + daily scheduler
//!   callagent serve --port 8080            # Custom port
//!   callagent report --closed              # Record a closed donation
//!   callagent report --reason no_money     # Record a rejected call
//!   callagent stats --date all             # Print statistics
//!   callagent send-summary                 # Push today's summary now

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::Local;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use callagent_core::stats::{calculate_daily_stats, reports_for_day};
use callagent_core::{AppSettings, CallAgentConfig, RejectionReason};
use callagent_gateway::AppState;
use callagent_scheduler::{CallAgentService, DailyReportEngine, WebhookDispatcher};

#[derive(Parser)]
#[command(
    name = "callagent",
    version,
    about = "📞 CallAgent — call outcome logging with daily webhook summaries"
)]
struct Cli {
    /// Config file (default: ~/.callagent/config.toml, or $CALLAGENT_CONFIG)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Start the HTTP API and the daily summary scheduler
    Serve {
        /// Override the configured port
        #[arg(short, long)]
        port: Option<u16>,
        /// Override the configured bind address
        #[arg(long)]
        host: Option<String>,
        /// Do not start the daily summary scheduler
        #[arg(long)]
        no_scheduler: bool,
    },
    /// Record a call outcome
    Report {
        /// The donation closed
        #[arg(long, conflicts_with = "reason")]
        closed: bool,
        /// Why the call did not close: no_credit, no_money, not_interested, other
        #[arg(long, required_unless_present = "closed")]
        reason: Option<RejectionReason>,
    },
    /// Print statistics
    Stats {
        /// YYYY-MM-DD, or "all" (default: today)
        #[arg(long)]
        date: Option<String>,
    },
    /// Send today's summary to the configured webhooks now
    SendSummary,
    /// Send a test payload to the configured webhooks
    TestConnection,
    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsAction,
    },
    /// Delete all reports
    Clear {
        /// Also reset settings and the last-sent date
        #[arg(long)]
        all: bool,
    },
}

#[derive(Subcommand)]
enum SettingsAction {
    /// Print current settings
    Show,
    /// Change one or more fields; others keep their values
    ///
    /// A server already running on the same data directory is not notified.
    /// It picks up a new report time at its next wake, up to an hour later; use
    /// `PUT /api/v1/settings` to reschedule it immediately.
    Set {
        #[arg(long)]
        make_url: Option<String>,
        #[arg(long)]
        zapier_url: Option<String>,
        #[arg(long)]
        agent_name: Option<String>,
        /// HH:MM
        #[arg(long)]
        report_time: Option<String>,
    },
}

fn load_config(cli: &Cli) -> Result<CallAgentConfig> {
    let path = cli
        .config
        .clone()
        .or_else(|| std::env::var("CALLAGENT_CONFIG").ok().map(PathBuf::from))
        .unwrap_or_else(CallAgentConfig::default_path);
    if path.exists() {
        tracing::debug!("Loading config from {}", path.display());
        Ok(CallAgentConfig::load_from(&path)?)
    } else {
        Ok(CallAgentConfig::default())
    }
}

fn build_service(config: &CallAgentConfig) -> Result<Arc<CallAgentService>> {
    let store = Arc::new(callagent_store::open(&config.storage)?);
    let dispatcher = Arc::new(WebhookDispatcher::new(
        config.delivery.request_timeout_secs.map(Duration::from_secs),
    ));
    Ok(Arc::new(CallAgentService::new(
        store,
        dispatcher,
        &config.delivery.date_format,
    )))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "callagent=debug,callagent_scheduler=debug,tower_http=debug"
    } else {
        "callagent=info,callagent_scheduler=info,callagent_gateway=info,callagent_store=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config = load_config(&cli)?;
    let service = build_service(&config)?;
    let now = Local::now().naive_local();

    match cli.command.unwrap_or(Command::Serve {
        port: None,
        host: None,
        no_scheduler: false,
    }) {
        Command::Serve {
            port,
            host,
            no_scheduler,
        } => {
            let mut gateway = config.gateway.clone();
            if let Some(port) = port {
                gateway.port = port;
            }
            if let Some(host) = host {
                gateway.host = host;
            }

            let engine = Arc::new(DailyReportEngine::new(service.clone(), config.scheduler.catch_up));
            if config.scheduler.enabled && !no_scheduler {
                tokio::spawn(callagent_scheduler::run_scheduler(engine.clone()));
            } else {
                tracing::info!("⏸️ Daily summary scheduler disabled");
            }

            println!("📞 CallAgent v{}", env!("CARGO_PKG_VERSION"));
            println!("   🌐 API:      http://{}:{}/api/v1", gateway.host, gateway.port);
            println!("   💾 Storage:  {} ({})", service.store().backend_name(), config.storage.data_dir);
            println!("   ⏰ Report:   {}", service.store().get_settings().daily_report_time);
            println!();

            callagent_gateway::start(AppState::new(gateway, service, engine)).await?;
        }

        Command::Report { closed, reason } => {
            let (report, delivery) = service.submit_report(closed, reason, now).await?;
            println!("✅ Report saved ({})", report.id);
            if let Some(delivery) = delivery {
                println!(
                    "   📤 Forwarded to {}/{} webhook(s)",
                    delivery.delivered_count(),
                    delivery.outcomes.len()
                );
            }
        }

        Command::Stats { date } => {
            let all = service.store().get_reports();
            let (label, reports) = match date.as_deref() {
                Some("all") => ("all".to_string(), all),
                Some(d) => {
                    let day = chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d")
                        .map_err(|e| anyhow::anyhow!("invalid date '{d}': {e}"))?;
                    (day.to_string(), reports_for_day(&all, day))
                }
                None => (now.date().to_string(), reports_for_day(&all, now.date())),
            };
            match calculate_daily_stats(&reports) {
                None => println!("📊 {label}: no data"),
                Some(s) => {
                    println!("📊 Statistics for {label}");
                    println!("   Calls:          {}", s.total);
                    println!("   Closed:         {} ({}%)", s.closed_total, s.closed_rate);
                    println!("   Failed:         {}", s.failed_total);
                    println!("   Top reason:     {}", s.main_difficulty.label());
                    for slice in &s.chart {
                        println!("     • {:<14} {}", slice.label, slice.value);
                    }
                }
            }
        }

        Command::SendSummary => {
            let delivery = service.send_daily_summary(now, false).await?;
            println!(
                "✅ Daily summary sent to {}/{} webhook(s)",
                delivery.delivered_count(),
                delivery.outcomes.len()
            );
        }

        Command::TestConnection => {
            let settings = service.store().get_settings();
            let delivery = service.test_connection(&settings).await?;
            for outcome in &delivery.outcomes {
                match (&outcome.status, &outcome.error) {
                    (Some(status), _) => println!("   ✅ {} → HTTP {status}", outcome.endpoint),
                    (None, Some(err)) => println!("   ❌ {} → {err}", outcome.endpoint),
                    (None, None) => println!("   ❔ {}", outcome.endpoint),
                }
            }
            if !delivery.any_delivered() {
                anyhow::bail!("no webhook endpoint reachable");
            }
        }

        Command::Settings { action } => match action {
            SettingsAction::Show => {
                println!("{}", serde_json::to_string_pretty(&service.store().get_settings())?);
            }
            SettingsAction::Set {
                make_url,
                zapier_url,
                agent_name,
                report_time,
            } => {
                let current = service.store().get_settings();
                let time_changed = report_time
                    .as_deref()
                    .is_some_and(|t| t != current.daily_report_time);
                let updated = AppSettings {
                    make_webhook_url: make_url.unwrap_or(current.make_webhook_url),
                    zapier_webhook_url: zapier_url.unwrap_or(current.zapier_webhook_url),
                    agent_name: agent_name.unwrap_or(current.agent_name),
                    daily_report_time: report_time.unwrap_or(current.daily_report_time),
                };
                service.store().save_settings(&updated)?;
                println!("✅ Settings saved");
                if time_changed {
                    println!("   ⏰ A running server picks up the new report time at its next wake (up to 1h)");
                }
            }
        },

        Command::Clear { all } => {
            if all {
                service.store().clear_all()?;
                println!("🗑️ Reports, settings, and last-sent date cleared");
            } else {
                service.store().clear_reports()?;
                println!("🗑️ Reports cleared");
            }
        }
    }

    Ok(())
}
