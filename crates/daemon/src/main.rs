use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use ownerpulse_api_client::ApiClient;
use ownerpulse_core::CurrentUser;
use ownerpulse_daemon::config::{self, PulseConfig};
use ownerpulse_daemon::{Dashboard, ScanOptions, ScanOutcome, ScanStore};
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Rows logged after each scan.
const REPORT_ROWS: usize = 10;

#[derive(Debug, Parser)]
#[command(name = "ownerpulse-daemon", version, about = "Poll a record collection and aggregate it per owner")]
struct Args {
    /// Config file (defaults to ~/.config/ownerpulse/ownerpulse.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Scan once and exit instead of polling
    #[arg(long)]
    once: bool,

    /// Print the final scan state as JSON on stdout
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ownerpulse_daemon=info".parse().unwrap())
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    if let Err(e) = run(Args::parse()).await {
        error!("Daemon fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<()> {
    info!("ownerpulse-daemon starting");

    let cfg = config::load_config(args.config.as_deref())?;
    let options = ScanOptions::from_config(&cfg)?;
    let fetch = Arc::new(build_client(&cfg)?);
    let user = CurrentUser::new(
        cfg.identity.user_id.as_str(),
        cfg.identity.display_name.as_str(),
    );

    let mut dashboard = Dashboard::new(ScanStore::new(), options, &cfg.scan.collection);
    dashboard.set_context(fetch, user);

    let (shutdown_tx, mut shutdown) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_shutdown().await;
        let _ = shutdown_tx.send(true);
    });

    let interval = Duration::from_secs(cfg.scan.rescan_interval_secs);
    let poll = !args.once && !interval.is_zero();

    loop {
        tokio::select! {
            outcome = dashboard.wait_for_scan() => {
                dashboard.wait_for_directory().await;
                report(&dashboard, outcome, args.json)?;
            }
            _ = shutdown.changed() => break,
        }

        if !poll {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                dashboard.start_scan();
            }
            _ = shutdown.changed() => break,
        }
    }

    info!("ownerpulse-daemon stopped");
    Ok(())
}

fn build_client(cfg: &PulseConfig) -> Result<ApiClient> {
    let mut client = ApiClient::new(
        &cfg.server.url,
        Duration::from_secs(cfg.server.timeout_secs),
    )?;
    if !cfg.server.api_key.is_empty() {
        client.set_auth(cfg.server.api_key.clone());
    }
    Ok(client)
}

fn report(
    dashboard: &Dashboard<ApiClient>,
    outcome: Option<ScanOutcome>,
    json: bool,
) -> Result<()> {
    let state = dashboard.status();
    if let Some(outcome) = &outcome {
        info!(
            "Scan {} finished: {:?}, {} pages, {} records ({} recent)",
            outcome.generation,
            outcome.phase,
            outcome.pages_fetched,
            state.snapshot.total,
            state.snapshot.recent_count,
        );
    }
    if state.partial {
        warn!(
            "Partial results, some data may be missing: {}",
            state.error.as_deref().unwrap_or("unknown error")
        );
    }
    if state.truncated {
        warn!("Page cap reached, totals may be truncated");
    }

    let rows = dashboard.latest_rows();
    for row in rows.iter().take(REPORT_ROWS) {
        info!("  {:<24} {}", row.display_name, row.count);
    }

    if json {
        let payload = serde_json::json!({
            "state": state,
            "rows": rows,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
    }
    Ok(())
}

/// Wait for SIGTERM or SIGINT
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let (Ok(mut sigterm), Ok(mut sigint)) = (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) else {
            warn!("Failed to register signal handlers, falling back to Ctrl+C");
            let _ = tokio::signal::ctrl_c().await;
            return;
        };
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
    }
    #[cfg(not(unix))]
    {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C");
        }
    }
}
