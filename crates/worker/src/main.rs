//! watcher-worker: keeps watcher timers in step with the watcher index.
//!
//! Reconciles the stored watchers every reload interval and runs each
//! watcher's search → condition → transform → actions pipeline on its own
//! schedule until SIGINT/SIGTERM.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::Notify;
use tracing::info;

use watchkeeper_core::Config;
use watchkeeper_elastic::ElasticClient;
use watchkeeper_engine::{ExpressionEvaluator, SchedulerOptions, WatcherScheduler};

// ── CLI ─────────────────────────────────────────────────────────────

/// Watcher scheduling worker.
#[derive(Parser, Debug)]
#[command(name = "watcher-worker", version, about)]
struct Cli {
    /// Config profile; `PROD` reads `PROD_ELASTICSEARCH_HOST` before `ELASTICSEARCH_HOST`.
    #[arg(long, env = "WATCHKEEPER_PROFILE", default_value = "")]
    profile: String,

    /// Seconds between reconciliation passes (defaults to WATCHER_RELOAD_INTERVAL_SECS).
    #[arg(long)]
    reload_interval: Option<u64>,

    /// Reconcile once, log the schedule and exit.
    #[arg(long)]
    once: bool,
}

// ── main ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    watchkeeper_core::config::load_dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::for_profile(&cli.profile);
    config.log_summary();

    let client = Arc::new(ElasticClient::from_config(&config)?);
    info!(url = client.base_url(), index = client.index(), "watcher index");

    let dispatcher = watchkeeper_notify::default_dispatcher();
    info!(kinds = ?dispatcher.kinds(), "action handlers registered");

    let scheduler = WatcherScheduler::new(
        client.clone(),
        client,
        Arc::new(dispatcher),
        Arc::new(ExpressionEvaluator::new()),
        SchedulerOptions::from_config(&config),
    );

    if cli.once {
        let report = scheduler.reconcile().await;
        info!(?report, "reconciliation complete");
        for (id, interval) in scheduler.scheduled() {
            info!(watcher_id = %id, interval = %interval, "scheduled");
        }
        scheduler.shutdown();
        return Ok(());
    }

    let interval = cli
        .reload_interval
        .map(|secs| Duration::from_secs(secs.max(1)))
        .unwrap_or_else(|| config.watcher.reload_interval());

    let shutdown = Arc::new(Notify::new());
    let scheduler = Arc::new(scheduler);

    let runner = {
        let scheduler = scheduler.clone();
        let shutdown = shutdown.clone();
        tokio::spawn(async move { scheduler.run(interval, shutdown).await })
    };

    info!(reload_secs = interval.as_secs(), "watcher-worker started");
    shutdown_signal().await;
    info!("shutdown signal received");

    shutdown.notify_one();
    runner.await?;
    info!("watcher-worker exited cleanly");
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
                .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.expect("failed to listen for ctrl_c");
    }
}
