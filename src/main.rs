use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use market_discovery::config::Config;
use market_discovery::db::{self, writer::SnapshotPersister};
use market_discovery::error::Result;
use market_discovery::source::SqliteSource;
use market_discovery::types::RunSummary;
use market_discovery::DiscoveryEngine;

#[tokio::main]
async fn main() {
    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config) -> Result<()> {
    // --- Database setup ---
    let pool = db::connect(&cfg.db_path).await?;

    // --- Engine over the SQLite source tables ---
    let source = Arc::new(SqliteSource::new(pool.clone()));
    let engine = DiscoveryEngine::new(
        source.clone(),
        source.clone(),
        source,
        SnapshotPersister::new(pool, cfg.persist_batch_size),
        cfg.policy.clone(),
        cfg.universe_size,
    );
    info!(
        universe = cfg.universe_size,
        benchmark = %cfg.policy.benchmark_coin_id,
        interval_secs = cfg.run_interval_secs,
        "Discovery engine ready"
    );

    if cfg.run_interval_secs == 0 {
        let summary = engine.run_update().await;
        log_summary(&summary);
        if !summary.success {
            std::process::exit(2);
        }
        return Ok(());
    }

    // --- Interval loop; ticks that land on a running update are skipped ---
    let mut interval = tokio::time::interval(Duration::from_secs(cfg.run_interval_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let state = engine.state();

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let summary = engine.run_update().await;
                log_summary(&summary);
            }
            _ = tokio::signal::ctrl_c() => {
                let last_run_ms = state.last_run_started_ms();
                let last_run = (last_run_ms > 0)
                    .then(|| chrono::DateTime::<chrono::Utc>::from_timestamp_millis(last_run_ms))
                    .flatten();
                info!(
                    succeeded = state.runs_succeeded(),
                    failed = state.runs_failed(),
                    last_run = ?last_run,
                    "Shutting down"
                );
                return Ok(());
            }
        }
    }
}

fn log_summary(summary: &RunSummary) {
    match (&summary.error, summary.success) {
        (_, true) => info!(
            event = "RUN_COMPLETE",
            coins = summary.coins_processed,
            upserted = summary.coins_upserted,
            pumps = summary.pumps_detected,
            dumps = summary.dumps_detected,
            "RUN OK     | coins: {} | upserted: {} | failed: {} | pumps: {} | dumps: {} | elapsed: {:.2}s",
            summary.coins_processed,
            summary.coins_upserted,
            summary.coins_failed,
            summary.pumps_detected,
            summary.dumps_detected,
            summary.elapsed_seconds,
        ),
        (Some(err), false) => warn!(event = "RUN_FAILED", "RUN FAILED | {err}"),
        (None, false) => warn!(event = "RUN_FAILED", "RUN FAILED"),
    }
}
