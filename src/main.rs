use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use r69_engine::backfill::Backfill;
use r69_engine::config::Config;
use r69_engine::db::open_pool;
use r69_engine::error::Result;

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
    let pool = open_pool(&cfg.db_path, cfg.backfill_concurrency as u32 + 1).await?;
    info!("Database ready at {}", cfg.db_path);

    info!(
        "Backfill config: interval={}s concurrency={} batch_size={} season={} league={}",
        cfg.backfill_interval_secs,
        cfg.backfill_concurrency,
        cfg.backfill_batch_size,
        cfg.season.as_deref().unwrap_or("all"),
        cfg.league.map(|l| l.to_string()).unwrap_or_else(|| "all".to_string()),
    );

    let backfill = Backfill::new(pool, &cfg);

    // --- One shot: a single batch, then exit ---
    if cfg.backfill_interval_secs == 0 {
        let summary = backfill.run_batch().await?;
        info!(
            "Backfill done: {} of {} pending games derived, {} skipped, {} failed",
            summary.derived,
            summary.pending,
            summary.skipped(),
            summary.failed,
        );
        return Ok(());
    }

    // --- Periodic: run until ctrl-c ---
    let job = tokio::spawn(backfill.run());
    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested, stopping backfill");
    job.abort();

    Ok(())
}
