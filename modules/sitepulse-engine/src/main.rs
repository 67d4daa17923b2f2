use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use sqlx::postgres::PgPoolOptions;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sitepulse_common::Config;
use sitepulse_engine::orchestrator::worker_loop;
use sitepulse_engine::store::{migrate, Audit};
use sitepulse_engine::{DueAuditScheduler, EngineDeps, Orchestrator};

#[derive(Debug, Parser)]
#[command(name = "sitepulse-worker", about = "SitePulse audit worker")]
struct Args {
    /// Override the configured worker count.
    #[arg(long)]
    workers: Option<usize>,

    /// Drain the queue once and exit instead of polling forever.
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("sitepulse=info".parse()?))
        .init();

    let args = Args::parse();

    info!("SitePulse worker starting...");

    let config = Config::from_env();
    config.log_redacted();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    migrate(&pool).await?;

    // Rows stuck in running (crashed worker) are visible here rather than
    // silently requeued.
    let (pending, running) = Audit::queue_depth(&pool).await?;
    info!(pending, running, "Audit queue at startup");

    let worker_count = args.workers.unwrap_or(config.worker_count).max(1);
    let poll = Duration::from_secs(config.worker_poll_secs);
    let scheduler_interval = Duration::from_secs(config.scheduler_interval_secs);

    let deps = EngineDeps::from_config(pool.clone(), config)?;
    let orchestrator = Arc::new(Orchestrator::new(deps));

    if args.once {
        let mut drained = 0usize;
        while orchestrator.run_next().await? {
            drained += 1;
        }
        info!(drained, "Queue drained, exiting");
        return Ok(());
    }

    let scheduler = DueAuditScheduler::new(pool);
    let scheduler_task = tokio::spawn(async move {
        scheduler.run_loop(scheduler_interval).await;
    });

    info!(worker_count, "Spawning audit workers");
    let mut workers = Vec::with_capacity(worker_count);
    for _ in 0..worker_count {
        let orchestrator = orchestrator.clone();
        workers.push(tokio::spawn(worker_loop(orchestrator, poll)));
    }

    for worker in workers {
        worker.await?;
    }
    scheduler_task.await?;
    Ok(())
}
