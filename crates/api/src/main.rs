//! Hourmark service entry point.
//!
//! Loads configuration, runs migrations, starts the sync scheduler and
//! worker pool, and shuts everything down cleanly on ctrl-c.

use hourmark_api::AppContext;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    match dotenvy::dotenv() {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!("no .env file found"),
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(e) => {
            error!(error = %e, "failed to start runtime");
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run()) {
        error!(error = %e, "hourmark exited with error");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = hourmark_infra::config::load()?;
    let ctx = AppContext::new(config)?;

    let (mut scheduler, mut workers) = ctx.background_workers();

    if ctx.config.sync.enabled {
        workers.start().map_err(anyhow::Error::msg)?;
        scheduler.start().await?;
        info!("background sync started");
    } else {
        warn!("background sync disabled by configuration");
    }

    info!("hourmark running; press ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");

    ctx.shutdown();
    if workers.is_running() {
        if let Err(e) = workers.stop().await {
            warn!(error = %e, "worker pool did not stop cleanly");
        }
    }
    if scheduler.is_running() {
        if let Err(e) = scheduler.stop().await {
            warn!(error = %e, "scheduler did not stop cleanly");
        }
    }

    info!("hourmark stopped");
    Ok(())
}
