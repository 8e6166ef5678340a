//! crunchd - upgrade-assessment log processing daemon.
//!
//! Performs one scan per invocation: discovers appraiser documents and
//! setup logs under the configured root, extracts structured results and
//! persists each exactly once. Recurring runs are the OS scheduler's job.

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crunchd::config::Settings;
use crunchd::jobs;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("crunchd v{} starting", env!("CARGO_PKG_VERSION"));

    let settings = Settings::load();
    info!("logs root path: {}", settings.logs_root_path.display());
    info!("output path: {}", settings.output_path.display());
    info!("save to database: {}", settings.save_to_database);

    jobs::run(&settings).await?;

    info!("log processing completed");
    Ok(())
}
