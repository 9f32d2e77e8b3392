//! update1d - Flatcar update check daemon
//!
//! Periodically compares the published release with the running one and
//! announces new releases on com.coreos.update1.

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use update1d::config::{Config, DaemonArgs};

#[tokio::main]
async fn main() -> Result<()> {
    let args = DaemonArgs::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    info!("[BOOT] update1d v{} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::resolve(&args)?;

    if let Err(e) = update1d::daemon::run(config).await {
        error!("[FATAL] {:#}", e);
        std::process::exit(1);
    }

    info!("Shut down cleanly");
    Ok(())
}
