//! Daemon startup and lifetime.

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

use crate::config::Config;
use crate::control::UpdateManager;
use crate::dbus::{self, DbusNotifier};
use crate::scheduler::{Collaborators, UpdateScheduler};
use crate::sources::{HttpVersionSource, LocalVersionProvider, OsReleaseFile, RebootSentinel};
use crate::store::StatusStore;

/// Running OS version, read once for the process lifetime.
///
/// Without it nothing can be judged "new", so failure is fatal.
pub async fn resolve_identity(provider: &dyn LocalVersionProvider) -> Result<String> {
    let version = provider
        .current_version()
        .await
        .context("Running version unknown")?;
    info!("[BOOT] Running version {}", version);
    Ok(version)
}

/// Bring the daemon up and run until the worker dies or a stop signal
/// arrives.
pub async fn run(config: Config) -> Result<()> {
    let os_version = resolve_identity(&OsReleaseFile::new(&config.paths.os_release))
        .await
        .with_context(|| format!("Failed to read {}", config.paths.os_release.display()))?;

    let scheduler_config = config.scheduler_config()?;
    let source = HttpVersionSource::new(config.fetch_timeout())
        .context("Failed to build HTTP client")?;

    let conn = dbus::connect_system_bus().await?;
    let notifier = DbusNotifier::new(&conn)?;

    let store = StatusStore::new();
    let deps = Collaborators {
        source: Arc::new(source),
        notifier: Arc::new(notifier),
        sentinel: Arc::new(RebootSentinel::new(&config.paths.reboot_sentinel)),
    };
    let (scheduler, handle) = UpdateScheduler::new(
        scheduler_config,
        store.clone(),
        deps,
        os_version,
        StdRng::from_entropy(),
    );

    dbus::export(&conn, UpdateManager::new(store, handle)).await?;
    info!("[BOOT] Bus interface exported");

    let mut worker = scheduler.spawn();
    let mut sigterm = signal(SignalKind::terminate()).context("Failed to install SIGTERM handler")?;

    info!("[READY] update1d operational");

    tokio::select! {
        res = &mut worker => {
            error!("[FATAL] Update scheduler stopped unexpectedly");
            res.context("Update scheduler task failed")?;
            anyhow::bail!("Update scheduler stopped");
        }
        _ = tokio::signal::ctrl_c() => info!("Received SIGINT, shutting down"),
        _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
    }

    worker.abort();
    drop(conn);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeLocalVersion;

    #[tokio::test]
    async fn test_identity_resolved() {
        let version = resolve_identity(&FakeLocalVersion::new("2605.11.0"))
            .await
            .unwrap();
        assert_eq!(version, "2605.11.0");
    }

    #[tokio::test]
    async fn test_missing_identity_is_fatal() {
        let err = resolve_identity(&FakeLocalVersion::missing())
            .await
            .unwrap_err();
        assert!(format!("{:#}", err).contains("Couldn't get value for VERSION"));
    }
}
