//! Client side of com.coreos.update1.Manager

use anyhow::{Context, Result};
use update1_common::{StatusReport, StatusTuple};
use zbus::proxy;

#[proxy(
    interface = "com.coreos.update1.Manager",
    default_service = "com.coreos.update1",
    default_path = "/com/coreos/update1",
    gen_blocking = false
)]
pub trait Manager {
    fn get_status(&self) -> zbus::Result<(i64, f64, String, String, i64)>;

    fn reset_status(&self) -> zbus::Result<()>;

    fn attempt_update(&self) -> zbus::Result<()>;

    #[zbus(signal)]
    fn status_update(
        &self,
        last_checked_time: i64,
        progress: f64,
        current_operation: String,
        new_version: String,
        new_size: i64,
    ) -> zbus::Result<()>;
}

/// Fields of a received `StatusUpdate`
pub fn signal_status(signal: &StatusUpdate) -> Result<StatusReport> {
    let args = signal.args()?;
    let tuple: StatusTuple = (
        *args.last_checked_time(),
        *args.progress(),
        args.current_operation().clone(),
        args.new_version().clone(),
        *args.new_size(),
    );
    Ok(tuple.into())
}

pub async fn fetch_status(proxy: &ManagerProxy<'_>) -> Result<StatusReport> {
    let tuple = proxy.get_status().await.context("GetStatus failed")?;
    Ok(tuple.into())
}
