//! System bus transport for `com.coreos.update1`.
//!
//! Exposes the same object, interface, methods and signal as update_engine
//! so locksmithd, update operators and `update_engine_client` keep working.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::info;
use update1_common::dbus::{BUS_NAME, OBJECT_PATH};
use update1_common::{Status, UpdateError};
use zbus::fdo::{self, RequestNameFlags, RequestNameReply};
use zbus::{interface, Connection, SignalContext};

use crate::control::UpdateManager;
use crate::sources::StatusNotifier;

/// Object served at `/com/coreos/update1`
pub struct ManagerObject {
    manager: UpdateManager,
}

impl ManagerObject {
    pub fn new(manager: UpdateManager) -> Self {
        Self { manager }
    }
}

#[interface(name = "com.coreos.update1.Manager")]
impl ManagerObject {
    #[zbus(out_args(
        "last_checked_time",
        "progress",
        "current_operation",
        "new_version",
        "new_size"
    ))]
    async fn get_status(&self) -> (i64, f64, String, String, i64) {
        self.manager.get_status().await.to_wire()
    }

    async fn reset_status(&self) -> fdo::Result<()> {
        self.manager.reset_status().await.map_err(to_fdo)
    }

    async fn attempt_update(&self) -> fdo::Result<()> {
        self.manager.attempt_update().await.map_err(to_fdo)
    }

    #[zbus(signal)]
    async fn status_update(
        ctxt: &SignalContext<'_>,
        last_checked_time: i64,
        progress: f64,
        current_operation: &str,
        new_version: &str,
        new_size: i64,
    ) -> zbus::Result<()>;
}

fn to_fdo(e: UpdateError) -> fdo::Error {
    fdo::Error::Failed(e.to_string())
}

/// Emits `StatusUpdate` on the update manager object
pub struct DbusNotifier {
    ctxt: SignalContext<'static>,
}

impl DbusNotifier {
    pub fn new(conn: &Connection) -> Result<Self> {
        let ctxt = SignalContext::new(conn, OBJECT_PATH)
            .context("Failed to create signal context")?
            .into_owned();
        Ok(Self { ctxt })
    }
}

#[async_trait]
impl StatusNotifier for DbusNotifier {
    async fn emit(&self, status: &Status) -> Result<(), UpdateError> {
        ManagerObject::status_update(
            &self.ctxt,
            status.last_checked_time,
            status.progress,
            status.current_operation.as_str(),
            &status.new_version,
            status.new_size,
        )
        .await
        .map_err(|e| UpdateError::Notify(e.to_string()))
    }
}

/// Open a connection to the system bus without claiming any name yet
pub async fn connect_system_bus() -> Result<Connection> {
    zbus::connection::Builder::system()
        .context("Failed to prepare system bus connection")?
        .build()
        .await
        .context("Failed to connect to the system bus")
}

/// Serve the manager object and take ownership of `com.coreos.update1`.
///
/// Fails if another process (update_engine or a second update1d) already
/// owns the name; queuing behind it is never wanted.
pub async fn export(conn: &Connection, manager: UpdateManager) -> Result<()> {
    conn.object_server()
        .at(OBJECT_PATH, ManagerObject::new(manager))
        .await
        .with_context(|| format!("Failed to export object at {}", OBJECT_PATH))?;

    let reply = conn
        .request_name_with_flags(BUS_NAME, RequestNameFlags::DoNotQueue.into())
        .await
        .with_context(|| format!("Name is already taken: {}", BUS_NAME))?;

    match reply {
        RequestNameReply::PrimaryOwner | RequestNameReply::AlreadyOwner => {
            info!("Acquired bus name {}", BUS_NAME);
            Ok(())
        }
        other => bail!("Name is already taken: {} ({:?})", BUS_NAME, other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use update1_common::dbus::INTERFACE;
    use zbus::object_server::Interface;

    #[test]
    fn test_interface_name_matches_update_engine() {
        assert_eq!(<ManagerObject as Interface>::name().as_str(), INTERFACE);
    }

    #[test]
    fn test_errors_surface_as_failed() {
        match to_fdo(UpdateError::WorkerStopped) {
            fdo::Error::Failed(msg) => assert_eq!(msg, "Update scheduler is not running"),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
