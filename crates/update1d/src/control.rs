//! Control surface - transport-independent update manager operations.
//!
//! The bus object in `crate::dbus` is a thin adapter over this type.

use tracing::info;
use update1_common::{Status, UpdateError};

use crate::scheduler::SchedulerHandle;
use crate::store::StatusStore;

#[derive(Clone)]
pub struct UpdateManager {
    store: StatusStore,
    scheduler: SchedulerHandle,
}

impl UpdateManager {
    pub fn new(store: StatusStore, scheduler: SchedulerHandle) -> Self {
        Self { store, scheduler }
    }

    /// Latest committed status
    pub async fn get_status(&self) -> Status {
        self.store.snapshot().await
    }

    /// Operator reset back to idle
    pub async fn reset_status(&self) -> Result<(), UpdateError> {
        info!("Status reset requested");
        self.scheduler.reset_status().await
    }

    /// Ask for a check now. Does not wait for the check result.
    pub async fn attempt_update(&self) -> Result<(), UpdateError> {
        info!("AttemptUpdate called");
        self.scheduler.attempt_update().await
    }

    pub fn scheduler(&self) -> &SchedulerHandle {
        &self.scheduler
    }
}
