//! Status store - the single status record and its transition rule.

use std::sync::Arc;
use tokio::sync::RwLock;
use update1_common::{Status, UpdateOperation};

/// Result of feeding one completed check into the store
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// A new candidate was recorded; carries the snapshot to announce
    Transitioned(Status),
    /// Nothing changed except the check timestamp
    Unchanged(Status),
}

impl Evaluation {
    pub fn status(&self) -> &Status {
        match self {
            Evaluation::Transitioned(s) | Evaluation::Unchanged(s) => s,
        }
    }

    pub fn transitioned(&self) -> bool {
        matches!(self, Evaluation::Transitioned(_))
    }
}

/// Shared handle to the process status.
///
/// Readers take snapshots from any task; `evaluate` and `reset` are only
/// called from the scheduler worker. Every mutation happens under a single
/// write guard, so a snapshot never sees the operation changed without the
/// version.
#[derive(Clone, Default)]
pub struct StatusStore {
    inner: Arc<RwLock<Status>>,
}

impl StatusStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a completed check.
    ///
    /// Versions are compared as opaque strings. Comparing against the
    /// recorded candidate as well as the local version keeps a release
    /// that was already announced from being announced again.
    pub async fn evaluate(&self, candidate: &str, local: &str, checked_at: i64) -> Evaluation {
        let mut status = self.inner.write().await;
        status.last_checked_time = checked_at;

        if candidate != local && candidate != status.new_version {
            status.new_version = candidate.to_string();
            status.current_operation = UpdateOperation::UpdatedNeedReboot;
            Evaluation::Transitioned(status.clone())
        } else {
            Evaluation::Unchanged(status.clone())
        }
    }

    /// Back to the idle default, whatever the current state
    pub async fn reset(&self) {
        *self.inner.write().await = Status::default();
    }

    pub async fn snapshot(&self) -> Status {
        self.inner.read().await.clone()
    }
}
