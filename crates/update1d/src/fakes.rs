//! Fake collaborators for deterministic testing.
//!
//! No network, no bus, no files: each fake records what the scheduler asked
//! of it and answers from pre-configured state.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use update1_common::{Status, UpdateError};

use crate::sources::{LocalVersionProvider, SentinelMarker, StatusNotifier, VersionSource};

// ============================================================================
// Version source
// ============================================================================

/// Version source answering with a settable version (or failure).
///
/// With a gate, every fetch first waits for one permit, which lets tests
/// hold a check in flight.
pub struct FakeVersionSource {
    version: Mutex<Option<String>>,
    gate: Option<Arc<Semaphore>>,
    fetches: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeVersionSource {
    pub fn with_version(version: &str) -> Self {
        Self {
            version: Mutex::new(Some(version.to_string())),
            gate: None,
            fetches: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Every fetch fails with an HTTP error
    pub fn failing() -> Self {
        let source = Self::with_version("");
        source.fail();
        source
    }

    /// Fetches block until a permit is added to the returned semaphore
    pub fn gated(version: &str) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        let mut source = Self::with_version(version);
        source.gate = Some(Arc::clone(&gate));
        (source, gate)
    }

    pub fn set_version(&self, version: &str) {
        *self.version.lock().unwrap() = Some(version.to_string());
    }

    pub fn fail(&self) {
        *self.version.lock().unwrap() = None;
    }

    /// Number of fetches started
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Highest number of fetches observed running at once
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl VersionSource for FakeVersionSource {
    async fn fetch(&self, url: &str) -> Result<String, UpdateError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        let result = self
            .version
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| UpdateError::Http(format!("fake fetch of {} failed", url)));

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

// ============================================================================
// Local version
// ============================================================================

/// Local provider with a fixed answer
pub struct FakeLocalVersion(pub Option<String>);

impl FakeLocalVersion {
    pub fn new(version: &str) -> Self {
        Self(Some(version.to_string()))
    }

    pub fn missing() -> Self {
        Self(None)
    }
}

#[async_trait]
impl LocalVersionProvider for FakeLocalVersion {
    async fn current_version(&self) -> Result<String, UpdateError> {
        self.0
            .clone()
            .ok_or_else(|| UpdateError::MissingKey("VERSION".to_string()))
    }
}

// ============================================================================
// Notifier
// ============================================================================

/// Notifier keeping every emitted status
#[derive(Default)]
pub struct RecordingNotifier {
    emitted: Mutex<Vec<Status>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the status but report a transport failure
    pub fn failing() -> Self {
        let notifier = Self::default();
        notifier.failing.store(true, Ordering::SeqCst);
        notifier
    }

    pub fn emitted(&self) -> Vec<Status> {
        self.emitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl StatusNotifier for RecordingNotifier {
    async fn emit(&self, status: &Status) -> Result<(), UpdateError> {
        self.emitted.lock().unwrap().push(status.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(UpdateError::Notify("fake bus disconnected".to_string()));
        }
        Ok(())
    }
}

// ============================================================================
// Sentinel
// ============================================================================

/// Sentinel counting marks instead of touching a file
#[derive(Default)]
pub struct RecordingSentinel {
    marks: AtomicUsize,
    failing: AtomicBool,
}

impl RecordingSentinel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        let sentinel = Self::default();
        sentinel.failing.store(true, Ordering::SeqCst);
        sentinel
    }

    pub fn marks(&self) -> usize {
        self.marks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SentinelMarker for RecordingSentinel {
    async fn mark_reboot_required(&self) -> Result<(), UpdateError> {
        self.marks.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(UpdateError::Marker {
                path: "/var/run/reboot-required".into(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fake_source_switches_versions() {
        let source = FakeVersionSource::with_version("1");
        assert_eq!(source.fetch("u").await.unwrap(), "1");
        source.set_version("2");
        assert_eq!(source.fetch("u").await.unwrap(), "2");
        source.fail();
        assert!(source.fetch("u").await.is_err());
        assert_eq!(source.fetch_count(), 3);
        assert_eq!(source.max_in_flight(), 1);
    }

    #[tokio::test]
    async fn test_failing_notifier_still_records() {
        let notifier = RecordingNotifier::failing();
        assert!(notifier.emit(&Status::default()).await.is_err());
        assert_eq!(notifier.emitted().len(), 1);
    }
}
