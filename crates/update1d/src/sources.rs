//! Collaborator seams used by the scheduler.
//!
//! Production code uses the HTTP/file implementations below; tests use the
//! fakes in `crate::fakes`.

use async_trait::async_trait;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::debug;
use update1_common::kv::{get_value, LOCAL_VERSION_KEY, REMOTE_VERSION_KEY};
use update1_common::{Status, UpdateError};

/// Latest published OS version
#[async_trait]
pub trait VersionSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, UpdateError>;
}

/// Version of the running OS
#[async_trait]
pub trait LocalVersionProvider: Send + Sync {
    async fn current_version(&self) -> Result<String, UpdateError>;
}

/// Marker read by reboot managers such as kured
#[async_trait]
pub trait SentinelMarker: Send + Sync {
    async fn mark_reboot_required(&self) -> Result<(), UpdateError>;
}

/// Outbound `StatusUpdate` announcements
#[async_trait]
pub trait StatusNotifier: Send + Sync {
    async fn emit(&self, status: &Status) -> Result<(), UpdateError>;
}

// ============================================================================
// HTTP version source
// ============================================================================

/// Fetches a `version.txt` and reads `FLATCAR_VERSION` from it
pub struct HttpVersionSource {
    client: reqwest::Client,
}

impl HttpVersionSource {
    pub fn new(timeout: Duration) -> Result<Self, UpdateError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("update1d/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| UpdateError::Http(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl VersionSource for HttpVersionSource {
    async fn fetch(&self, url: &str) -> Result<String, UpdateError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| UpdateError::Http(e.to_string()))?;

        if !response.status().is_success() {
            return Err(UpdateError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| UpdateError::Http(e.to_string()))?;

        get_value(REMOTE_VERSION_KEY, &body)
    }
}

// ============================================================================
// os-release
// ============================================================================

/// Reads `VERSION` from an os-release file
pub struct OsReleaseFile {
    path: PathBuf,
}

impl OsReleaseFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl LocalVersionProvider for OsReleaseFile {
    async fn current_version(&self) -> Result<String, UpdateError> {
        let body = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            UpdateError::Io(std::io::Error::new(
                e.kind(),
                format!("reading file {:?}: {}", self.path, e),
            ))
        })?;

        get_value(LOCAL_VERSION_KEY, &body)
    }
}

// ============================================================================
// Reboot sentinel
// ============================================================================

/// Touches the reboot-required flag file
pub struct RebootSentinel {
    path: PathBuf,
}

impl RebootSentinel {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

}

fn touch(path: &Path) -> std::io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    file.set_modified(SystemTime::now())
}

#[async_trait]
impl SentinelMarker for RebootSentinel {
    async fn mark_reboot_required(&self) -> Result<(), UpdateError> {
        // Off the runtime threads so a hung filesystem cannot outlive the
        // caller's timeout
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || touch(&path))
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))
            .and_then(|res| res)
            .map_err(|source| UpdateError::Marker {
                path: self.path.clone(),
                source,
            })?;
        debug!("Touched reboot sentinel {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_os_release_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("os-release");
        std::fs::write(
            &path,
            "NAME=\"Flatcar Container Linux by Kinvolk\"\nID=flatcar\nVERSION=2605.11.0\nVERSION_ID=2605.11.0\n",
        )
        .unwrap();

        let provider = OsReleaseFile::new(&path);
        assert_eq!(provider.current_version().await.unwrap(), "2605.11.0");
    }

    #[tokio::test]
    async fn test_os_release_missing_key() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("os-release");
        std::fs::write(&path, "ID=flatcar\n").unwrap();

        let err = OsReleaseFile::new(&path).current_version().await.unwrap_err();
        assert!(matches!(err, UpdateError::MissingKey(_)));
    }

    #[tokio::test]
    async fn test_os_release_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = OsReleaseFile::new(dir.path().join("absent"))
            .current_version()
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateError::Io(_)));
        assert!(err.to_string().contains("absent"));
    }

    #[tokio::test]
    async fn test_sentinel_created_when_absent() {
        let dir = TempDir::new().unwrap();
        let sentinel = RebootSentinel::new(dir.path().join("reboot-required"));

        sentinel.mark_reboot_required().await.unwrap();
        assert!(sentinel.path().exists());
    }

    #[tokio::test]
    async fn test_sentinel_refreshes_mtime_and_keeps_content() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reboot-required");
        std::fs::write(&path, "kept").unwrap();

        let old = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        std::fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(old)
            .unwrap();

        RebootSentinel::new(&path).mark_reboot_required().await.unwrap();

        let meta = std::fs::metadata(&path).unwrap();
        assert!(meta.modified().unwrap() > old);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "kept");
    }

    #[tokio::test]
    async fn test_sentinel_error_names_path() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing-dir").join("reboot-required");

        let err = RebootSentinel::new(&path)
            .mark_reboot_required()
            .await
            .unwrap_err();
        assert!(matches!(err, UpdateError::Marker { .. }));
        assert!(err.to_string().contains("missing-dir"));
    }

    #[tokio::test]
    async fn test_stuck_sentinel_write_can_time_out() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("reboot-required");
        // Opening a FIFO for writing blocks until a reader shows up
        let status = std::process::Command::new("mkfifo")
            .arg(&path)
            .status()
            .unwrap();
        assert!(status.success());

        let sentinel = RebootSentinel::new(&path);
        let res = tokio::time::timeout(
            Duration::from_millis(100),
            sentinel.mark_reboot_required(),
        )
        .await;
        assert!(res.is_err(), "blocked open should not hold the runtime");

        // Release the stuck open so the blocking pool can drain
        let reader = path.clone();
        tokio::task::spawn_blocking(move || std::fs::File::open(reader))
            .await
            .unwrap()
            .unwrap();
    }
}
