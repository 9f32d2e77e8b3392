//! Error types for update checks.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpdateError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Unexpected HTTP status from {url}: {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Couldn't get value for {0}")]
    MissingKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    #[error("Failed to emit status update: {0}")]
    Notify(String),

    #[error("Failed to mark reboot required at {}: {source}", path.display())]
    Marker {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Update scheduler is not running")]
    WorkerStopped,

    #[error("Unknown update operation: {0}")]
    UnknownOperation(String),

    #[error("Invalid version URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_key_message() {
        let err = UpdateError::MissingKey("FLATCAR_VERSION".to_string());
        assert_eq!(err.to_string(), "Couldn't get value for FLATCAR_VERSION");
    }

    #[test]
    fn test_timeout_message_names_operation() {
        let err = UpdateError::Timeout {
            operation: "version fetch",
            after: Duration::from_secs(60),
        };
        assert!(err.to_string().starts_with("version fetch timed out"));
    }
}
