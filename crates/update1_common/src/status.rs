//! Update status as exposed on the bus.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::UpdateError;

/// Candidate version reported before any new version has been seen
pub const NO_VERSION: &str = "0.0.0";

/// Bus representation: `(last_checked_time, progress, current_operation,
/// new_version, new_size)`, signature `xdssx`.
pub type StatusTuple = (i64, f64, String, String, i64);

/// Current operation of the update manager.
///
/// Only two of update_engine's operations are ever reported; the others
/// describe download/apply phases this daemon does not have.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum UpdateOperation {
    #[default]
    #[serde(rename = "UPDATE_STATUS_IDLE")]
    Idle,
    #[serde(rename = "UPDATE_STATUS_UPDATED_NEED_REBOOT")]
    UpdatedNeedReboot,
}

impl UpdateOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateOperation::Idle => "UPDATE_STATUS_IDLE",
            UpdateOperation::UpdatedNeedReboot => "UPDATE_STATUS_UPDATED_NEED_REBOOT",
        }
    }
}

impl fmt::Display for UpdateOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UpdateOperation {
    type Err = UpdateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UPDATE_STATUS_IDLE" => Ok(UpdateOperation::Idle),
            "UPDATE_STATUS_UPDATED_NEED_REBOOT" => Ok(UpdateOperation::UpdatedNeedReboot),
            other => Err(UpdateError::UnknownOperation(other.to_string())),
        }
    }
}

/// Snapshot of the update manager state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    /// Unix seconds of the last completed check, 0 before the first one
    pub last_checked_time: i64,
    /// Always 0.0, kept for protocol compatibility
    pub progress: f64,
    pub current_operation: UpdateOperation,
    pub new_version: String,
    /// Always 0, kept for protocol compatibility
    pub new_size: i64,
}

impl Default for Status {
    fn default() -> Self {
        Self {
            last_checked_time: 0,
            progress: 0.0,
            current_operation: UpdateOperation::Idle,
            new_version: NO_VERSION.to_string(),
            new_size: 0,
        }
    }
}

impl Status {
    pub fn needs_reboot(&self) -> bool {
        self.current_operation == UpdateOperation::UpdatedNeedReboot
    }

    /// Fields in `GetStatus`/`StatusUpdate` order
    pub fn to_wire(&self) -> StatusTuple {
        (
            self.last_checked_time,
            self.progress,
            self.current_operation.to_string(),
            self.new_version.clone(),
            self.new_size,
        )
    }
}

/// Status as read off the bus.
///
/// update_engine itself reports download and apply phases, so the
/// operation is kept exactly as sent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    pub last_checked_time: i64,
    pub progress: f64,
    pub current_operation: String,
    pub new_version: String,
    pub new_size: i64,
}

impl StatusReport {
    pub fn needs_reboot(&self) -> bool {
        matches!(
            self.current_operation.parse::<UpdateOperation>(),
            Ok(UpdateOperation::UpdatedNeedReboot)
        )
    }
}

impl From<StatusTuple> for StatusReport {
    fn from(
        (last_checked_time, progress, current_operation, new_version, new_size): StatusTuple,
    ) -> Self {
        Self {
            last_checked_time,
            progress,
            current_operation,
            new_version,
            new_size,
        }
    }
}

impl From<&Status> for StatusReport {
    fn from(status: &Status) -> Self {
        status.to_wire().into()
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LastCheckedTime={} Progress={} CurrentOperation={:?} NewVersion={} NewSize={}",
            self.last_checked_time,
            self.progress,
            self.current_operation.as_str(),
            self.new_version,
            self.new_size
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_idle() {
        let status = Status::default();
        assert_eq!(status.last_checked_time, 0);
        assert_eq!(status.progress, 0.0);
        assert_eq!(status.current_operation, UpdateOperation::Idle);
        assert_eq!(status.new_version, NO_VERSION);
        assert_eq!(status.new_size, 0);
        assert!(!status.needs_reboot());
    }

    #[test]
    fn test_operation_wire_strings() {
        assert_eq!(UpdateOperation::Idle.to_string(), "UPDATE_STATUS_IDLE");
        assert_eq!(
            UpdateOperation::UpdatedNeedReboot.to_string(),
            "UPDATE_STATUS_UPDATED_NEED_REBOOT"
        );
        assert_eq!(
            "UPDATE_STATUS_UPDATED_NEED_REBOOT".parse::<UpdateOperation>().unwrap(),
            UpdateOperation::UpdatedNeedReboot
        );
    }

    #[test]
    fn test_unknown_operation_rejected() {
        // update_engine reports download phases we never produce
        let err = "UPDATE_STATUS_DOWNLOADING".parse::<UpdateOperation>().unwrap_err();
        assert!(matches!(err, UpdateError::UnknownOperation(_)));
    }

    #[test]
    fn test_wire_tuple_order() {
        let status = Status {
            last_checked_time: 1_611_830_000,
            progress: 0.0,
            current_operation: UpdateOperation::UpdatedNeedReboot,
            new_version: "2605.12.0".to_string(),
            new_size: 0,
        };
        let wire = status.to_wire();
        assert_eq!(wire.0, 1_611_830_000);
        assert_eq!(wire.2, "UPDATE_STATUS_UPDATED_NEED_REBOOT");
        assert_eq!(wire.3, "2605.12.0");

        let report = StatusReport::from(wire);
        assert_eq!(report, StatusReport::from(&status));
        assert!(report.needs_reboot());
    }

    #[test]
    fn test_report_keeps_foreign_operation() {
        let report = StatusReport::from((
            0,
            0.42,
            "UPDATE_STATUS_DOWNLOADING".to_string(),
            "2605.12.0".to_string(),
            1024,
        ));
        assert_eq!(report.current_operation, "UPDATE_STATUS_DOWNLOADING");
        assert!(!report.needs_reboot());
    }

    #[test]
    fn test_display_log_line() {
        let line = Status::default().to_string();
        assert_eq!(
            line,
            "LastCheckedTime=0 Progress=0 CurrentOperation=\"UPDATE_STATUS_IDLE\" NewVersion=0.0.0 NewSize=0"
        );
    }
}
