//! Human-readable output.

use chrono::{DateTime, Utc};
use update1_common::StatusReport;

/// `update_engine_client -status` layout, which scripts already parse
pub fn status_block(status: &StatusReport) -> String {
    format!(
        "LAST_CHECKED_TIME={}\nPROGRESS={:.6}\nCURRENT_OP={}\nNEW_VERSION={}\nNEW_SIZE={}\n",
        status.last_checked_time,
        status.progress,
        status.current_operation,
        status.new_version,
        status.new_size
    )
}

/// One line per received signal
pub fn signal_line(status: &StatusReport) -> String {
    let checked = DateTime::<Utc>::from_timestamp(status.last_checked_time, 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    format!(
        "{} {} (checked {})",
        status.current_operation, status.new_version, checked
    )
}
