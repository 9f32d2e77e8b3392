//! `KEY=VALUE` lookup for os-release style files.
//!
//! Both the remote `version.txt` and the local `/etc/os-release` use this
//! format. Values are returned verbatim, quotes included.

use crate::error::UpdateError;

/// Key holding the published version in the remote `version.txt`
pub const REMOTE_VERSION_KEY: &str = "FLATCAR_VERSION";

/// Key holding the running version in `/etc/os-release`
pub const LOCAL_VERSION_KEY: &str = "VERSION";

/// Return the value of the first line whose key equals `key`.
///
/// Each line is split at its first `=`. Lines without one, empty lines
/// included, are skipped.
pub fn get_value(key: &str, body: &str) -> Result<String, UpdateError> {
    body.lines()
        .filter_map(|line| line.split_once('='))
        .find(|(k, _)| *k == key)
        .map(|(_, v)| v.to_string())
        .ok_or_else(|| UpdateError::MissingKey(key.to_string()))
}
