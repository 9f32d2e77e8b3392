//! Bus coordinates of the update manager.
//!
//! These match update_engine exactly so existing tooling (locksmith, the
//! flatcar-linux-update-operator, kured setups) keeps working.

pub const BUS_NAME: &str = "com.coreos.update1";
pub const OBJECT_PATH: &str = "/com/coreos/update1";
pub const INTERFACE: &str = "com.coreos.update1.Manager";
