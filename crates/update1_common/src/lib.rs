//! Shared types for the update1 daemon and its client.
//!
//! Both sides of the `com.coreos.update1` bus interface agree on the status
//! tuple, the operation strings and the object coordinates defined here.

pub mod dbus;
pub mod error;
pub mod kv;
pub mod status;

pub use error::UpdateError;
pub use status::{Status, StatusReport, StatusTuple, UpdateOperation, NO_VERSION};
