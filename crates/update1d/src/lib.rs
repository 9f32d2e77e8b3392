//! update1d library - exposes modules for testing.

pub mod config;
pub mod control;
pub mod daemon;
pub mod dbus;
pub mod fakes;
pub mod jitter;
pub mod scheduler;
pub mod sources;
pub mod store;
