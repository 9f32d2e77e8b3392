//! Configuration management for update1d.
//!
//! Built-in defaults, overridden by /etc/update1d/config.toml (or the file
//! given with `--config`), overridden by command-line flags.

use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};
use update1_common::UpdateError;

use crate::scheduler::SchedulerConfig;

/// Config file path
pub const CONFIG_PATH: &str = "/etc/update1d/config.toml";

/// Command-line flags of the daemon
#[derive(Parser, Debug, Default)]
#[command(name = "update1d")]
#[command(about = "Checks for new Flatcar releases and announces them on com.coreos.update1")]
#[command(version)]
pub struct DaemonArgs {
    /// Configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Remote location of a version.txt file
    #[arg(long)]
    pub version_url: Option<String>,

    /// The period to wait before performing the initial update check
    #[arg(long, value_parser = humantime::parse_duration)]
    pub interval_initial: Option<Duration>,

    /// The period to wait between update checks
    #[arg(long, value_parser = humantime::parse_duration)]
    pub interval_periodic: Option<Duration>,

    /// The period to fuzz the intervals by
    #[arg(long, value_parser = humantime::parse_duration)]
    pub interval_fuzz: Option<Duration>,

    /// Upper bound for fetching version.txt and the other per-check I/O
    #[arg(long, value_parser = humantime::parse_duration)]
    pub fetch_timeout: Option<Duration>,

    /// os-release file holding the running VERSION
    #[arg(long)]
    pub os_release: Option<PathBuf>,

    /// Flag file touched when a reboot is required
    #[arg(long)]
    pub reboot_sentinel: Option<PathBuf>,

    /// Log filter used when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    pub log_level: String,
}

/// Update check settings
///
/// Durations are written like the flags, e.g. `interval_periodic = "45m"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateConfig {
    #[serde(default = "default_version_url")]
    pub version_url: String,

    #[serde(default = "default_interval_initial", with = "humantime_serde")]
    pub interval_initial: Duration,

    #[serde(default = "default_interval_periodic", with = "humantime_serde")]
    pub interval_periodic: Duration,

    #[serde(default = "default_interval_fuzz", with = "humantime_serde")]
    pub interval_fuzz: Duration,

    #[serde(default = "default_fetch_timeout", with = "humantime_serde")]
    pub fetch_timeout: Duration,
}

fn default_version_url() -> String {
    "https://stable.release.flatcar-linux.net/amd64-usr/current/version.txt".to_string()
}

fn default_interval_initial() -> Duration {
    Duration::from_secs(7 * 60) // same as update_engine
}

fn default_interval_periodic() -> Duration {
    Duration::from_secs(45 * 60) // same as update_engine
}

fn default_interval_fuzz() -> Duration {
    // update_engine used 10 minutes; PXE hosts take longer to boot than
    // VMs, so the wider spread avoids more reboot collisions
    Duration::from_secs(20 * 60)
}

fn default_fetch_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            version_url: default_version_url(),
            interval_initial: default_interval_initial(),
            interval_periodic: default_interval_periodic(),
            interval_fuzz: default_interval_fuzz(),
            fetch_timeout: default_fetch_timeout(),
        }
    }
}

/// Filesystem locations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_os_release")]
    pub os_release: PathBuf,

    /// kured's default reboot sentinel
    #[serde(default = "default_reboot_sentinel")]
    pub reboot_sentinel: PathBuf,
}

fn default_os_release() -> PathBuf {
    PathBuf::from("/etc/os-release")
}

fn default_reboot_sentinel() -> PathBuf {
    PathBuf::from("/var/run/reboot-required")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            os_release: default_os_release(),
            reboot_sentinel: default_reboot_sentinel(),
        }
    }
}

/// Full daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub update: UpdateConfig,

    #[serde(default)]
    pub paths: PathsConfig,
}

impl Config {
    /// Load the file named by `--config`, or the default file if present,
    /// then apply flag overrides.
    ///
    /// A missing default file means defaults; an explicitly named file
    /// must exist and parse.
    pub fn resolve(args: &DaemonArgs) -> Result<Self> {
        let mut config = match &args.config {
            Some(path) => Self::load_from_path(path)?,
            None => Self::load_from_path(Path::new(CONFIG_PATH)).unwrap_or_else(|e| {
                warn!("Config not loaded, using defaults: {:#}", e);
                Config::default()
            }),
        };
        config.apply_args(args);
        Ok(config)
    }

    /// Load config from specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Flags win over the file
    pub fn apply_args(&mut self, args: &DaemonArgs) {
        if let Some(url) = &args.version_url {
            self.update.version_url = url.clone();
        }
        if let Some(d) = args.interval_initial {
            self.update.interval_initial = d;
        }
        if let Some(d) = args.interval_periodic {
            self.update.interval_periodic = d;
        }
        if let Some(d) = args.interval_fuzz {
            self.update.interval_fuzz = d;
        }
        if let Some(d) = args.fetch_timeout {
            self.update.fetch_timeout = d;
        }
        if let Some(p) = &args.os_release {
            self.paths.os_release = p.clone();
        }
        if let Some(p) = &args.reboot_sentinel {
            self.paths.reboot_sentinel = p.clone();
        }
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.update.fetch_timeout
    }

    /// Scheduler settings, validating the version URL and fetch timeout
    pub fn scheduler_config(&self) -> Result<SchedulerConfig, UpdateError> {
        let version_url = reqwest::Url::parse(&self.update.version_url)
            .map_err(|e| UpdateError::InvalidUrl(format!("{}: {}", self.update.version_url, e)))?;

        // A zero timeout fails every fetch before it starts
        if self.update.fetch_timeout.is_zero() {
            return Err(UpdateError::InvalidConfig(
                "fetch timeout must be greater than zero".to_string(),
            ));
        }

        Ok(SchedulerConfig {
            interval_initial: self.update.interval_initial,
            interval_periodic: self.update.interval_periodic,
            interval_fuzz: self.update.interval_fuzz,
            version_url,
            io_timeout: self.update.fetch_timeout,
        })
    }
}
