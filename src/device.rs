//! Device descriptors and vendor-specific command strings.

use std::fmt;

use secrecy::SecretString;
use serde::Deserialize;

/// Device vendor family, selected per device in the inventory.
///
/// The vendor only affects which pagination-disable command is sent when the
/// shell opens; both supported vendors use the same `display` commands for
/// fetching configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    /// Huawei VRP devices.
    Huawei,
    /// H3C Comware devices.
    H3c,
    /// Unknown vendor; both pagination-disable candidates are tried.
    #[default]
    Unknown,
}

impl Vendor {
    /// Pagination-disable command(s) for this vendor.
    ///
    /// Unknown devices get both candidate strings, sent in sequence with a
    /// short delay between them, best-effort.
    pub fn paging_disable_commands(&self) -> &'static [&'static str] {
        match self {
            Vendor::Huawei => &["screen-length 0 temporary"],
            Vendor::H3c => &["screen-length disable"],
            Vendor::Unknown => &["screen-length 0 temporary", "screen-length disable"],
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vendor::Huawei => write!(f, "huawei"),
            Vendor::H3c => write!(f, "h3c"),
            Vendor::Unknown => write!(f, "unknown"),
        }
    }
}

/// Which configuration a snapshot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigKind {
    /// The in-memory configuration currently applied on the device.
    Running,
    /// The persisted configuration loaded at boot.
    Startup,
}

impl ConfigKind {
    /// Directory / filename component for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKind::Running => "running",
            ConfigKind::Startup => "startup",
        }
    }

    /// The CLI command that dumps this configuration.
    ///
    /// Huawei and H3C both accept the same `display` commands.
    pub fn fetch_command(&self) -> &'static str {
        match self {
            ConfigKind::Running => "display current-configuration",
            ConfigKind::Startup => "display saved-configuration",
        }
    }
}

impl fmt::Display for ConfigKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the device inventory. Immutable per run.
#[derive(Debug, Clone, Deserialize)]
pub struct Device {
    /// Hostname or IP address.
    pub hostname: String,

    /// Username for authentication.
    pub username: String,

    /// Password for authentication.
    pub password: SecretString,

    /// SSH port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Vendor family.
    #[serde(default)]
    pub device_type: Vendor,

    /// Human-readable display name; falls back to the hostname when empty.
    #[serde(default)]
    pub device_name: String,
}

fn default_port() -> u16 {
    22
}

impl Device {
    /// Directory name for this device in the snapshot tree.
    pub fn storage_name(&self) -> &str {
        if self.device_name.is_empty() {
            &self.hostname
        } else {
            &self.device_name
        }
    }

    /// `name(hostname)` label used in reports and logs, matching the
    /// layout downstream report consumers expect.
    pub fn label(&self) -> String {
        if self.device_name.is_empty() || self.device_name == self.hostname {
            self.hostname.clone()
        } else {
            format!("{}({})", self.device_name, self.hostname)
        }
    }
}
