use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::definitions::WL_DELAY_START_CONNECTION;
use crate::sim::SimEnvironment;

/// Controller tunables. Every field has a default, so an empty `[driver]`
/// table is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Wait for the association outcome
    pub connect_timeout_ms: u64,
    /// Wait for a DHCP lease after association
    pub dhcp_timeout_ms: u64,
    /// Wait for the driver to finish a scan
    pub scan_timeout_ms: u64,
    /// Sleep between status checks while waiting
    pub poll_interval_ms: u64,
    /// Soft-AP channel when none was staged
    pub default_ap_channel: u8,
    /// Soft-AP interface address
    pub ap_address: Ipv4Addr,
    pub ap_netmask: Ipv4Addr,
    /// Hostname staged at start-up
    pub hostname: Option<String>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            connect_timeout_ms: WL_DELAY_START_CONNECTION.as_millis() as u64,
            dhcp_timeout_ms: 10_000,
            scan_timeout_ms: 10_000,
            poll_interval_ms: 10,
            default_ap_channel: 1,
            ap_address: Ipv4Addr::new(192, 168, 1, 1),
            ap_netmask: Ipv4Addr::new(255, 255, 255, 0),
            hostname: None,
        }
    }
}

impl DriverConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn dhcp_timeout(&self) -> Duration {
        Duration::from_millis(self.dhcp_timeout_ms)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_millis(self.scan_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Bench configuration: controller tunables plus the simulated radio
/// environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub driver: DriverConfig,
    #[serde(default)]
    pub environment: SimEnvironment,
}

impl Config {
    /// A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        Ok(())
    }
}

pub fn config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(config_dir.join("ambd-wifi").join("sim.toml"))
}
