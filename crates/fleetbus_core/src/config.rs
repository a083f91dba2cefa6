/*
    fleetbus
    A control and telemetry gateway for Modbus/TCP VFD fleets.

    Copyright (c) 2026 fleetbus contributors

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    config.rs

    The two parsed configuration documents the core consumes: site config
    (drive list plus bind/UI metadata) and the profile catalogue. Loading
    these from disk is the only startup failure that is fatal.
*/

use std::net::IpAddr;
use std::path::Path;

use serde::Deserialize;

use crate::address::DriveAddress;
use crate::profile::ProfileCatalogue;

#[derive(Clone, Debug, Deserialize)]
pub struct DriveConfig {
    pub ip: IpAddr,
    #[serde(default = "default_modbus_port")]
    pub port: u16,
    pub unit: u8,

    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub fan_number: u32,
    #[serde(default)]
    pub description: String,

    #[serde(default = "default_rpm_per_hz")]
    pub rpm_per_hz: f64,
    #[serde(default = "default_cfm_per_rpm")]
    pub cfm_per_rpm: f64,

    pub drive_family: String,
}

impl DriveConfig {
    pub fn address(&self) -> DriveAddress {
        DriveAddress { ip: self.ip, port: self.port, unit: self.unit }
    }
}

fn default_modbus_port() -> u16 {
    502
}
fn default_rpm_per_hz() -> f64 {
    1.0
}
fn default_cfm_per_rpm() -> f64 {
    1.0
}

#[derive(Clone, Debug, Deserialize)]
pub struct SiteConfig {
    pub site_label: String,
    pub bind_address: IpAddr,
    pub bind_port: u16,
    #[serde(default)]
    pub no_fanhold: bool,
    #[serde(default)]
    pub group_label: String,
    pub drives: Vec<DriveConfig>,
}

/// Read-only view over the configured drives, keyed by address or group.
/// Built once from `SiteConfig.drives` at startup.
#[derive(Clone, Debug)]
pub struct DriveRegistry {
    drives: Vec<DriveConfig>,
}

impl DriveRegistry {
    pub fn new(drives: Vec<DriveConfig>) -> DriveRegistry {
        DriveRegistry { drives }
    }

    pub fn all(&self) -> &[DriveConfig] {
        &self.drives
    }

    pub fn by_address(&self, address: &DriveAddress) -> Option<&DriveConfig> {
        self.drives.iter().find(|d| &d.address() == address)
    }

    /// Every drive whose group matches one of `groups`; an empty slice
    /// means every configured drive.
    pub fn by_groups(&self, groups: &[String]) -> Vec<&DriveConfig> {
        if groups.is_empty() {
            return self.drives.iter().collect();
        }
        self.drives.iter().filter(|d| groups.iter().any(|g| g == &d.group)).collect()
    }
}

impl SiteConfig {
    pub fn load(path: &Path) -> anyhow::Result<SiteConfig> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading site config {}: {e}", path.display()))?;
        let config: SiteConfig = toml::from_str(&text)
            .map_err(|e| anyhow::anyhow!("parsing site config {}: {e}", path.display()))?;
        Ok(config)
    }
}

impl ProfileCatalogue {
    pub fn load(path: &Path) -> anyhow::Result<ProfileCatalogue> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("reading profile catalogue {}: {e}", path.display()))?;
        let catalogue: ProfileCatalogue = toml::from_str(&text)
            .map_err(|e| anyhow::anyhow!("parsing profile catalogue {}: {e}", path.display()))?;
        Ok(catalogue)
    }
}
