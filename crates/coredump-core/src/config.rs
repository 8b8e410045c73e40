//! Configuration types shared across platforms.
//!
//! Defaults reproduce the stock firmware: a 64 KiB dump read in 1 KiB
//! blocks from the `coredump` partition, served from a WPA2 soft-AP
//! called `ESP_Server`. On Linux the same types are loaded from JSON.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::region::RegionId;

pub const DEFAULT_DUMP_SIZE: u64 = 64 * 1024;
pub const DEFAULT_BLOCK_SIZE: usize = 1024;
pub const DEFAULT_FILENAME: &str = "core.bin";
/// Largest read buffer a session may allocate.
pub const MAX_BLOCK_SIZE: usize = 64 * 1024;

const MAX_SSID_LEN: usize = 32;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 64;

/// Where the payload size comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SizeSource {
    /// Use `total_size`, clamped to the region.
    #[default]
    Fixed,
    /// Use the size the partition table reports.
    Partition,
}

/// Crash-dump download settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DumpConfig {
    pub region: RegionId,
    pub total_size: u64,
    pub block_size: usize,
    /// Suggested download filename.
    pub filename: String,
    pub size_source: SizeSource,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            region: RegionId::core_dump(),
            total_size: DEFAULT_DUMP_SIZE,
            block_size: DEFAULT_BLOCK_SIZE,
            filename: DEFAULT_FILENAME.to_string(),
            size_source: SizeSource::Fixed,
        }
    }
}

impl DumpConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.block_size == 0 {
            return Err(ConfigError::invalid("blockSize", "must be greater than zero"));
        }
        if self.block_size > MAX_BLOCK_SIZE {
            return Err(ConfigError::invalid("blockSize", "must be at most 65536 bytes"));
        }
        if self.size_source == SizeSource::Fixed && self.total_size == 0 {
            return Err(ConfigError::invalid("totalSize", "must be greater than zero"));
        }
        if self.filename.is_empty() {
            return Err(ConfigError::invalid("filename", "must not be empty"));
        }
        if self
            .filename
            .chars()
            .any(|c| matches!(c, '"' | ';' | '\r' | '\n'))
        {
            return Err(ConfigError::invalid(
                "filename",
                "must not contain quotes, semicolons or line breaks",
            ));
        }
        if self.region.label.is_empty() {
            return Err(ConfigError::invalid("region.label", "must not be empty"));
        }
        Ok(())
    }
}

/// Soft-AP authentication mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AuthMode {
    Open,
    WpaWpa2Personal,
}

/// Wi-Fi access point settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AccessPointConfig {
    pub ssid: String,
    /// Empty for an open network.
    pub password: String,
    pub channel: u8,
    pub max_connections: u16,
}

impl Default for AccessPointConfig {
    fn default() -> Self {
        Self {
            ssid: "ESP_Server".to_string(),
            password: "123456789".to_string(),
            channel: 1,
            max_connections: 5,
        }
    }
}

impl AccessPointConfig {
    pub fn auth_mode(&self) -> AuthMode {
        if self.password.is_empty() {
            AuthMode::Open
        } else {
            AuthMode::WpaWpa2Personal
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ssid.is_empty() || self.ssid.len() > MAX_SSID_LEN {
            return Err(ConfigError::invalid(
                "accessPoint.ssid",
                format!("must be 1 to {} bytes", MAX_SSID_LEN),
            ));
        }
        if !self.password.is_empty()
            && !(MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&self.password.len())
        {
            return Err(ConfigError::invalid(
                "accessPoint.password",
                format!(
                    "must be empty or {} to {} bytes",
                    MIN_PASSWORD_LEN, MAX_PASSWORD_LEN
                ),
            ));
        }
        if !(1..=13).contains(&self.channel) {
            return Err(ConfigError::invalid("accessPoint.channel", "must be 1 to 13"));
        }
        Ok(())
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HttpConfig {
    pub port: u16,
    pub max_resp_headers: usize,
    /// Close the least recently used socket when connections run out.
    pub lru_purge_enable: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: 80,
            max_resp_headers: 1024,
            lru_purge_enable: true,
        }
    }
}

/// Complete server settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub dump: DumpConfig,
    pub access_point: AccessPointConfig,
    pub http: HttpConfig,
}

impl Settings {
    /// Parse and validate settings; missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.dump.validate()?;
        self.access_point.validate()
    }
}
