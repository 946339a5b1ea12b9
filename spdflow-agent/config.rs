use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use spdflow_raw::controller::{i801, nct6775, piix4};
use spdflow_raw::SPD_ADDRESSES;

use crate::common::lock::DEFAULT_LOCK_PATH;
use crate::error::{Result, SpdflowError};

pub const DEFAULT_LISTEN: &str = "0.0.0.0:9105";
pub const DEFAULT_INTERVAL_SECS: u64 = 5;

/// Host controller family of a configured bus
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    Intel,
    Amd,
    Nuvoton,
}

impl BusKind {
    pub fn name(&self) -> &'static str {
        match self {
            BusKind::Intel => "Intel",
            BusKind::Amd => "AMD",
            BusKind::Nuvoton => "Nuvoton",
        }
    }

    /// I/O ports the controller decodes starting at its base
    pub fn register_span(&self) -> u16 {
        match self {
            BusKind::Intel => i801::reg::SPAN,
            BusKind::Amd => piix4::reg::SPAN,
            BusKind::Nuvoton => nct6775::reg::SPAN,
        }
    }
}

/// One bus declared in the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BusConfig {
    pub kind: BusKind,
    pub base: u16,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub write_protected: bool,
    #[serde(default)]
    pub shared_lock: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMode {
    /// Use the kernel's i2c-dev adapters, falling back to port probing
    /// when none are bound
    #[default]
    Auto,
    /// Only the kernel's `/dev/i2c-N` adapters
    Kernel,
    /// Scan PCI and the Super-I/O for controllers and drive them through
    /// `/dev/port`
    Port,
    /// Use only the `buses` table
    Configured,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExportConfig {
    pub listen: SocketAddr,
    pub interval_secs: u64,
    pub addresses: Vec<u8>,
    pub discovery: DiscoveryMode,
    pub buses: Vec<BusConfig>,
    pub lock_path: PathBuf,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([0, 0, 0, 0], 9105)),
            interval_secs: DEFAULT_INTERVAL_SECS,
            addresses: SPD_ADDRESSES.collect(),
            discovery: DiscoveryMode::Auto,
            buses: Vec::new(),
            lock_path: PathBuf::from(DEFAULT_LOCK_PATH),
        }
    }
}

impl ExportConfig {
    /// Defaults: every SPD address on every discovered bus
    pub fn auto_detect() -> Self {
        let config = Self::default();
        tracing::info!(
            "Using automatic bus discovery, SPD addresses 0x{:02x}-0x{:02x}",
            SPD_ADDRESSES.start(),
            SPD_ADDRESSES.end()
        );
        config
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::parse(&text)?;
        tracing::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(address) = self.addresses.iter().find(|a| !SPD_ADDRESSES.contains(*a)) {
            return Err(SpdflowError::InvalidConfiguration(format!(
                "address 0x{address:02x} is outside the SPD range 0x{:02x}-0x{:02x}",
                SPD_ADDRESSES.start(),
                SPD_ADDRESSES.end()
            )));
        }
        if self.interval_secs == 0 {
            return Err(SpdflowError::InvalidConfiguration(
                "interval_secs must be at least 1".to_string(),
            ));
        }
        if self.discovery == DiscoveryMode::Configured && self.buses.is_empty() {
            return Err(SpdflowError::InvalidConfiguration(
                "configured discovery needs at least one [[buses]] entry".to_string(),
            ));
        }
        for bus in &self.buses {
            if bus.base.checked_add(bus.kind.register_span() - 1).is_none() {
                return Err(SpdflowError::InvalidConfiguration(format!(
                    "{} bus base 0x{:04x} leaves no room for its {} registers",
                    bus.kind.name(),
                    bus.base,
                    bus.kind.register_span()
                )));
            }
        }
        Ok(())
    }
}

fn parse_address(s: &str) -> Option<u8> {
    let s = s.trim();
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16).ok(),
        None => s.parse().ok(),
    }
}

/// Parse address lists like "0x50-0x53,0x55" into a sorted, deduplicated list
pub fn parse_address_list(s: &str) -> Result<Vec<u8>> {
    let mut addresses = Vec::new();

    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let invalid = || SpdflowError::ConfigError(format!("Invalid address or range: {part}"));
        if let Some((start, end)) = part.split_once('-') {
            let start = parse_address(start).ok_or_else(invalid)?;
            let end = parse_address(end).ok_or_else(invalid)?;
            addresses.extend(start..=end);
        } else {
            addresses.push(parse_address(part).ok_or_else(invalid)?);
        }
    }

    addresses.sort_unstable();
    addresses.dedup();
    Ok(addresses)
}
