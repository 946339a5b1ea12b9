use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

use crate::error::{Result, SpdflowError};

const PROC_BUS_PCI: &str = "/proc/bus/pci";

/// Standard configuration header offsets
pub mod header {
    pub const VENDOR_ID: u32 = 0x00;
    pub const DEVICE_ID: u32 = 0x02;
    pub const REVISION_CLASS: u32 = 0x08;
    pub const SUBSYSTEM_VENDOR_ID: u32 = 0x2C;
    pub const SUBSYSTEM_ID: u32 = 0x2E;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PciAddress {
    pub domain: u16,
    pub bus: u8,
    pub device: u8,
    pub function: u8,
}

impl fmt::Display for PciAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:02x}:{:02x}.{}",
            self.domain, self.bus, self.device, self.function
        )
    }
}

impl PciAddress {
    /// Build from the `bus << 8 | devfn` encoding used by `/proc/bus/pci/devices`
    pub fn from_bdf(bdf: u16) -> Self {
        Self {
            domain: 0,
            bus: (bdf >> 8) as u8,
            device: ((bdf >> 3) & 0x1F) as u8,
            function: (bdf & 0x07) as u8,
        }
    }

    fn config_path(&self) -> PathBuf {
        let base_path = if std::env::var("DOCKER_RUNNING").is_ok() {
            "/host/proc/bus/pci"
        } else {
            PROC_BUS_PCI
        };

        let path = if self.domain > 0 {
            format!(
                "{}/{:04x}:{:02x}/{:02x}.{}",
                base_path, self.domain, self.bus, self.device, self.function
            )
        } else {
            format!(
                "{}/{:02x}/{:02x}.{}",
                base_path, self.bus, self.device, self.function
            )
        };

        PathBuf::from(path)
    }
}

/// Read-only handle on a function's configuration space
pub struct PciHandle {
    file: parking_lot::Mutex<File>,
    address: PciAddress,
}

impl PciHandle {
    pub fn new(address: PciAddress) -> Result<Self> {
        let path = address.config_path();
        let file = OpenOptions::new().read(true).open(&path).map_err(|e| {
            SpdflowError::PciError(format!("Failed to open PCI device {address}: {e}"))
        })?;

        Ok(Self {
            file: parking_lot::Mutex::new(file),
            address,
        })
    }

    pub fn address(&self) -> PciAddress {
        self.address
    }

    fn read_bytes<const N: usize>(&self, offset: u32) -> Result<[u8; N]> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset as u64)).map_err(|e| {
            SpdflowError::PciError(format!(
                "Failed to seek to offset 0x{offset:X} on {}: {e}",
                self.address
            ))
        })?;

        let mut buffer = [0u8; N];
        file.read_exact(&mut buffer).map_err(|e| {
            SpdflowError::PciError(format!(
                "Failed to read at offset 0x{offset:X} on {}: {e}",
                self.address
            ))
        })?;

        Ok(buffer)
    }

    pub fn read8(&self, offset: u32) -> Result<u8> {
        Ok(self.read_bytes::<1>(offset)?[0])
    }

    pub fn read16(&self, offset: u32) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_bytes::<2>(offset)?))
    }

    pub fn read32(&self, offset: u32) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_bytes::<4>(offset)?))
    }
}

/// Identity of one PCI function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PciDeviceInfo {
    pub address: PciAddress,
    pub vendor: u16,
    pub device: u16,
    pub subsystem_vendor: u16,
    pub subsystem_device: u16,
    /// Base class and subclass, e.g. 0x0C05 for SMBus
    pub class: u16,
}

impl PciDeviceInfo {
    pub fn read(handle: &PciHandle) -> Result<Self> {
        let class_rev = handle.read32(header::REVISION_CLASS)?;
        Ok(Self {
            address: handle.address(),
            vendor: handle.read16(header::VENDOR_ID)?,
            device: handle.read16(header::DEVICE_ID)?,
            subsystem_vendor: handle.read16(header::SUBSYSTEM_VENDOR_ID)?,
            subsystem_device: handle.read16(header::SUBSYSTEM_ID)?,
            class: (class_rev >> 16) as u16,
        })
    }
}

/// Parse one line of `/proc/bus/pci/devices` into (address, vendor, device)
fn parse_devices_line(line: &str) -> Option<(PciAddress, u16, u16)> {
    let mut fields = line.split_whitespace();
    let bdf = u16::from_str_radix(fields.next()?, 16).ok()?;
    let ids = u32::from_str_radix(fields.next()?, 16).ok()?;
    Some((PciAddress::from_bdf(bdf), (ids >> 16) as u16, ids as u16))
}

/// List every PCI function, reading its configuration header
pub fn enumerate() -> Result<Vec<PciDeviceInfo>> {
    let listing = std::fs::read_to_string(format!("{PROC_BUS_PCI}/devices"))
        .map_err(|e| SpdflowError::PciError(format!("Failed to list PCI devices: {e}")))?;

    let mut devices = Vec::new();
    for (address, vendor, device) in listing.lines().filter_map(parse_devices_line) {
        match PciHandle::new(address).and_then(|h| PciDeviceInfo::read(&h)) {
            Ok(info) => devices.push(info),
            Err(e) => {
                tracing::debug!("Skipping PCI device {address} ({vendor:04x}:{device:04x}): {e}")
            }
        }
    }

    Ok(devices)
}
