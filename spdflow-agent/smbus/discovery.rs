//! Finding the SMBus host controllers of this machine

use std::path::PathBuf;
use std::sync::Arc;

use spdflow_raw::controller::i801::{self, HostConfig, SMBUS_FIXED_ADDRESS};
use spdflow_raw::controller::{nct6775, piix4, superio, vendor, PCI_CLASS_SMBUS};
use spdflow_raw::{PortIo, Register};

use super::{BusInfo, ControllerKind, Nct6775, Piix4, SmbusController, I801};
use crate::common::{pci, GlobalBusLock, SuperIo};
use crate::config::{BusConfig, BusKind};
use crate::error::Result;

/// Source of ready-to-use bus controllers
pub trait BusDiscovery {
    fn discover(&self) -> Result<Vec<SmbusController>>;
}

fn build_controller(
    port: &Arc<dyn PortIo>,
    kind: BusKind,
    base: u16,
    info: BusInfo,
    lock_path: Option<&PathBuf>,
) -> Result<SmbusController> {
    let kind = match kind {
        BusKind::Intel => ControllerKind::Intel(I801::new(port.clone(), base)),
        BusKind::Amd => ControllerKind::Amd(Piix4::new(port.clone(), base)),
        BusKind::Nuvoton => ControllerKind::Nuvoton(Nct6775::new(port.clone(), base)),
    };

    let controller = SmbusController::new(kind, info);
    Ok(match lock_path {
        Some(path) => controller.with_global_lock(GlobalBusLock::open(path)?),
        None => controller,
    })
}

/// PCI and Super-I/O probing through `/proc/bus/pci` and raw ports
pub struct LinuxDiscovery {
    port: Arc<dyn PortIo>,
    lock_path: Option<PathBuf>,
}

impl LinuxDiscovery {
    pub fn new(port: Arc<dyn PortIo>) -> Self {
        Self {
            port,
            lock_path: None,
        }
    }

    /// Serialize every discovered bus with other processes through `path`
    pub fn with_lock_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_path = Some(path.into());
        self
    }

    fn pci_info(device: &pci::PciDeviceInfo, name: String) -> BusInfo {
        BusInfo {
            name,
            port_id: 0,
            pci_vendor: device.vendor,
            pci_device: device.device,
            pci_subsystem_vendor: device.subsystem_vendor,
            pci_subsystem_device: device.subsystem_device,
            write_protected: false,
        }
    }

    fn intel(&self, device: &pci::PciDeviceInfo) -> Result<Option<SmbusController>> {
        let handle = pci::PciHandle::new(device.address)?;

        let bar = handle.read32(i801::pci::SMBBAR)?;
        let base = if bar & i801::pci::SMBBAR_IO_SPACE != 0 {
            (bar & i801::pci::SMBBAR_MASK) as u16
        } else {
            tracing::warn!(
                "{}: SMBus BAR 0x{bar:08X} is not an I/O BAR, using 0x{SMBUS_FIXED_ADDRESS:04X}",
                device.address
            );
            SMBUS_FIXED_ADDRESS
        };

        let raw = handle.read8(i801::pci::SMBHSTCFG)?;
        let config = Register::<HostConfig>::decode(i801::pci::SMBHSTCFG as u16, raw as u16);
        if let Err(reason) = config.validate() {
            tracing::info!("{}: skipping Intel SMBus: {reason}", device.address);
            return Ok(None);
        }

        let mut info = Self::pci_info(
            device,
            format!("Intel SMBus controller at {} (0x{base:04X})", device.address),
        );
        info.write_protected = config.layout.spd_write_disable;

        Ok(Some(build_controller(
            &self.port,
            BusKind::Intel,
            base,
            info,
            self.lock_path.as_ref(),
        )?))
    }

    fn amd(&self, device: &pci::PciDeviceInfo) -> Result<Vec<SmbusController>> {
        [piix4::PRIMARY_BASE, piix4::AUX_BASE]
            .into_iter()
            .map(|base| {
                let info = Self::pci_info(
                    device,
                    format!("AMD SMBus controller at 0x{base:04X}"),
                );
                build_controller(&self.port, BusKind::Amd, base, info, self.lock_path.as_ref())
            })
            .collect()
    }

    fn nuvoton(&self) -> Result<Option<SmbusController>> {
        let sio = SuperIo::new(self.port.clone(), superio::SIO_PORT);
        let sio = sio.enter()?;

        let id = sio.chip_id()?;
        let Some(chip) = superio::chip_name(id) else {
            tracing::debug!("Super-I/O chip id 0x{id:04X} has no supported SMBus master");
            return Ok(None);
        };

        let base = match sio.smbus_base() {
            Ok(base) => base,
            Err(e) => {
                tracing::warn!("Nuvoton {chip}: {e}, using 0x{:04X}", nct6775::DEFAULT_BASE);
                nct6775::DEFAULT_BASE
            }
        };

        let info = BusInfo {
            name: format!("Nuvoton {chip} SMBus at {base:X}"),
            ..Default::default()
        };

        Ok(Some(build_controller(
            &self.port,
            BusKind::Nuvoton,
            base,
            info,
            self.lock_path.as_ref(),
        )?))
    }
}

impl BusDiscovery for LinuxDiscovery {
    fn discover(&self) -> Result<Vec<SmbusController>> {
        let mut controllers = Vec::new();

        for device in pci::enumerate()? {
            if device.class != PCI_CLASS_SMBUS {
                continue;
            }

            let found = match device.vendor {
                vendor::INTEL => self.intel(&device).map(|c| c.into_iter().collect()),
                vendor::AMD => self.amd(&device),
                _ => continue,
            };

            match found {
                Ok(found) => controllers.extend(found),
                Err(e) => tracing::warn!(
                    "Failed to set up SMBus controller {} ({:04x}:{:04x}): {e}",
                    device.address,
                    device.vendor,
                    device.device
                ),
            }
        }

        match self.nuvoton() {
            Ok(found) => controllers.extend(found),
            Err(e) => tracing::debug!("Super-I/O probe failed: {e}"),
        }

        Ok(controllers)
    }
}

/// Buses listed explicitly in the configuration file
pub struct ConfiguredDiscovery {
    port: Arc<dyn PortIo>,
    buses: Vec<BusConfig>,
    lock_path: Option<PathBuf>,
}

impl ConfiguredDiscovery {
    pub fn new(port: Arc<dyn PortIo>, buses: Vec<BusConfig>) -> Self {
        Self {
            port,
            buses,
            lock_path: None,
        }
    }

    pub fn with_lock_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.lock_path = Some(path.into());
        self
    }
}

impl BusDiscovery for ConfiguredDiscovery {
    fn discover(&self) -> Result<Vec<SmbusController>> {
        self.buses
            .iter()
            .map(|bus| {
                let info = BusInfo {
                    name: bus
                        .name
                        .clone()
                        .unwrap_or_else(|| format!("{} SMBus at 0x{:04X}", bus.kind.name(), bus.base)),
                    write_protected: bus.write_protected,
                    ..Default::default()
                };
                let lock_path = if bus.shared_lock {
                    self.lock_path.as_ref()
                } else {
                    None
                };
                build_controller(&self.port, bus.kind, bus.base, info, lock_path)
            })
            .collect()
    }
}
