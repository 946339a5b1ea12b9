//! Kernel-owned SMBus adapters through `/dev/i2c-N`
//!
//! When `i2c-i801` or `i2c-piix4` is bound to the host controller the
//! kernel owns its ports, so transactions go through the i2c-dev `I2C_SMBUS`
//! ioctl instead of raw port I/O. Adapters are found under
//! `/sys/bus/i2c/devices` and filtered down to Intel and AMD PCI SMBus
//! functions.

use std::fs::{self, File, OpenOptions};
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use spdflow_raw::controller::i801::{self, HostConfig};
use spdflow_raw::controller::vendor;
use spdflow_raw::i2cdev::{
    self, transaction_size, Functionality, SmbusIoctlData, SYSFS_CLASS_SMBUS,
};
use spdflow_raw::{Direction, Register, SmbusData, SmbusError, SmbusResult, Width};

use super::discovery::BusDiscovery;
use super::{BusInfo, ControllerKind, SmbusController, SmbusEngine};
use crate::error::Result;

pub const SYSFS_I2C_DEVICES: &str = "/sys/bus/i2c/devices";
pub const DEV_ROOT: &str = "/dev";

nix::ioctl_write_int_bad!(set_slave_force, i2cdev::I2C_SLAVE_FORCE);
nix::ioctl_read_bad!(get_funcs, i2cdev::I2C_FUNCS, libc::c_ulong);
nix::ioctl_write_ptr_bad!(smbus_transfer, i2cdev::I2C_SMBUS, SmbusIoctlData);

/// Translate a failed i2c-dev ioctl into the SMBus status taxonomy.
///
/// Kernel bus drivers report NACKs as ENXIO (some as EREMOTEIO or ENODEV),
/// lost arbitration as EAGAIN and PEC mismatches as EBADMSG.
pub fn smbus_error(errno: Errno) -> SmbusError {
    match errno {
        Errno::EBUSY => SmbusError::Busy,
        Errno::ETIMEDOUT => SmbusError::Timeout,
        Errno::ENXIO | Errno::ENODEV | Errno::EREMOTEIO => SmbusError::NoSuchDevice,
        Errno::EAGAIN => SmbusError::TryAgain,
        Errno::EINVAL | Errno::EMSGSIZE => SmbusError::InvalidArgument,
        Errno::EPROTO | Errno::EBADMSG => SmbusError::Protocol,
        Errno::EOPNOTSUPP => SmbusError::OpNotSupported,
        _ => SmbusError::Io,
    }
}

/// One `/dev/i2c-N` adapter
pub struct I2cDev {
    file: File,
    path: PathBuf,
    adapter: u16,
    funcs: Functionality,
}

impl I2cDev {
    /// Open the character device and read the adapter's functionality mask
    pub fn open(path: impl Into<PathBuf>, adapter: u16) -> Result<Self> {
        let path = path.into();
        let file = OpenOptions::new().read(true).write(true).open(&path)?;

        let mut raw: libc::c_ulong = 0;
        // SAFETY: `raw` outlives the call and I2C_FUNCS writes one c_ulong.
        unsafe { get_funcs(file.as_raw_fd(), &mut raw) }?;
        let funcs = Functionality::from_bits_truncate(raw as u32);

        tracing::debug!("{}: functionality 0x{:08x}", path.display(), funcs.bits());
        Ok(Self {
            file,
            path,
            adapter,
            funcs,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn functionality(&self) -> Functionality {
        self.funcs
    }
}

impl SmbusEngine for I2cDev {
    fn family(&self) -> &'static str {
        "i2c-dev"
    }

    /// Adapter number
    fn base(&self) -> u16 {
        self.adapter
    }

    fn access(
        &self,
        address: u8,
        direction: Direction,
        command: u8,
        width: Width,
        data: &mut SmbusData,
    ) -> SmbusResult<()> {
        if !self.funcs.supports(width, direction) {
            return Err(SmbusError::OpNotSupported);
        }

        let fd = self.file.as_raw_fd();
        // SAFETY: I2C_SLAVE_FORCE takes the address by value.
        unsafe { set_slave_force(fd, libc::c_int::from(address)) }.map_err(smbus_error)?;

        let request = SmbusIoctlData {
            read_write: direction as u8,
            command,
            size: transaction_size(width),
            data: data.as_bytes_mut().as_mut_ptr(),
        };
        // SAFETY: `data` has the size and layout of `union i2c_smbus_data`
        // and stays borrowed for the whole call.
        unsafe { smbus_transfer(fd, &request) }.map_err(smbus_error)?;
        Ok(())
    }
}

fn read_trimmed(path: &Path) -> Option<String> {
    fs::read_to_string(path).ok().map(|s| s.trim().to_string())
}

fn read_hex(path: &Path) -> u16 {
    read_trimmed(path)
        .and_then(|s| u16::from_str_radix(s.trim_start_matches("0x"), 16).ok())
        .unwrap_or(0)
}

/// A PCI SMBus adapter found in sysfs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelAdapter {
    pub number: u16,
    pub info: BusInfo,
}

/// i2c-dev adapters of PCI SMBus controllers
pub struct I2cDevDiscovery {
    sysfs_root: PathBuf,
    dev_root: PathBuf,
}

impl Default for I2cDevDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl I2cDevDiscovery {
    pub fn new() -> Self {
        Self::with_roots(SYSFS_I2C_DEVICES, DEV_ROOT)
    }

    pub fn with_roots(sysfs_root: impl Into<PathBuf>, dev_root: impl Into<PathBuf>) -> Self {
        Self {
            sysfs_root: sysfs_root.into(),
            dev_root: dev_root.into(),
        }
    }

    /// Parent PCI function of an adapter directory
    fn pci_device(adapter: &Path) -> Option<PathBuf> {
        let device = adapter.join("device");
        if device.join("vendor").exists() {
            return fs::canonicalize(device).ok();
        }
        adapter.parent().map(Path::to_path_buf)
    }

    fn spd_write_disabled(pci: &Path) -> bool {
        let config = match fs::read(pci.join("config")) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!("{}: cannot read PCI config: {e}", pci.display());
                return false;
            }
        };

        match config.get(i801::pci::SMBHSTCFG as usize) {
            Some(&raw) => {
                Register::<HostConfig>::decode(i801::pci::SMBHSTCFG as u16, raw as u16)
                    .layout
                    .spd_write_disable
            }
            None => {
                tracing::debug!(
                    "{}: host configuration not visible, assuming SPD writes are allowed",
                    pci.display()
                );
                false
            }
        }
    }

    fn adapter(&self, number: u16, entry: &Path) -> Option<KernelAdapter> {
        let adapter = fs::canonicalize(entry).ok()?;
        let pci = Self::pci_device(&adapter)?;

        let pci_vendor = read_hex(&pci.join("vendor"));
        if ![vendor::INTEL, vendor::AMD, vendor::AMD_ATI].contains(&pci_vendor) {
            return None;
        }
        let class = read_trimmed(&pci.join("class")).unwrap_or_default();
        if !class.starts_with(SYSFS_CLASS_SMBUS) {
            tracing::debug!("i2c-{number}: PCI class {class} is not SMBus");
            return None;
        }

        let adapter_name =
            read_trimmed(&adapter.join("name")).unwrap_or_else(|| "SMBus adapter".to_string());

        Some(KernelAdapter {
            number,
            info: BusInfo {
                name: format!("{adapter_name} (i2c-{number})"),
                port_id: 0,
                pci_vendor,
                pci_device: read_hex(&pci.join("device")),
                pci_subsystem_vendor: read_hex(&pci.join("subsystem_vendor")),
                pci_subsystem_device: read_hex(&pci.join("subsystem_device")),
                write_protected: pci_vendor == vendor::INTEL && Self::spd_write_disabled(&pci),
            },
        })
    }

    /// SMBus adapters listed in sysfs, ordered by adapter number
    pub fn adapters(&self) -> Vec<KernelAdapter> {
        let entries = match fs::read_dir(&self.sysfs_root) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::debug!("{}: {e}", self.sysfs_root.display());
                return Vec::new();
            }
        };

        let mut adapters: Vec<KernelAdapter> = entries
            .flatten()
            .filter_map(|entry| {
                let name = entry.file_name();
                let number = name.to_str()?.strip_prefix("i2c-")?.parse().ok()?;
                self.adapter(number, &entry.path())
            })
            .collect();

        adapters.sort_by_key(|adapter| adapter.number);
        adapters
    }
}

impl BusDiscovery for I2cDevDiscovery {
    fn discover(&self) -> Result<Vec<SmbusController>> {
        let mut controllers = Vec::new();

        for adapter in self.adapters() {
            let path = self.dev_root.join(format!("i2c-{}", adapter.number));
            match I2cDev::open(&path, adapter.number) {
                Ok(dev) => controllers.push(SmbusController::new(
                    ControllerKind::Kernel(dev),
                    adapter.info,
                )),
                Err(e) => tracing::warn!(
                    "{}: cannot use {} ({e}), is i2c-dev loaded?",
                    adapter.info.name,
                    path.display()
                ),
            }
        }

        Ok(controllers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;

    fn write(path: &Path, contents: &[u8]) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn pci_function(root: &Path, slot: &str, vendor: &str, class: &str, hstcfg: u8) -> PathBuf {
        let dir = root.join("devices").join(slot);
        write(&dir.join("vendor"), format!("{vendor}\n").as_bytes());
        write(&dir.join("device"), b"0x7a23\n");
        write(&dir.join("subsystem_vendor"), b"0x1043\n");
        write(&dir.join("subsystem_device"), b"0x8882\n");
        write(&dir.join("class"), format!("{class}\n").as_bytes());
        let mut config = vec![0u8; 256];
        config[0x40] = hstcfg;
        write(&dir.join("config"), &config);
        dir
    }

    fn adapter(root: &Path, pci: &Path, number: u16, name: &str) {
        let dir = pci.join(format!("i2c-{number}"));
        write(&dir.join("name"), format!("{name}\n").as_bytes());
        fs::create_dir_all(root.join("bus")).unwrap();
        symlink(&dir, root.join("bus").join(format!("i2c-{number}"))).unwrap();
    }

    fn sysfs() -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        let intel = pci_function(root.path(), "0000:00:1f.4", "0x8086", "0x0c0500", 0x11);
        adapter(root.path(), &intel, 0, "SMBus I801 adapter at efa0");
        let gpu = pci_function(root.path(), "0000:01:00.0", "0x10de", "0x030000", 0);
        adapter(root.path(), &gpu, 1, "NVIDIA i2c adapter 1 at 1:00.0");
        let amd = pci_function(root.path(), "0000:00:14.0", "0x1022", "0x0c0500", 0x11);
        adapter(root.path(), &amd, 2, "SMBus PIIX4 adapter port 0 at 0b00");
        fs::create_dir_all(root.path().join("bus").join("0-0050")).unwrap();
        root
    }

    #[test]
    fn test_errno_mapping() {
        assert_eq!(smbus_error(Errno::ENXIO), SmbusError::NoSuchDevice);
        assert_eq!(smbus_error(Errno::EREMOTEIO), SmbusError::NoSuchDevice);
        assert_eq!(smbus_error(Errno::EBUSY), SmbusError::Busy);
        assert_eq!(smbus_error(Errno::ETIMEDOUT), SmbusError::Timeout);
        assert_eq!(smbus_error(Errno::EAGAIN), SmbusError::TryAgain);
        assert_eq!(smbus_error(Errno::EINVAL), SmbusError::InvalidArgument);
        assert_eq!(smbus_error(Errno::EBADMSG), SmbusError::Protocol);
        assert_eq!(smbus_error(Errno::EPROTO), SmbusError::Protocol);
        assert_eq!(smbus_error(Errno::EOPNOTSUPP), SmbusError::OpNotSupported);
        assert_eq!(smbus_error(Errno::EIO), SmbusError::Io);
        assert_eq!(smbus_error(Errno::EPERM), SmbusError::Io);
    }

    #[test]
    fn test_transient_errnos_stay_retryable() {
        assert!(smbus_error(Errno::EBUSY).is_transient());
        assert!(smbus_error(Errno::ETIMEDOUT).is_transient());
        assert!(!smbus_error(Errno::ENXIO).is_transient());
    }

    #[test]
    fn test_adapters_from_sysfs() {
        let root = sysfs();
        let discovery = I2cDevDiscovery::with_roots(root.path().join("bus"), root.path());

        let adapters = discovery.adapters();
        assert_eq!(adapters.len(), 2);

        let intel = &adapters[0];
        assert_eq!(intel.number, 0);
        assert_eq!(intel.info.name, "SMBus I801 adapter at efa0 (i2c-0)");
        assert_eq!(intel.info.pci_vendor, 0x8086);
        assert_eq!(intel.info.pci_device, 0x7a23);
        assert_eq!(intel.info.pci_subsystem_vendor, 0x1043);
        assert!(intel.info.write_protected);

        let amd = &adapters[1];
        assert_eq!(amd.number, 2);
        assert_eq!(amd.info.pci_vendor, 0x1022);
        assert!(!amd.info.write_protected);
    }

    #[test]
    fn test_missing_sysfs_finds_nothing() {
        let root = tempfile::tempdir().unwrap();
        let discovery = I2cDevDiscovery::with_roots(root.path().join("absent"), root.path());
        assert!(discovery.adapters().is_empty());
        assert!(discovery.discover().unwrap().is_empty());
    }

    #[test]
    fn test_non_adapter_nodes_are_skipped() {
        let root = sysfs();
        let dev = tempfile::tempdir().unwrap();
        write(&dev.path().join("i2c-0"), b"");
        write(&dev.path().join("i2c-2"), b"");

        assert!(I2cDev::open(dev.path().join("i2c-0"), 0).is_err());
        let discovery = I2cDevDiscovery::with_roots(root.path().join("bus"), dev.path());
        assert!(discovery.discover().unwrap().is_empty());
    }
}
