//! SMBus host controllers and the shared transfer contract
//!
//! Each controller family implements [`SmbusEngine`], the raw register-level
//! state machine. [`SmbusController`] wraps one engine with the in-process
//! and cross-process locks and exposes the [`SmbusBus`] helpers the SPD layer
//! builds on.

pub mod discovery;
pub mod i2cdev;
pub mod i801;
pub mod manager;
pub mod nct6775;
pub mod piix4;
pub mod poll;
#[cfg(test)]
pub(crate) mod sim;
pub mod tools;

use parking_lot::Mutex;
use serde::Serialize;
use spdflow_raw::{Direction, SmbusData, SmbusError, SmbusResult, Width, I2C_SMBUS_BLOCK_MAX};

use crate::common::GlobalBusLock;

pub use discovery::{BusDiscovery, ConfiguredDiscovery, LinuxDiscovery};
pub use i2cdev::{I2cDev, I2cDevDiscovery};
pub use i801::I801;
pub use manager::SmbusManager;
pub use nct6775::Nct6775;
pub use piix4::Piix4;
pub use poll::{poll_status, PollPolicy, Polled};

/// Register-level transaction state machine of one controller family
pub trait SmbusEngine: Send + Sync {
    fn family(&self) -> &'static str;

    fn base(&self) -> u16;

    /// Run one SMBus transaction. Non-block read results are written back
    /// into `data`.
    fn access(
        &self,
        address: u8,
        direction: Direction,
        command: u8,
        width: Width,
        data: &mut SmbusData,
    ) -> SmbusResult<()>;
}

/// Identity of one physical bus
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BusInfo {
    pub name: String,
    /// Position in the registry, assigned when the bus is added
    pub port_id: usize,
    pub pci_vendor: u16,
    pub pci_device: u16,
    pub pci_subsystem_vendor: u16,
    pub pci_subsystem_device: u16,
    /// Writes to the SPD address range are blocked by the host
    pub write_protected: bool,
}

/// Serialized access to one bus plus the SMBus protocol helpers
pub trait SmbusBus: Send + Sync {
    fn info(&self) -> &BusInfo;

    fn transfer(
        &self,
        address: u8,
        direction: Direction,
        command: u8,
        width: Width,
        data: &mut SmbusData,
    ) -> SmbusResult<()>;

    fn has_write_protection(&self) -> bool {
        self.info().write_protected
    }

    fn write_quick(&self, address: u8, direction: Direction) -> SmbusResult<()> {
        let mut data = SmbusData::new();
        self.transfer(address, direction, 0, Width::Quick, &mut data)
    }

    fn read_byte(&self, address: u8) -> SmbusResult<u8> {
        let mut data = SmbusData::new();
        self.transfer(address, Direction::Read, 0, Width::Byte, &mut data)?;
        Ok(data.byte())
    }

    fn write_byte(&self, address: u8, value: u8) -> SmbusResult<()> {
        let mut data = SmbusData::new();
        self.transfer(address, Direction::Write, value, Width::Byte, &mut data)
    }

    fn read_byte_data(&self, address: u8, command: u8) -> SmbusResult<u8> {
        let mut data = SmbusData::new();
        self.transfer(address, Direction::Read, command, Width::ByteData, &mut data)?;
        Ok(data.byte())
    }

    fn write_byte_data(&self, address: u8, command: u8, value: u8) -> SmbusResult<()> {
        let mut data = SmbusData::from_byte(value);
        self.transfer(address, Direction::Write, command, Width::ByteData, &mut data)
    }

    fn read_word_data(&self, address: u8, command: u8) -> SmbusResult<u16> {
        let mut data = SmbusData::new();
        self.transfer(address, Direction::Read, command, Width::WordData, &mut data)?;
        Ok(data.word())
    }

    /// Word read for devices that send the most significant byte first
    fn read_word_data_swapped(&self, address: u8, command: u8) -> SmbusResult<u16> {
        self.read_word_data(address, command).map(u16::swap_bytes)
    }

    fn write_word_data(&self, address: u8, command: u8, value: u16) -> SmbusResult<()> {
        let mut data = SmbusData::from_word(value);
        self.transfer(address, Direction::Write, command, Width::WordData, &mut data)
    }

    fn read_block_data(&self, address: u8, command: u8) -> SmbusResult<Vec<u8>> {
        let mut data = SmbusData::new();
        self.transfer(address, Direction::Read, command, Width::BlockData, &mut data)?;
        Ok(data.block().to_vec())
    }

    fn write_block_data(&self, address: u8, command: u8, values: &[u8]) -> SmbusResult<()> {
        let len = values.len().min(I2C_SMBUS_BLOCK_MAX);
        let mut data = SmbusData::from_block(&values[..len]);
        self.transfer(address, Direction::Write, command, Width::BlockData, &mut data)
    }

    fn read_i2c_block_data(&self, address: u8, command: u8, len: usize) -> SmbusResult<Vec<u8>> {
        let mut data = SmbusData::new();
        data.set_len_byte(len.min(I2C_SMBUS_BLOCK_MAX) as u8);
        self.transfer(address, Direction::Read, command, Width::I2cBlockData, &mut data)?;
        Ok(data.block().to_vec())
    }

    fn write_i2c_block_data(&self, address: u8, command: u8, values: &[u8]) -> SmbusResult<()> {
        let len = values.len().min(I2C_SMBUS_BLOCK_MAX);
        let mut data = SmbusData::from_block(&values[..len]);
        self.transfer(address, Direction::Write, command, Width::I2cBlockData, &mut data)
    }
}

/// Supported host controller families
pub enum ControllerKind {
    Intel(I801),
    Amd(Piix4),
    Nuvoton(Nct6775),
    /// Controller owned by a kernel driver, reached through i2c-dev
    Kernel(I2cDev),
}

impl ControllerKind {
    pub fn engine(&self) -> &dyn SmbusEngine {
        match self {
            ControllerKind::Intel(engine) => engine,
            ControllerKind::Amd(engine) => engine,
            ControllerKind::Nuvoton(engine) => engine,
            ControllerKind::Kernel(engine) => engine,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ControllerKind::Intel(_) => "intel",
            ControllerKind::Amd(_) => "amd",
            ControllerKind::Nuvoton(_) => "nuvoton",
            ControllerKind::Kernel(_) => "i2c-dev",
        }
    }
}

/// One physical bus: an engine behind the bus locks
pub struct SmbusController {
    kind: ControllerKind,
    info: BusInfo,
    bus_lock: Mutex<()>,
    global_lock: Option<GlobalBusLock>,
}

impl SmbusController {
    pub fn new(kind: ControllerKind, info: BusInfo) -> Self {
        Self {
            kind,
            info,
            bus_lock: Mutex::new(()),
            global_lock: None,
        }
    }

    /// Also hold `lock` for the duration of every transaction
    pub fn with_global_lock(mut self, lock: GlobalBusLock) -> Self {
        self.global_lock = Some(lock);
        self
    }

    pub fn kind(&self) -> &ControllerKind {
        &self.kind
    }

    pub(crate) fn set_port_id(&mut self, port_id: usize) {
        self.info.port_id = port_id;
    }
}

impl SmbusBus for SmbusController {
    fn info(&self) -> &BusInfo {
        &self.info
    }

    fn transfer(
        &self,
        address: u8,
        direction: Direction,
        command: u8,
        width: Width,
        data: &mut SmbusData,
    ) -> SmbusResult<()> {
        let _local = self.bus_lock.lock();
        let _global = match &self.global_lock {
            Some(lock) => match lock.acquire() {
                Ok(guard) => Some(guard),
                Err(e) => {
                    tracing::warn!("{}: {}", self.info.name, e);
                    return Err(SmbusError::Busy);
                }
            },
            None => None,
        };

        let result = self
            .kind
            .engine()
            .access(address, direction, command, width, data);

        if let Err(e) = &result {
            tracing::debug!(
                "{} 0x{:04x}: {:?} {:?} addr=0x{:02x} cmd=0x{:02x} failed: {}",
                self.kind.engine().family(),
                self.kind.engine().base(),
                direction,
                width,
                address,
                command,
                e
            );
        }

        result
    }
}
