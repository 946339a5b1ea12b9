//! Intel ICH/PCH SMBus host controller (i801 family)
//!
//! ## References
//!
//! - Intel 300/400/500/600 Series PCH Datasheet, Volume 2, SMBus Interface
//! - Linux `drivers/i2c/busses/i2c-i801.c`

use bitflags::bitflags;

use crate::register::RegisterLayout;

/// Register offsets from the SMBus I/O base
pub mod reg {
    pub const HSTSTS: u16 = 0;
    pub const HSTCNT: u16 = 2;
    pub const HSTCMD: u16 = 3;
    pub const HSTADD: u16 = 4;
    pub const HSTDAT0: u16 = 5;
    pub const HSTDAT1: u16 = 6;
    pub const BLKDAT: u16 = 7;
    pub const PEC: u16 = 8;
    pub const AUXSTS: u16 = 12;
    pub const AUXCTL: u16 = 13;

    /// Number of I/O ports decoded from the base address
    pub const SPAN: u16 = AUXCTL + 1;
}

/// PCI configuration space of the SMBus function
pub mod pci {
    /// Base Address Register holding the I/O base (BAR4)
    pub const SMBBAR: u32 = 0x20;
    /// I/O space indicator of [`SMBBAR`]
    pub const SMBBAR_IO_SPACE: u32 = 1;
    /// Address bits of [`SMBBAR`]
    pub const SMBBAR_MASK: u32 = 0xFFE0;
    /// Host configuration register
    pub const SMBHSTCFG: u32 = 0x40;
}

/// I/O base used when the BAR cannot be read
pub const SMBUS_FIXED_ADDRESS: u16 = 0xEFA0;

/// Transaction opcodes written to HSTCNT
pub mod cmd {
    pub const QUICK: u8 = 0x00;
    pub const BYTE: u8 = 0x04;
    pub const BYTE_DATA: u8 = 0x08;
    pub const WORD_DATA: u8 = 0x0C;
    pub const PROC_CALL: u8 = 0x10;
    pub const BLOCK_DATA: u8 = 0x14;
    pub const I2C_BLOCK_DATA: u8 = 0x18;
    pub const BLOCK_PROC_CALL: u8 = 0x1C;
}

bitflags! {
    /// HSTSTS bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HostStatus: u8 {
        const HOST_BUSY = 1 << 0;
        const INTR = 1 << 1;
        const DEV_ERR = 1 << 2;
        const BUS_ERR = 1 << 3;
        const FAILED = 1 << 4;
        const SMBALERT = 1 << 5;
        const INUSE = 1 << 6;
        const BYTE_DONE = 1 << 7;

        const ERROR_FLAGS = Self::FAILED.bits() | Self::BUS_ERR.bits() | Self::DEV_ERR.bits();
        const STATUS_FLAGS = Self::BYTE_DONE.bits() | Self::INTR.bits() | Self::ERROR_FLAGS.bits();
    }
}

bitflags! {
    /// HSTCNT bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HostControl: u8 {
        const INTREN = 1 << 0;
        const KILL = 1 << 1;
        const LAST_BYTE = 1 << 5;
        const START = 1 << 6;
        const PEC_EN = 1 << 7;
    }
}

bitflags! {
    /// AUXCTL bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AuxControl: u8 {
        /// Hardware PEC
        const CRC = 1 << 0;
        /// 32-byte block buffer
        const E32B = 1 << 1;
    }
}

/// Host Configuration register (PCI offset 0x40)
///
/// ## Register Format
///
/// | Bits | Field        | Description                             |
/// |------|--------------|-----------------------------------------|
/// | 0    | host_enable  | SMBus host interface enabled            |
/// | 1    | smi_enable   | Route SMBus interrupts to SMI           |
/// | 2    | i2c_enable   | I2C mode instead of SMBus               |
/// | 3    | soft_reset   | SMBus soft reset                        |
/// | 4    | spd_write_disable | Writes to 0x50-0x57 are blocked    |
/// | 5-7  | reserved     |                                         |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HostConfig {
    pub host_enable: bool,
    pub smi_enable: bool,
    pub i2c_enable: bool,
    pub soft_reset: bool,
    pub spd_write_disable: bool,
}

impl RegisterLayout for HostConfig {
    fn to_raw(&self) -> u16 {
        (self.host_enable as u16)
            | ((self.smi_enable as u16) << 1)
            | ((self.i2c_enable as u16) << 2)
            | ((self.soft_reset as u16) << 3)
            | ((self.spd_write_disable as u16) << 4)
    }

    fn from_raw(value: u16) -> Self {
        Self {
            host_enable: value & 0x01 != 0,
            smi_enable: value & 0x02 != 0,
            i2c_enable: value & 0x04 != 0,
            soft_reset: value & 0x08 != 0,
            spd_write_disable: value & 0x10 != 0,
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if !self.host_enable {
            return Err("SMBus host interface is disabled");
        }
        Ok(())
    }
}
