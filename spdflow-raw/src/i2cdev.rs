//! Linux i2c-dev character device interface
//!
//! ioctl request numbers, transaction size codes and the adapter
//! functionality mask from `<linux/i2c-dev.h>` and `<linux/i2c.h>`. The
//! payload buffer handed to `I2C_SMBUS` is [`SmbusData`](crate::SmbusData),
//! which already has the layout of `union i2c_smbus_data`.

use bitflags::bitflags;

use crate::smbus::{Direction, Width};

/// Select the target address even when a kernel driver has claimed it
pub const I2C_SLAVE_FORCE: u32 = 0x0706;

/// Read the adapter functionality mask
pub const I2C_FUNCS: u32 = 0x0705;

/// Run one SMBus transaction
pub const I2C_SMBUS: u32 = 0x0720;

/// `size` field of [`SmbusIoctlData`]
pub mod size {
    pub const QUICK: u32 = 0;
    pub const BYTE: u32 = 1;
    pub const BYTE_DATA: u32 = 2;
    pub const WORD_DATA: u32 = 3;
    pub const BLOCK_DATA: u32 = 5;
    pub const I2C_BLOCK_DATA: u32 = 8;
}

/// PCI class string exported in sysfs for SMBus controllers
pub const SYSFS_CLASS_SMBUS: &str = "0x0c05";

/// Argument of the `I2C_SMBUS` ioctl (`struct i2c_smbus_ioctl_data`)
#[repr(C)]
#[derive(Debug)]
pub struct SmbusIoctlData {
    pub read_write: u8,
    pub command: u8,
    pub size: u32,
    pub data: *mut u8,
}

pub const fn transaction_size(width: Width) -> u32 {
    match width {
        Width::Quick => size::QUICK,
        Width::Byte => size::BYTE,
        Width::ByteData => size::BYTE_DATA,
        Width::WordData => size::WORD_DATA,
        Width::BlockData => size::BLOCK_DATA,
        Width::I2cBlockData => size::I2C_BLOCK_DATA,
    }
}

bitflags! {
    /// `I2C_FUNCS` bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Functionality: u32 {
        const I2C = 0x0000_0001;
        const SMBUS_PEC = 0x0000_0008;
        const SMBUS_QUICK = 0x0001_0000;
        const SMBUS_READ_BYTE = 0x0002_0000;
        const SMBUS_WRITE_BYTE = 0x0004_0000;
        const SMBUS_READ_BYTE_DATA = 0x0008_0000;
        const SMBUS_WRITE_BYTE_DATA = 0x0010_0000;
        const SMBUS_READ_WORD_DATA = 0x0020_0000;
        const SMBUS_WRITE_WORD_DATA = 0x0040_0000;
        const SMBUS_READ_BLOCK_DATA = 0x0100_0000;
        const SMBUS_WRITE_BLOCK_DATA = 0x0200_0000;
        const SMBUS_READ_I2C_BLOCK = 0x0400_0000;
        const SMBUS_WRITE_I2C_BLOCK = 0x0800_0000;
    }
}

impl Functionality {
    /// Capability an adapter must report to run this transaction
    pub const fn required(width: Width, direction: Direction) -> Functionality {
        let read = matches!(direction, Direction::Read);
        match width {
            Width::Quick => Self::SMBUS_QUICK,
            Width::Byte if read => Self::SMBUS_READ_BYTE,
            Width::Byte => Self::SMBUS_WRITE_BYTE,
            Width::ByteData if read => Self::SMBUS_READ_BYTE_DATA,
            Width::ByteData => Self::SMBUS_WRITE_BYTE_DATA,
            Width::WordData if read => Self::SMBUS_READ_WORD_DATA,
            Width::WordData => Self::SMBUS_WRITE_WORD_DATA,
            Width::BlockData if read => Self::SMBUS_READ_BLOCK_DATA,
            Width::BlockData => Self::SMBUS_WRITE_BLOCK_DATA,
            Width::I2cBlockData if read => Self::SMBUS_READ_I2C_BLOCK,
            Width::I2cBlockData => Self::SMBUS_WRITE_I2C_BLOCK,
        }
    }

    pub fn supports(self, width: Width, direction: Direction) -> bool {
        self.contains(Self::required(width, direction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_sizes_match_kernel() {
        assert_eq!(transaction_size(Width::Quick), 0);
        assert_eq!(transaction_size(Width::ByteData), 2);
        assert_eq!(transaction_size(Width::BlockData), 5);
        assert_eq!(transaction_size(Width::I2cBlockData), 8);
    }

    #[test]
    fn test_functionality_by_direction() {
        // i2c-i801 without block buffer support
        let funcs = Functionality::SMBUS_QUICK
            | Functionality::SMBUS_READ_BYTE
            | Functionality::SMBUS_WRITE_BYTE
            | Functionality::SMBUS_READ_BYTE_DATA
            | Functionality::SMBUS_WRITE_BYTE_DATA
            | Functionality::SMBUS_READ_WORD_DATA
            | Functionality::SMBUS_READ_I2C_BLOCK;

        assert!(funcs.supports(Width::Quick, Direction::Write));
        assert!(funcs.supports(Width::WordData, Direction::Read));
        assert!(!funcs.supports(Width::WordData, Direction::Write));
        assert!(funcs.supports(Width::I2cBlockData, Direction::Read));
        assert!(!funcs.supports(Width::I2cBlockData, Direction::Write));
        assert!(!funcs.supports(Width::BlockData, Direction::Read));
    }
}
