//! AMD FCH SMBus host controller (PIIX4-compatible legacy interface)

use bitflags::bitflags;

/// Register offsets from the SMBus I/O base
pub mod reg {
    pub const HSTSTS: u16 = 0;
    pub const SLVSTS: u16 = 1;
    pub const HSTCNT: u16 = 2;
    pub const HSTCMD: u16 = 3;
    pub const HSTADD: u16 = 4;
    pub const HSTDAT0: u16 = 5;
    pub const HSTDAT1: u16 = 6;
    pub const BLKDAT: u16 = 7;

    /// Number of I/O ports decoded from the base address
    pub const SPAN: u16 = BLKDAT + 1;
}

/// Legacy port bases of the two FCH SMBus ports
pub const PRIMARY_BASE: u16 = 0x0B00;
pub const AUX_BASE: u16 = 0x0B20;

/// Transaction opcodes written to HSTCNT
pub mod cmd {
    pub const QUICK: u8 = 0x00;
    pub const BYTE: u8 = 0x04;
    pub const BYTE_DATA: u8 = 0x08;
    pub const WORD_DATA: u8 = 0x0C;
    pub const BLOCK_DATA: u8 = 0x14;
}

/// Opcode field of HSTCNT
pub const HSTCNT_SIZE_MASK: u8 = 0x1C;
pub const HSTCNT_START: u8 = 0x40;

bitflags! {
    /// HSTSTS bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HostStatus: u8 {
        const HOST_BUSY = 1 << 0;
        const INTR = 1 << 1;
        const DEV_ERR = 1 << 2;
        const BUS_COLLISION = 1 << 3;
        const FAILED = 1 << 4;
    }
}

impl HostStatus {
    /// Transaction finished: interrupt raised and host no longer busy
    pub fn is_done(self) -> bool {
        (self & (HostStatus::HOST_BUSY | HostStatus::INTR)) == HostStatus::INTR
    }
}
