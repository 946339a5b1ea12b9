//! Nuvoton NCT677x/NCT5577 Super-I/O SMBus master (manual mode)

use bitflags::bitflags;

/// Register offsets from the SMBus I/O base
pub mod reg {
    pub const HSTDAT: u16 = 0x0;
    pub const BLKSZ: u16 = 0x1;
    pub const HSTCMD: u16 = 0x2;
    pub const HSTIDX: u16 = 0x3;
    pub const HSTCTL: u16 = 0x4;
    pub const HSTADD: u16 = 0x5;
    pub const HSTERR: u16 = 0x9;
    pub const HSTSTS: u16 = 0xE;

    /// Number of I/O ports decoded from the base address
    pub const SPAN: u16 = HSTSTS + 1;
}

/// Base address used when the Super-I/O does not report one
pub const DEFAULT_BASE: u16 = 0x0290;

/// Written to HSTADD before every transaction
pub const SOFT_RESET: u8 = 64;
/// Written to HSTCTL to launch a transaction
pub const MANUAL_START: u8 = 128;

/// FIFO depth of the data register
pub const FIFO_CHUNK: usize = 4;

/// Manual mode commands written to HSTCMD
pub mod cmd {
    pub const READ_BYTE: u8 = 0;
    pub const READ_WORD: u8 = 1;
    pub const READ_BLOCK: u8 = 2;
    pub const BLOCK_WRITE_READ_PROC_CALL: u8 = 3;
    pub const PROC_CALL: u8 = 4;
    pub const WRITE_BYTE: u8 = 8;
    pub const WRITE_WORD: u8 = 9;
    pub const WRITE_BLOCK: u8 = 10;
}

bitflags! {
    /// HSTSTS bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HostStatus: u8 {
        const FIFO_EMPTY = 1 << 0;
        const FIFO_FULL = 1 << 1;
        const MANUAL_ACTIVE = 1 << 2;
    }
}

bitflags! {
    /// HSTERR bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct HostError: u8 {
        const NO_ACK = 1 << 5;
    }
}
