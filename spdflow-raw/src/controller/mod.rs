//! SMBus host controller register maps
//!
//! Each family exposes its registers as byte-wide I/O ports relative to a
//! base address discovered at runtime (PCI BAR, fixed legacy port, or a
//! Super-I/O configuration register).

pub mod i801;
pub mod nct6775;
pub mod piix4;
pub mod superio;

/// PCI vendor IDs of the supported host controllers
pub mod vendor {
    pub const INTEL: u16 = 0x8086;
    pub const AMD: u16 = 0x1022;
    pub const AMD_ATI: u16 = 0x1002;
}

/// PCI class code (class, subclass) of an SMBus controller
pub const PCI_CLASS_SMBUS: u16 = 0x0C05;

/// Polling interval for transaction completion in microseconds
pub const POLL_INTERVAL_US: u64 = 250;

/// Completion polls before a transaction is declared timed out
pub const MAX_RETRIES: u32 = 450;
