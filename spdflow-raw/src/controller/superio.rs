//! Super-I/O configuration space access constants (Nuvoton)

/// Index port; the data port follows at +1
pub const SIO_PORT: u16 = 0x2E;

/// Written twice to the index port to unlock configuration mode
pub const ENTER_KEY: u8 = 0x87;
pub const EXIT_KEY: u8 = 0xAA;

pub mod reg {
    /// Logical device select
    pub const LOGDEV: u8 = 0x07;
    /// Chip ID, high byte at +0 and low byte at +1
    pub const DEVID: u8 = 0x20;
    /// SMBus base address, high byte at +0 and low byte at +1
    pub const SMBA: u8 = 0x62;
}

pub const LOGDEV_SMBUS: u8 = 0x0B;

/// Chip ID bits that identify the part (the low bits are the revision)
pub const ID_MASK: u16 = 0xFFF8;

/// Chip IDs whose SMBus master speaks the NCT6775 protocol
pub mod chip {
    pub const NCT5577: u16 = 0xC330;
    pub const NCT6102: u16 = 0x1060;
    pub const NCT6793: u16 = 0xD120;
    pub const NCT6796: u16 = 0xD420;
    pub const NCT6798: u16 = 0xD428;
}

/// Marketing name of a supported chip ID (already masked)
pub fn chip_name(id: u16) -> Option<&'static str> {
    match id {
        chip::NCT5577 => Some("NCT5577D"),
        chip::NCT6102 => Some("NCT6102D/NCT6106D"),
        chip::NCT6793 => Some("NCT6793D"),
        chip::NCT6796 => Some("NCT6796D"),
        chip::NCT6798 => Some("NCT6798D"),
        _ => None,
    }
}
