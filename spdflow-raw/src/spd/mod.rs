//! SPD EEPROM and thermal sensor register maps
//!
//! DDR4 modules carry an EE1004 EEPROM (two 256-byte pages selected through
//! dedicated bus addresses) and optionally a TSE2004 temperature sensor.
//! DDR5 modules carry an SPD5118 hub with a 2048-byte NVM address space
//! (`ddr5::EEPROM_LENGTH`), read through a 128-byte window whose page is
//! selected by the hub's MR11 register.

pub mod ddr4;
pub mod ddr5;

/// Pause between consecutive SPD accesses in milliseconds
pub const SPD_IO_DELAY_MS: u64 = 1;

/// Retry bounds for transient bus errors
pub const SPD_TS_RETRIES: u32 = 5;
pub const SPD_DATA_RETRIES: u32 = 5;
pub const SPD_CFG_RETRIES: u32 = 50;

/// Byte offsets shared by every SPD generation
pub mod offset {
    pub const SPD_REVISION: u16 = 0x01;
    pub const MEMORY_TYPE: u16 = 0x02;
}

/// Odd parity bit carried by JEP106 continuation codes
pub const CONTINUATION_PARITY_BIT: u8 = 7;

/// Padding byte in module part numbers
pub const PART_NUMBER_UNUSED: u8 = 0x20;

/// Memory generations this toolkit can decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Generation {
    Ddr4,
    Ddr5,
}

impl Generation {
    pub fn name(&self) -> &'static str {
        match self {
            Generation::Ddr4 => "DDR4",
            Generation::Ddr5 => "DDR5",
        }
    }
}

/// JEDEC key byte (SPD byte 2): DRAM device type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum MemoryType {
    #[default]
    Reserved = 0,
    FpmDram = 1,
    Edo = 2,
    Nibble = 3,
    SdrSdram = 4,
    MuxRom = 5,
    DdrSgram = 6,
    DdrSdram = 7,
    Ddr2Sdram = 8,
    FbDimm = 9,
    FbProbe = 10,
    Ddr3Sdram = 11,
    Ddr4Sdram = 12,
    Reserved2 = 13,
    Ddr4eSdram = 14,
    Lpddr3Sdram = 15,
    Lpddr4Sdram = 16,
    Lpddr4xSdram = 17,
    Ddr5Sdram = 18,
    Lpddr5Sdram = 19,
}

impl MemoryType {
    pub fn from_raw(value: u8) -> Option<Self> {
        use MemoryType::*;
        let ty = match value {
            0 => Reserved,
            1 => FpmDram,
            2 => Edo,
            3 => Nibble,
            4 => SdrSdram,
            5 => MuxRom,
            6 => DdrSgram,
            7 => DdrSdram,
            8 => Ddr2Sdram,
            9 => FbDimm,
            10 => FbProbe,
            11 => Ddr3Sdram,
            12 => Ddr4Sdram,
            13 => Reserved2,
            14 => Ddr4eSdram,
            15 => Lpddr3Sdram,
            16 => Lpddr4Sdram,
            17 => Lpddr4xSdram,
            18 => Ddr5Sdram,
            19 => Lpddr5Sdram,
            _ => return None,
        };
        Some(ty)
    }

    /// Supported generation this device type belongs to
    pub fn generation(&self) -> Option<Generation> {
        match self {
            MemoryType::Ddr4Sdram
            | MemoryType::Ddr4eSdram
            | MemoryType::Lpddr4Sdram
            | MemoryType::Lpddr4xSdram => Some(Generation::Ddr4),
            MemoryType::Ddr5Sdram | MemoryType::Lpddr5Sdram => Some(Generation::Ddr5),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            MemoryType::Reserved | MemoryType::Reserved2 => "Reserved",
            MemoryType::FpmDram => "FPM DRAM",
            MemoryType::Edo => "EDO",
            MemoryType::Nibble => "Nibble",
            MemoryType::SdrSdram => "SDR SDRAM",
            MemoryType::MuxRom => "Multiplexed ROM",
            MemoryType::DdrSgram => "DDR SGRAM",
            MemoryType::DdrSdram => "DDR SDRAM",
            MemoryType::Ddr2Sdram => "DDR2 SDRAM",
            MemoryType::FbDimm => "FB-DIMM",
            MemoryType::FbProbe => "FB-DIMM Probe",
            MemoryType::Ddr3Sdram => "DDR3 SDRAM",
            MemoryType::Ddr4Sdram => "DDR4 SDRAM",
            MemoryType::Ddr4eSdram => "DDR4E SDRAM",
            MemoryType::Lpddr3Sdram => "LPDDR3 SDRAM",
            MemoryType::Lpddr4Sdram => "LPDDR4 SDRAM",
            MemoryType::Lpddr4xSdram => "LPDDR4X SDRAM",
            MemoryType::Ddr5Sdram => "DDR5 SDRAM",
            MemoryType::Lpddr5Sdram => "LPDDR5 SDRAM",
        }
    }
}

/// Temperature register decoding shared by TSE2004 and SPD5118 sensors.
///
/// Bits 0-11 carry the magnitude in 1/16 °C steps and bit 12 is the sign.
/// Bits above 12 are flags (DDR4) or sign extension (DDR5) and are ignored.
pub const TEMPERATURE_MASK: u16 = 0x1FFF;
pub const TEMPERATURE_SIGN: u16 = 0x1000;
pub const TEMPERATURE_LSB: f32 = 0.0625;
