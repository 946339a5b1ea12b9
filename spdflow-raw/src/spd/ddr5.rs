//! DDR5 SPD5118 hub definitions

use crate::register::RegisterLayout;

pub const EEPROM_LENGTH: u16 = 2048;
pub const PAGE_SHIFT: u8 = 7;
pub const PAGE_MASK: u16 = 0x7F;
pub const PAGE_MIN: u8 = 0;
pub const PAGE_MAX: u8 = 7;

/// NVM accesses use the upper half of the hub's command space
pub const NVM_WINDOW: u8 = 0x80;

/// MR0 device type MSB for an SPD5118 hub
pub const DEVICE_TYPE_MAGIC: u8 = 0x51;
/// MR1 device type LSB with the "no temperature sensor" bit masked off
pub const DEVICE_TYPE_LSB: u8 = 0x08;
pub const DEVICE_TYPE_LSB_MASK: u8 = 0xEF;

pub const TEMPERATURE_RESOLUTION: f32 = 0.25;

/// Hub mode registers
pub mod mr {
    pub const DEVICE_TYPE_MSB: u8 = 0x00;
    pub const DEVICE_TYPE_LSB: u8 = 0x01;
    pub const DEVICE_CAPABILITY: u8 = 0x05;
    pub const VIRTUAL_PAGE: u8 = 0x0B;
    pub const THERMAL_SENSOR_CONFIG: u8 = 0x1A;
    pub const HIGH_LIMIT: u8 = 0x1C;
    pub const LOW_LIMIT: u8 = 0x1E;
    pub const CRITICAL_HIGH_LIMIT: u8 = 0x20;
    pub const CRITICAL_LOW_LIMIT: u8 = 0x22;
    pub const TEMPERATURE: u8 = 0x31;
    pub const THERMAL_STATUS: u8 = 0x33;
}

/// Device capability bit: temperature sensor present
pub const CAPABILITY_TS_SUPPORT: u8 = 1;

/// EEPROM byte offsets
pub mod offset {
    pub const MODULE_MANUFACTURER_CONTINUATION_CODE: u16 = 0x200;
    pub const MODULE_MANUFACTURER_ID_CODE: u16 = 0x201;
    pub const MODULE_MANUFACTURING_LOCATION: u16 = 0x202;
    pub const MODULE_MANUFACTURING_DATE_BEGIN: u16 = 0x203;
    pub const MODULE_MANUFACTURING_DATE_END: u16 = 0x204;
    pub const MODULE_SERIAL_NUMBER_BEGIN: u16 = 0x205;
    pub const MODULE_SERIAL_NUMBER_END: u16 = 0x208;
    pub const MODULE_PART_NUMBER_BEGIN: u16 = 0x209;
    pub const MODULE_PART_NUMBER_END: u16 = 0x226;
    pub const MODULE_REVISION_CODE: u16 = 0x227;
    pub const DRAM_MANUFACTURER_CONTINUATION_CODE: u16 = 0x228;
    pub const DRAM_MANUFACTURER_ID_CODE: u16 = 0x229;
    pub const MANUFACTURER_SPECIFIC_DATA_BEGIN: u16 = 0x22B;
    pub const MANUFACTURER_SPECIFIC_DATA_END: u16 = 0x27F;
}

/// Hub command byte for an offset inside the selected page
pub const fn nvm_command(offset: u16) -> u8 {
    (offset & PAGE_MASK) as u8 | NVM_WINDOW
}

/// MR51 Thermal Sensor Status
///
/// ## Register Format
///
/// | Bits | Field              | Description                    |
/// |------|--------------------|--------------------------------|
/// | 0    | above_high         | Above the high limit           |
/// | 1    | below_low          | Below the low limit            |
/// | 2    | above_critical_high| Above the critical high limit  |
/// | 3    | below_critical_low | Below the critical low limit   |
/// | 4-7  | reserved           |                                |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ThermalStatus {
    pub above_high: bool,
    pub below_low: bool,
    pub above_critical_high: bool,
    pub below_critical_low: bool,
}

impl RegisterLayout for ThermalStatus {
    fn to_raw(&self) -> u16 {
        (self.above_high as u16)
            | ((self.below_low as u16) << 1)
            | ((self.above_critical_high as u16) << 2)
            | ((self.below_critical_low as u16) << 3)
    }

    fn from_raw(value: u16) -> Self {
        Self {
            above_high: value & 0x1 != 0,
            below_low: value & 0x2 != 0,
            above_critical_high: value & 0x4 != 0,
            below_critical_low: value & 0x8 != 0,
        }
    }
}
