//! DDR4 SPD (EE1004) and thermal sensor (TSE2004av) definitions

use crate::register::RegisterLayout;

/// Page-select bus address; page `n` is selected by writing to `PAGE_ADDRESS + n`
pub const PAGE_ADDRESS: u8 = 0x36;

/// Thermal sensor bus address base; the low three bits follow the SPD address
pub const TS_ADDRESS_BASE: u8 = 0x18;

pub const EEPROM_LENGTH: u16 = 512;
pub const PAGE_SHIFT: u8 = 8;
pub const PAGE_MASK: u16 = 0xFF;
pub const PAGE_MIN: u8 = 0;
pub const PAGE_MAX: u8 = 1;

/// Byte 0 of a DDR4 SPD: 384 bytes used, 512 total
pub const SPD_BYTES_MAGIC: u8 = 0x23;

/// SPD byte whose bit 7 advertises an on-module thermal sensor
pub const THERMAL_SENSOR_BYTE: u16 = 0x0E;
pub const THERMAL_SENSOR_BIT: u8 = 7;

/// Sensor bus address of the module at SPD address `spd_address`
pub const fn ts_address(spd_address: u8) -> u8 {
    TS_ADDRESS_BASE | (spd_address & 0x07)
}

/// EEPROM byte offsets
pub mod offset {
    pub const MODULE_MANUFACTURER_CONTINUATION_CODE: u16 = 0x140;
    pub const MODULE_MANUFACTURER_ID_CODE: u16 = 0x141;
    pub const MODULE_MANUFACTURING_LOCATION: u16 = 0x142;
    pub const MODULE_MANUFACTURING_DATE_BEGIN: u16 = 0x143;
    pub const MODULE_MANUFACTURING_DATE_END: u16 = 0x144;
    pub const MODULE_SERIAL_NUMBER_BEGIN: u16 = 0x145;
    pub const MODULE_SERIAL_NUMBER_END: u16 = 0x148;
    pub const MODULE_PART_NUMBER_BEGIN: u16 = 0x149;
    pub const MODULE_PART_NUMBER_END: u16 = 0x15C;
    pub const MODULE_REVISION_CODE: u16 = 0x15D;
    pub const DRAM_MANUFACTURER_CONTINUATION_CODE: u16 = 0x15E;
    pub const DRAM_MANUFACTURER_ID_CODE: u16 = 0x15F;
    pub const MANUFACTURER_SPECIFIC_DATA_BEGIN: u16 = 0x161;
    pub const MANUFACTURER_SPECIFIC_DATA_END: u16 = 0x17D;
}

/// Thermal sensor registers (16-bit, transmitted MSB first)
pub mod ts {
    pub const CAPABILITIES: u8 = 0x00;
    pub const CONFIGURATION: u8 = 0x01;
    pub const HIGH_LIMIT: u8 = 0x02;
    pub const LOW_LIMIT: u8 = 0x03;
    pub const CRITICAL_LIMIT: u8 = 0x04;
    pub const TEMPERATURE: u8 = 0x05;
    pub const MANUFACTURER: u8 = 0x06;
    pub const DEVICE_ID: u8 = 0x07;
}

/// Thermal sensor Capabilities register
///
/// ## Register Format
///
/// | Bits  | Field        | Description                              |
/// |-------|--------------|------------------------------------------|
/// | 0     | event        | EVENT# output supported                  |
/// | 1     | range        | Wider temperature range supported        |
/// | 2     | accuracy     | High accuracy in the active range        |
/// | 3-4   | resolution   | 0 = 0.5, 1 = 0.25, 2 = 0.125, 3 = 0.0625 |
/// | 5     | vhv          | High voltage on A0 supported             |
/// | 6     | timeout      | Bus timeout supported                    |
/// | 7     | evsd         | EVENT# disabled in shutdown              |
/// | 8-15  | reserved     |                                          |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TsCapabilities {
    pub event: bool,
    pub range: bool,
    pub accuracy: bool,
    pub resolution: u8,
    pub vhv: bool,
    pub timeout: bool,
    pub evsd: bool,
}

impl RegisterLayout for TsCapabilities {
    fn to_raw(&self) -> u16 {
        (self.event as u16)
            | ((self.range as u16) << 1)
            | ((self.accuracy as u16) << 2)
            | ((self.resolution as u16 & 0x3) << 3)
            | ((self.vhv as u16) << 5)
            | ((self.timeout as u16) << 6)
            | ((self.evsd as u16) << 7)
    }

    fn from_raw(value: u16) -> Self {
        Self {
            event: value & 0x01 != 0,
            range: value & 0x02 != 0,
            accuracy: value & 0x04 != 0,
            resolution: ((value & 0x18) >> 3) as u8,
            vhv: value & 0x20 != 0,
            timeout: value & 0x40 != 0,
            evsd: value & 0x80 != 0,
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.resolution > 3 {
            return Err("Resolution must be <= 3 (2 bits)");
        }
        Ok(())
    }
}

impl TsCapabilities {
    /// Temperature step in °C
    pub fn resolution_celsius(&self) -> f32 {
        0.5 / (1u32 << self.resolution) as f32
    }
}

/// Thermal sensor Configuration register
///
/// ## Register Format
///
/// | Bits  | Field          | Description                        |
/// |-------|----------------|------------------------------------|
/// | 0     | event_mode     | Interrupt instead of comparator    |
/// | 1     | event_polarity | EVENT# active high                 |
/// | 2     | critical_only  | EVENT# only on critical            |
/// | 3     | event_enable   | EVENT# output enabled              |
/// | 4     | event_status   | EVENT# currently asserted          |
/// | 5     | clear_event    | Clear interrupt event              |
/// | 6     | alarm_lock     | High/low window locked             |
/// | 7     | critical_lock  | Critical limit locked              |
/// | 8     | shutdown       | Sensor in shutdown mode            |
/// | 9-10  | hysteresis     | Limit hysteresis                   |
/// | 11-15 | reserved       |                                    |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TsConfiguration {
    pub event_mode: bool,
    pub event_polarity: bool,
    pub critical_only: bool,
    pub event_enable: bool,
    pub event_status: bool,
    pub clear_event: bool,
    pub alarm_lock: bool,
    pub critical_lock: bool,
    pub shutdown: bool,
    pub hysteresis: u8,
}

impl RegisterLayout for TsConfiguration {
    fn to_raw(&self) -> u16 {
        (self.event_mode as u16)
            | ((self.event_polarity as u16) << 1)
            | ((self.critical_only as u16) << 2)
            | ((self.event_enable as u16) << 3)
            | ((self.event_status as u16) << 4)
            | ((self.clear_event as u16) << 5)
            | ((self.alarm_lock as u16) << 6)
            | ((self.critical_lock as u16) << 7)
            | ((self.shutdown as u16) << 8)
            | ((self.hysteresis as u16 & 0x3) << 9)
    }

    fn from_raw(value: u16) -> Self {
        Self {
            event_mode: value & 0x001 != 0,
            event_polarity: value & 0x002 != 0,
            critical_only: value & 0x004 != 0,
            event_enable: value & 0x008 != 0,
            event_status: value & 0x010 != 0,
            clear_event: value & 0x020 != 0,
            alarm_lock: value & 0x040 != 0,
            critical_lock: value & 0x080 != 0,
            shutdown: value & 0x100 != 0,
            hysteresis: ((value >> 9) & 0x3) as u8,
        }
    }

    fn validate(&self) -> Result<(), &'static str> {
        if self.hysteresis > 3 {
            return Err("Hysteresis must be <= 3 (2 bits)");
        }
        Ok(())
    }
}

/// Ambient temperature register flag bits
///
/// | Bits  | Field    | Description                           |
/// |-------|----------|---------------------------------------|
/// | 0-12  | value    | Signed temperature, 1/16 °C per LSB   |
/// | 13    | low      | Below the low limit                   |
/// | 14    | high     | Above the high limit                  |
/// | 15    | critical | At or above the critical limit        |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TsTemperature {
    pub value: u16,
    pub below_low: bool,
    pub above_high: bool,
    pub above_critical: bool,
}

impl RegisterLayout for TsTemperature {
    fn to_raw(&self) -> u16 {
        (self.value & super::TEMPERATURE_MASK)
            | ((self.below_low as u16) << 13)
            | ((self.above_high as u16) << 14)
            | ((self.above_critical as u16) << 15)
    }

    fn from_raw(value: u16) -> Self {
        Self {
            value: value & super::TEMPERATURE_MASK,
            below_low: value & 0x2000 != 0,
            above_high: value & 0x4000 != 0,
            above_critical: value & 0x8000 != 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ts_address() {
        assert_eq!(ts_address(0x50), 0x18);
        assert_eq!(ts_address(0x53), 0x1B);
        assert_eq!(ts_address(0x57), 0x1F);
    }

    #[test]
    fn test_capability_resolution() {
        assert_eq!(TsCapabilities::from_raw(0x0000).resolution_celsius(), 0.5);
        assert_eq!(TsCapabilities::from_raw(0x0008).resolution_celsius(), 0.25);
        assert_eq!(TsCapabilities::from_raw(0x0018).resolution_celsius(), 0.0625);
    }

    #[test]
    fn test_configuration_shutdown() {
        let cfg = TsConfiguration::from_raw(0x0100);
        assert!(cfg.shutdown);
        assert_eq!(cfg.to_raw(), 0x0100);
        assert!(!TsConfiguration::from_raw(0x0008).shutdown);
    }

    #[test]
    fn test_temperature_flags() {
        let t = TsTemperature::from_raw(0xC1C8);
        assert!(t.above_critical);
        assert!(t.above_high);
        assert!(!t.below_low);
        assert_eq!(t.value, 0x01C8);
    }
}
