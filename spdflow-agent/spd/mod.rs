//! Paged SPD EEPROM access for DDR4 and DDR5 modules
//!
//! An accessor owns one module address on one bus. Field getters translate
//! a linear SPD offset into a page switch plus a byte read, and thermal
//! sensor state is refreshed through [`SpdAccessor::update`] and
//! [`SpdAccessor::update_temperature`].

pub mod ddr4;
pub mod ddr5;
pub mod detector;
#[cfg(test)]
pub(crate) mod fake;
pub mod info;
pub mod manufacturer;
pub mod page;
pub mod retry;

use chrono::NaiveDate;
use serde::Serialize;
use spdflow_raw::spd::{self, Generation, MemoryType, CONTINUATION_PARITY_BIT, PART_NUMBER_UNUSED};

use crate::common::{iso_week_to_date, normalize_bcd, unset_bit};

pub use ddr4::Ddr4Accessor;
pub use ddr5::Ddr5Accessor;
pub use detector::SpdDetector;
pub use info::ModuleInfo;
pub use manufacturer::manufacturer_name;
pub use page::PageData;
pub use retry::{retry_transient, SPD_IO_DELAY};

/// Decoded thermal sensor status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum ThermalStatus {
    #[default]
    Good,
    AboveHighLimit,
    BelowLowLimit,
    AboveCriticalHighLimit,
    BelowCriticalLowLimit,
}

impl ThermalStatus {
    /// Numeric code used in exported metrics
    pub fn code(&self) -> u8 {
        match self {
            ThermalStatus::Good => 0,
            ThermalStatus::AboveHighLimit => 1,
            ThermalStatus::BelowLowLimit => 2,
            ThermalStatus::AboveCriticalHighLimit => 3,
            ThermalStatus::BelowCriticalLowLimit => 4,
        }
    }
}

/// Last known state of a module's temperature sensor; unknown values are NaN
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ThermalSensorState {
    pub present: bool,
    pub enabled: bool,
    pub resolution: f32,
    pub low_limit: f32,
    pub high_limit: f32,
    pub critical_high_limit: f32,
    pub critical_low_limit: f32,
    pub temperature: f32,
    pub status: ThermalStatus,
}

impl Default for ThermalSensorState {
    fn default() -> Self {
        Self {
            present: false,
            enabled: false,
            resolution: f32::NAN,
            low_limit: f32::NAN,
            high_limit: f32::NAN,
            critical_high_limit: f32::NAN,
            critical_low_limit: f32::NAN,
            temperature: f32::NAN,
            status: ThermalStatus::Good,
        }
    }
}

/// Linear SPD offsets of the manufacturing fields of one generation.
///
/// Ranges are inclusive.
#[derive(Debug, Clone, Copy)]
pub struct FieldLayout {
    pub module_manufacturer_continuation_code: u16,
    pub module_manufacturer_id_code: u16,
    pub module_manufacturing_location: u16,
    pub module_manufacturing_date: (u16, u16),
    pub module_serial_number: (u16, u16),
    pub module_part_number: (u16, u16),
    pub module_revision_code: u16,
    pub dram_manufacturer_continuation_code: u16,
    pub dram_manufacturer_id_code: u16,
    pub manufacturer_specific_data: (u16, u16),
}

/// Generation-specific paged access plus the shared field decoders
pub trait SpdAccessor: Send {
    fn address(&self) -> u8;

    fn generation(&self) -> Generation;

    fn layout(&self) -> &'static FieldLayout;

    /// Byte at linear SPD `offset`; 0xFF outside the EEPROM
    fn at(&mut self, offset: u16) -> u8;

    /// Switch to the page holding `data` and report whether it is now current
    fn change_page(&mut self, data: PageData) -> bool;

    /// Field groups of the page last switched to
    fn page_data(&self) -> PageData;

    /// Refresh volatile sensor configuration
    fn update(&mut self);

    /// Read the current temperature; `false` when it could not be read
    fn update_temperature(&mut self) -> bool;

    fn thermal_sensor(&self) -> &ThermalSensorState;

    fn spd_revision(&mut self) -> u8 {
        self.at(spd::offset::SPD_REVISION)
    }

    fn memory_type(&mut self) -> MemoryType {
        MemoryType::from_raw(self.at(spd::offset::MEMORY_TYPE)).unwrap_or_default()
    }

    fn module_manufacturer_continuation_code(&mut self) -> u8 {
        let offset = self.layout().module_manufacturer_continuation_code;
        unset_bit(self.at(offset), CONTINUATION_PARITY_BIT)
    }

    fn module_manufacturer_id_code(&mut self) -> u8 {
        let offset = self.layout().module_manufacturer_id_code;
        self.at(offset)
    }

    fn module_manufacturing_location(&mut self) -> u8 {
        let offset = self.layout().module_manufacturing_location;
        self.at(offset)
    }

    /// Monday of the BCD-encoded year/week
    fn module_manufacturing_date(&mut self) -> Option<NaiveDate> {
        let (year_offset, week_offset) = self.layout().module_manufacturing_date;
        let year = self.at(year_offset);
        let week = self.at(week_offset);
        if year == 0 && week == 0 {
            return None;
        }
        iso_week_to_date(normalize_bcd(year) as i32 + 2000, normalize_bcd(week) as u32)
    }

    /// Decimal value of every serial number byte, concatenated
    fn module_serial_number(&mut self) -> String {
        let (begin, end) = self.layout().module_serial_number;
        (begin..=end).map(|offset| self.at(offset).to_string()).collect()
    }

    fn module_part_number(&mut self) -> String {
        let (begin, end) = self.layout().module_part_number;
        let part: String = (begin..=end)
            .map(|offset| self.at(offset))
            .filter(|&c| c != PART_NUMBER_UNUSED)
            .map(char::from)
            .collect();
        part.trim_matches('\0').to_string()
    }

    fn module_revision_code(&mut self) -> u8 {
        let offset = self.layout().module_revision_code;
        self.at(offset)
    }

    fn dram_manufacturer_continuation_code(&mut self) -> u8 {
        let offset = self.layout().dram_manufacturer_continuation_code;
        unset_bit(self.at(offset), CONTINUATION_PARITY_BIT)
    }

    fn dram_manufacturer_id_code(&mut self) -> u8 {
        let offset = self.layout().dram_manufacturer_id_code;
        self.at(offset)
    }

    /// Byte `index` of the manufacturer specific area; 0 beyond it
    fn manufacturer_specific_data(&mut self, index: u16) -> u8 {
        let (begin, end) = self.layout().manufacturer_specific_data;
        if index > end - begin {
            return 0;
        }
        self.at(begin + index)
    }

    fn module_manufacturer(&mut self) -> Option<&'static str> {
        let continuation = self.module_manufacturer_continuation_code();
        let id = self.module_manufacturer_id_code();
        manufacturer_name(continuation, id)
    }

    fn dram_manufacturer(&mut self) -> Option<&'static str> {
        let continuation = self.dram_manufacturer_continuation_code();
        let id = self.dram_manufacturer_id_code();
        manufacturer_name(continuation, id)
    }
}

/// A detected module of either supported generation
pub enum SpdDevice {
    Ddr4(Ddr4Accessor),
    Ddr5(Ddr5Accessor),
}

impl SpdDevice {
    fn inner(&self) -> &dyn SpdAccessor {
        match self {
            SpdDevice::Ddr4(accessor) => accessor,
            SpdDevice::Ddr5(accessor) => accessor,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn SpdAccessor {
        match self {
            SpdDevice::Ddr4(accessor) => accessor,
            SpdDevice::Ddr5(accessor) => accessor,
        }
    }
}

impl SpdAccessor for SpdDevice {
    fn address(&self) -> u8 {
        self.inner().address()
    }

    fn generation(&self) -> Generation {
        self.inner().generation()
    }

    fn layout(&self) -> &'static FieldLayout {
        self.inner().layout()
    }

    fn at(&mut self, offset: u16) -> u8 {
        self.inner_mut().at(offset)
    }

    fn change_page(&mut self, data: PageData) -> bool {
        self.inner_mut().change_page(data)
    }

    fn page_data(&self) -> PageData {
        self.inner().page_data()
    }

    fn update(&mut self) {
        self.inner_mut().update()
    }

    fn update_temperature(&mut self) -> bool {
        self.inner_mut().update_temperature()
    }

    fn thermal_sensor(&self) -> &ThermalSensorState {
        self.inner().thermal_sensor()
    }
}
