//! DDR5 modules: SPD5118 hub with paged NVM and integrated sensor

use std::sync::Arc;
use std::thread::sleep;

use spdflow_raw::spd::ddr5::{
    self, mr, nvm_command, CAPABILITY_TS_SUPPORT, DEVICE_TYPE_LSB, DEVICE_TYPE_LSB_MASK,
    DEVICE_TYPE_MAGIC, EEPROM_LENGTH, PAGE_MAX, PAGE_SHIFT, TEMPERATURE_RESOLUTION,
};
use spdflow_raw::spd::{Generation, SPD_CFG_RETRIES, SPD_DATA_RETRIES, SPD_TS_RETRIES};
use spdflow_raw::{RegisterLayout, SmbusResult};

use super::page::{self, PageData};
use super::retry::{retry_transient, SPD_IO_DELAY};
use super::{FieldLayout, SpdAccessor, ThermalSensorState, ThermalStatus};
use crate::common::{convert_raw_temperature, is_bit_set};
use crate::smbus::SmbusBus;

static LAYOUT: FieldLayout = FieldLayout {
    module_manufacturer_continuation_code: ddr5::offset::MODULE_MANUFACTURER_CONTINUATION_CODE,
    module_manufacturer_id_code: ddr5::offset::MODULE_MANUFACTURER_ID_CODE,
    module_manufacturing_location: ddr5::offset::MODULE_MANUFACTURING_LOCATION,
    module_manufacturing_date: (
        ddr5::offset::MODULE_MANUFACTURING_DATE_BEGIN,
        ddr5::offset::MODULE_MANUFACTURING_DATE_END,
    ),
    module_serial_number: (
        ddr5::offset::MODULE_SERIAL_NUMBER_BEGIN,
        ddr5::offset::MODULE_SERIAL_NUMBER_END,
    ),
    module_part_number: (
        ddr5::offset::MODULE_PART_NUMBER_BEGIN,
        ddr5::offset::MODULE_PART_NUMBER_END,
    ),
    module_revision_code: ddr5::offset::MODULE_REVISION_CODE,
    dram_manufacturer_continuation_code: ddr5::offset::DRAM_MANUFACTURER_CONTINUATION_CODE,
    dram_manufacturer_id_code: ddr5::offset::DRAM_MANUFACTURER_ID_CODE,
    manufacturer_specific_data: (
        ddr5::offset::MANUFACTURER_SPECIFIC_DATA_BEGIN,
        ddr5::offset::MANUFACTURER_SPECIFIC_DATA_END,
    ),
};

/// Number of NVM pages behind MR11
const PAGE_COUNT: u16 = EEPROM_LENGTH >> PAGE_SHIFT;

pub struct Ddr5Accessor {
    bus: Arc<dyn SmbusBus>,
    address: u8,
    page_data: PageData,
    sensor: ThermalSensorState,
}

impl Ddr5Accessor {
    /// Probe for an SPD5118 hub at `address`.
    ///
    /// A hub left on a non-zero page by other software is moved back to page
    /// 0 once, unless the host blocks SPD writes.
    pub fn is_available(bus: &dyn SmbusBus, address: u8) -> bool {
        let mut retry = true;

        loop {
            sleep(SPD_IO_DELAY);
            let magic = bus.read_byte_data(address, mr::DEVICE_TYPE_MSB);
            sleep(SPD_IO_DELAY);
            let device_type = bus.read_byte_data(address, mr::DEVICE_TYPE_LSB);
            sleep(SPD_IO_DELAY);

            let (Ok(magic), Ok(device_type)) = (magic, device_type) else {
                return false;
            };
            if magic == DEVICE_TYPE_MAGIC && device_type & DEVICE_TYPE_LSB_MASK == DEVICE_TYPE_LSB {
                return true;
            }

            let page = bus.read_byte_data(address, mr::VIRTUAL_PAGE);
            sleep(SPD_IO_DELAY);
            let Ok(page) = page else {
                return false;
            };

            if !retry || page == 0 || page as u16 >= PAGE_COUNT || bus.has_write_protection() {
                return false;
            }

            tracing::debug!("DDR5 0x{address:02x}: hub left on page {page}, resetting");
            let _ = bus.write_byte_data(address, mr::VIRTUAL_PAGE, 0);
            sleep(SPD_IO_DELAY);
            retry = false;
        }
    }

    pub fn new(bus: Arc<dyn SmbusBus>, address: u8) -> Self {
        let mut accessor = Self {
            bus,
            address,
            page_data: PageData::empty(),
            sensor: ThermalSensorState::default(),
        };

        if let Some(data) = page::data_of_page(Generation::Ddr5, accessor.get_page()) {
            accessor.page_data = data;
        }

        accessor.read_thermal_sensor_configuration(SPD_CFG_RETRIES);
        if accessor.sensor.present {
            accessor.refresh(SPD_DATA_RETRIES);
            accessor.sensor.resolution = TEMPERATURE_RESOLUTION;
        }

        accessor
    }

    /// Page reported by MR11, or 255 when unreadable
    pub fn get_page(&self) -> u8 {
        match self.bus.read_byte_data(self.address, mr::VIRTUAL_PAGE) {
            Ok(value) => value & PAGE_MAX,
            Err(_) => u8::MAX,
        }
    }

    /// Select NVM page `page`; silently skipped under SPD write protection
    pub fn set_page(&mut self, page: u8) {
        if self.bus.has_write_protection() {
            return;
        }

        match self.bus.write_byte_data(self.address, mr::VIRTUAL_PAGE, page) {
            Ok(()) => {
                if let Some(data) = page::data_of_page(Generation::Ddr5, page) {
                    self.page_data = data;
                }
            }
            Err(e) => tracing::debug!("DDR5 0x{:02x}: page {page} select failed: {e}", self.address),
        }
        sleep(SPD_IO_DELAY);
    }

    fn read_register(&self, register: u8, retries: u32) -> SmbusResult<u8> {
        retry_transient(retries, SPD_IO_DELAY, || {
            self.bus.read_byte_data(self.address, register)
        })
    }

    fn read_limit(&self, register: u8, retries: u32) -> Option<f32> {
        match retry_transient(retries, SPD_IO_DELAY, || {
            self.bus.read_word_data(self.address, register)
        }) {
            Ok(raw) => Some(convert_raw_temperature(raw)),
            Err(e) => {
                tracing::debug!(
                    "DDR5 0x{:02x}: register MR{register} failed: {e}",
                    self.address
                );
                None
            }
        }
    }

    fn read_thermal_sensor_configuration(&mut self, retries: u32) {
        self.set_page(0);

        match self.read_register(mr::DEVICE_CAPABILITY, retries) {
            Ok(capability) => {
                self.sensor.present = is_bit_set(capability, CAPABILITY_TS_SUPPORT);
            }
            Err(e) => tracing::debug!("DDR5 0x{:02x}: capability read failed: {e}", self.address),
        }
        if !self.sensor.present {
            return;
        }

        if let Some(limit) = self.read_limit(mr::HIGH_LIMIT, retries) {
            self.sensor.high_limit = limit;
        }
        if let Some(limit) = self.read_limit(mr::LOW_LIMIT, retries) {
            self.sensor.low_limit = limit;
        }
        if let Some(limit) = self.read_limit(mr::CRITICAL_HIGH_LIMIT, retries) {
            self.sensor.critical_high_limit = limit;
        }
        if let Some(limit) = self.read_limit(mr::CRITICAL_LOW_LIMIT, retries) {
            self.sensor.critical_low_limit = limit;
        }
    }

    fn refresh(&mut self, retries: u32) {
        if !self.sensor.present {
            return;
        }
        self.set_page(0);

        match self.read_register(mr::THERMAL_SENSOR_CONFIG, retries) {
            // 0 means enabled
            Ok(value) => self.sensor.enabled = value == 0,
            Err(e) => tracing::debug!("DDR5 0x{:02x}: sensor config failed: {e}", self.address),
        }

        match self.read_register(mr::THERMAL_STATUS, retries) {
            Ok(value) => {
                let status = ddr5::ThermalStatus::from_raw(value as u16);
                self.sensor.status = if status.above_critical_high {
                    ThermalStatus::AboveCriticalHighLimit
                } else if status.below_critical_low {
                    ThermalStatus::BelowCriticalLowLimit
                } else if status.above_high {
                    ThermalStatus::AboveHighLimit
                } else if status.below_low {
                    ThermalStatus::BelowLowLimit
                } else {
                    ThermalStatus::Good
                };
            }
            Err(e) => tracing::debug!("DDR5 0x{:02x}: sensor status failed: {e}", self.address),
        }
    }
}

impl SpdAccessor for Ddr5Accessor {
    fn address(&self) -> u8 {
        self.address
    }

    fn generation(&self) -> Generation {
        Generation::Ddr5
    }

    fn layout(&self) -> &'static FieldLayout {
        &LAYOUT
    }

    fn at(&mut self, offset: u16) -> u8 {
        if offset >= EEPROM_LENGTH {
            return 0xFF;
        }

        self.set_page((offset >> PAGE_SHIFT) as u8);
        let command = nvm_command(offset);
        let value = retry_transient(SPD_DATA_RETRIES, SPD_IO_DELAY, || {
            self.bus.read_byte_data(self.address, command)
        })
        .unwrap_or(0);
        sleep(SPD_IO_DELAY);
        value
    }

    fn change_page(&mut self, data: PageData) -> bool {
        match page::page_of(Generation::Ddr5, data) {
            Some(page) => {
                self.set_page(page);
                self.page_data.contains(data)
            }
            None => false,
        }
    }

    fn page_data(&self) -> PageData {
        self.page_data
    }

    fn update(&mut self) {
        self.refresh(SPD_DATA_RETRIES);
    }

    fn update_temperature(&mut self) -> bool {
        if !self.sensor.enabled {
            return false;
        }

        self.set_page(0);
        match retry_transient(SPD_TS_RETRIES, SPD_IO_DELAY, || {
            self.bus.read_word_data(self.address, mr::TEMPERATURE)
        }) {
            Ok(raw) => {
                self.sensor.temperature = convert_raw_temperature(raw);
                true
            }
            Err(e) => {
                tracing::debug!("DDR5 0x{:02x}: temperature read failed: {e}", self.address);
                false
            }
        }
    }

    fn thermal_sensor(&self) -> &ThermalSensorState {
        &self.sensor
    }
}

impl Drop for Ddr5Accessor {
    fn drop(&mut self) {
        self.set_page(0);
    }
}
