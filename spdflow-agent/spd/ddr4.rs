//! DDR4 modules: EE1004 EEPROM plus optional TSE2004 thermal sensor

use std::sync::Arc;

use spdflow_raw::spd::ddr4::{
    offset, ts, ts_address, TsCapabilities, TsConfiguration, TsTemperature, EEPROM_LENGTH,
    PAGE_ADDRESS, PAGE_MASK, PAGE_SHIFT, SPD_BYTES_MAGIC, THERMAL_SENSOR_BIT, THERMAL_SENSOR_BYTE,
};
use spdflow_raw::spd::{Generation, SPD_CFG_RETRIES, SPD_DATA_RETRIES, SPD_TS_RETRIES};
use spdflow_raw::{Direction, RegisterLayout, SmbusError, SmbusResult};

use super::page::{self, PageData};
use super::retry::{retry_transient, SPD_IO_DELAY};
use super::{FieldLayout, SpdAccessor, ThermalSensorState, ThermalStatus};
use crate::common::{convert_raw_temperature, is_bit_set};
use crate::smbus::SmbusBus;

/// Value written to the page select addresses
const PAGE_SELECT_VALUE: u8 = 0xFF;

static LAYOUT: FieldLayout = FieldLayout {
    module_manufacturer_continuation_code: offset::MODULE_MANUFACTURER_CONTINUATION_CODE,
    module_manufacturer_id_code: offset::MODULE_MANUFACTURER_ID_CODE,
    module_manufacturing_location: offset::MODULE_MANUFACTURING_LOCATION,
    module_manufacturing_date: (
        offset::MODULE_MANUFACTURING_DATE_BEGIN,
        offset::MODULE_MANUFACTURING_DATE_END,
    ),
    module_serial_number: (
        offset::MODULE_SERIAL_NUMBER_BEGIN,
        offset::MODULE_SERIAL_NUMBER_END,
    ),
    module_part_number: (
        offset::MODULE_PART_NUMBER_BEGIN,
        offset::MODULE_PART_NUMBER_END,
    ),
    module_revision_code: offset::MODULE_REVISION_CODE,
    dram_manufacturer_continuation_code: offset::DRAM_MANUFACTURER_CONTINUATION_CODE,
    dram_manufacturer_id_code: offset::DRAM_MANUFACTURER_ID_CODE,
    manufacturer_specific_data: (
        offset::MANUFACTURER_SPECIFIC_DATA_BEGIN,
        offset::MANUFACTURER_SPECIFIC_DATA_END,
    ),
};

/// Select EEPROM page `page` on every DDR4 module of the bus
fn select_page(bus: &dyn SmbusBus, page: u8) -> SmbusResult<()> {
    let result = bus.write_byte_data(PAGE_ADDRESS + page, 0x00, PAGE_SELECT_VALUE);
    std::thread::sleep(SPD_IO_DELAY);
    result
}

pub struct Ddr4Accessor {
    bus: Arc<dyn SmbusBus>,
    address: u8,
    ts_address: u8,
    page_data: PageData,
    sensor: ThermalSensorState,
    capabilities: Option<u16>,
    configuration: Option<u16>,
    sensor_manufacturer_id: Option<u16>,
    sensor_device_id: Option<u16>,
}

impl Ddr4Accessor {
    /// Probe for an EE1004 EEPROM at `address`
    pub fn is_available(bus: &dyn SmbusBus, address: u8) -> bool {
        if retry_transient(SPD_CFG_RETRIES, SPD_IO_DELAY, || {
            bus.write_quick(PAGE_ADDRESS, Direction::Write)
        })
        .is_err()
        {
            return false;
        }

        let _ = select_page(bus, 0);
        matches!(bus.read_byte_data(address, 0x00), Ok(SPD_BYTES_MAGIC))
    }

    pub fn new(bus: Arc<dyn SmbusBus>, address: u8) -> Self {
        let mut accessor = Self {
            bus,
            address,
            ts_address: ts_address(address),
            page_data: PageData::empty(),
            sensor: ThermalSensorState::default(),
            capabilities: None,
            configuration: None,
            sensor_manufacturer_id: None,
            sensor_device_id: None,
        };

        if let Some(data) = page::data_of_page(Generation::Ddr4, accessor.get_page()) {
            accessor.page_data = data;
        }

        accessor.sensor.present = accessor.probe_thermal_sensor();
        if accessor.sensor.present {
            accessor.read_thermal_sensor_configuration(SPD_CFG_RETRIES);
        }

        accessor
    }

    /// Raw TSE2004 capability register
    pub fn sensor_capabilities(&self) -> Option<u16> {
        self.capabilities
    }

    /// Raw TSE2004 configuration register
    pub fn sensor_configuration(&self) -> Option<u16> {
        self.configuration
    }

    pub fn sensor_manufacturer_id(&self) -> Option<u16> {
        self.sensor_manufacturer_id
    }

    pub fn sensor_device_id(&self) -> Option<u16> {
        self.sensor_device_id
    }

    /// Current EEPROM page: 0, 1, or 255 when it cannot be determined
    fn get_page(&self) -> u8 {
        match self.bus.read_byte(PAGE_ADDRESS) {
            Ok(_) => 0,
            Err(SmbusError::NoSuchDevice) => 1,
            Err(_) => u8::MAX,
        }
    }

    fn set_page(&mut self, page: u8) {
        match select_page(self.bus.as_ref(), page) {
            Ok(()) => {
                if let Some(data) = page::data_of_page(Generation::Ddr4, page) {
                    self.page_data = data;
                }
            }
            Err(e) => tracing::debug!("DDR4 0x{:02x}: page {page} select failed: {e}", self.address),
        }
    }

    fn read_ts_register(&self, register: u8, retries: u32) -> SmbusResult<u16> {
        retry_transient(retries, SPD_IO_DELAY, || {
            self.bus.read_word_data_swapped(self.ts_address, register)
        })
    }

    fn probe_thermal_sensor(&mut self) -> bool {
        self.set_page(0);

        match self.bus.read_byte_data(self.address, THERMAL_SENSOR_BYTE as u8) {
            Err(e) => {
                tracing::debug!("DDR4 0x{:02x}: thermal sensor byte unreadable: {e}", self.address);
                false
            }
            Ok(value) if is_bit_set(value, THERMAL_SENSOR_BIT) => true,
            Ok(_) => {
                let found = self
                    .bus
                    .write_quick(self.ts_address, Direction::Write)
                    .is_ok();
                if found {
                    tracing::debug!(
                        "DDR4 0x{:02x}: unregistered thermal sensor at 0x{:02x}",
                        self.address,
                        self.ts_address
                    );
                }
                found
            }
        }
    }

    fn read_limit(&self, register: u8, retries: u32) -> Option<f32> {
        match self.read_ts_register(register, retries) {
            Ok(raw) => Some(convert_raw_temperature(raw)),
            Err(e) => {
                tracing::debug!(
                    "DDR4 0x{:02x}: sensor register 0x{register:02x} failed: {e}",
                    self.address
                );
                None
            }
        }
    }

    fn read_thermal_sensor_configuration(&mut self, retries: u32) {
        self.set_page(0);

        match self.read_ts_register(ts::CAPABILITIES, retries) {
            Ok(raw) => {
                self.capabilities = Some(raw);
                self.sensor.resolution = TsCapabilities::from_raw(raw).resolution_celsius();
            }
            Err(e) => tracing::debug!("DDR4 0x{:02x}: capabilities failed: {e}", self.address),
        }

        self.read_configuration(retries);

        if let Some(limit) = self.read_limit(ts::HIGH_LIMIT, retries) {
            self.sensor.high_limit = limit;
        }
        if let Some(limit) = self.read_limit(ts::LOW_LIMIT, retries) {
            self.sensor.low_limit = limit;
        }
        if let Some(limit) = self.read_limit(ts::CRITICAL_LIMIT, retries) {
            self.sensor.critical_high_limit = limit;
        }

        self.sensor_manufacturer_id = self.read_ts_register(ts::MANUFACTURER, retries).ok();
        self.sensor_device_id = self.read_ts_register(ts::DEVICE_ID, retries).ok();
    }

    fn read_configuration(&mut self, retries: u32) {
        match self.read_ts_register(ts::CONFIGURATION, retries) {
            Ok(raw) => {
                self.configuration = Some(raw);
                self.sensor.enabled = !TsConfiguration::from_raw(raw).shutdown;
            }
            Err(e) => tracing::debug!("DDR4 0x{:02x}: configuration failed: {e}", self.address),
        }
    }
}

impl SpdAccessor for Ddr4Accessor {
    fn address(&self) -> u8 {
        self.address
    }

    fn generation(&self) -> Generation {
        Generation::Ddr4
    }

    fn layout(&self) -> &'static FieldLayout {
        &LAYOUT
    }

    fn at(&mut self, offset: u16) -> u8 {
        if offset >= EEPROM_LENGTH {
            return 0xFF;
        }

        self.set_page((offset >> PAGE_SHIFT) as u8);
        let command = (offset & PAGE_MASK) as u8;
        let value = retry_transient(SPD_DATA_RETRIES, SPD_IO_DELAY, || {
            self.bus.read_byte_data(self.address, command)
        })
        .unwrap_or(0);
        std::thread::sleep(SPD_IO_DELAY);
        value
    }

    fn change_page(&mut self, data: PageData) -> bool {
        match page::page_of(Generation::Ddr4, data) {
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
        if self.sensor.present {
            self.set_page(0);
            self.read_configuration(SPD_DATA_RETRIES);
        }
    }

    fn update_temperature(&mut self) -> bool {
        if !self.sensor.present {
            return false;
        }

        self.set_page(0);
        match self.read_ts_register(ts::TEMPERATURE, SPD_TS_RETRIES) {
            Ok(raw) => {
                let reading = TsTemperature::from_raw(raw);
                self.sensor.temperature = convert_raw_temperature(reading.value);
                self.sensor.status = if reading.above_critical {
                    ThermalStatus::AboveCriticalHighLimit
                } else if reading.above_high {
                    ThermalStatus::AboveHighLimit
                } else if reading.below_low {
                    ThermalStatus::BelowLowLimit
                } else {
                    ThermalStatus::Good
                };
                true
            }
            Err(e) => {
                tracing::debug!("DDR4 0x{:02x}: temperature read failed: {e}", self.address);
                false
            }
        }
    }

    fn thermal_sensor(&self) -> &ThermalSensorState {
        &self.sensor
    }
}

impl Drop for Ddr4Accessor {
    fn drop(&mut self) {
        self.set_page(0);
    }
}
