use chrono::NaiveDate;
use serde::Serialize;

use super::{SpdAccessor, ThermalSensorState};

/// Snapshot of one module's identification and sensor fields
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModuleInfo {
    pub bus: String,
    pub address: u8,
    pub generation: &'static str,
    pub memory_type: &'static str,
    pub spd_revision: u8,
    pub module_manufacturer: Option<&'static str>,
    pub module_manufacturer_code: (u8, u8),
    pub manufacturing_location: u8,
    pub manufacturing_date: Option<NaiveDate>,
    pub serial_number: String,
    pub part_number: String,
    pub revision_code: u8,
    pub dram_manufacturer: Option<&'static str>,
    pub dram_manufacturer_code: (u8, u8),
    pub thermal_sensor: ThermalSensorState,
}

impl ModuleInfo {
    pub fn read(bus: &str, spd: &mut dyn SpdAccessor) -> Self {
        spd.update();
        spd.update_temperature();

        Self {
            bus: bus.to_string(),
            address: spd.address(),
            generation: spd.generation().name(),
            memory_type: spd.memory_type().name(),
            spd_revision: spd.spd_revision(),
            module_manufacturer: spd.module_manufacturer(),
            module_manufacturer_code: (
                spd.module_manufacturer_continuation_code(),
                spd.module_manufacturer_id_code(),
            ),
            manufacturing_location: spd.module_manufacturing_location(),
            manufacturing_date: spd.module_manufacturing_date(),
            serial_number: spd.module_serial_number(),
            part_number: spd.module_part_number(),
            revision_code: spd.module_revision_code(),
            dram_manufacturer: spd.dram_manufacturer(),
            dram_manufacturer_code: (
                spd.dram_manufacturer_continuation_code(),
                spd.dram_manufacturer_id_code(),
            ),
            thermal_sensor: *spd.thermal_sensor(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spd::fake::{Ddr4Module, FakeSpdBus};
    use crate::spd::Ddr4Accessor;
    use spdflow_raw::spd::ddr4::offset;
    use std::sync::Arc;

    #[test]
    fn test_read_and_serialize() {
        let bus = Arc::new(FakeSpdBus::new());
        let mut module = Ddr4Module::new();
        module.set(offset::MODULE_MANUFACTURER_CONTINUATION_CODE, &[0x80, 0xCE, 0x03]);
        module.set(offset::MODULE_PART_NUMBER_BEGIN, b"M393A2K43BB1-CTD");
        bus.add_ddr4(0x50, module);

        let mut spd = Ddr4Accessor::new(bus.clone(), 0x50);
        let info = ModuleInfo::read("fake SMBus", &mut spd);

        assert_eq!(info.generation, "DDR4");
        assert_eq!(info.memory_type, "DDR4 SDRAM");
        assert_eq!(info.spd_revision, 0x11);
        assert_eq!(info.module_manufacturer, Some("Samsung"));
        assert_eq!(info.module_manufacturer_code, (0x00, 0xCE));
        assert_eq!(info.manufacturing_location, 0x03);
        assert_eq!(info.manufacturing_date, None);
        assert_eq!(info.serial_number, "0000");
        assert_eq!(info.part_number, "M393A2K43BB1-CTD");
        assert!(!info.thermal_sensor.present);

        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["address"], 0x50);
        assert_eq!(json["part_number"], "M393A2K43BB1-CTD");
        assert_eq!(json["thermal_sensor"]["present"], false);
    }
}
