//! Which SPD fields live on which EEPROM page

use bitflags::bitflags;
use spdflow_raw::spd::Generation;

bitflags! {
    /// Field groups reachable from one page
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PageData: u32 {
        const THERMAL_DATA = 0x1;
        const MEMORY_TYPE = 0x2;
        const SPD_REVISION = 0x4;
        const MODULE_MANUFACTURER_ID = 0x1000;
        const MODULE_MANUFACTURING_LOCATION = 0x2000;
        const MODULE_MANUFACTURING_DATE = 0x4000;
        const MODULE_SERIAL_NUMBER = 0x8000;
        const MODULE_PART_NUMBER = 0x1_0000;
        const MODULE_REVISION_CODE = 0x2_0000;
        const DRAM_MANUFACTURER_CODE = 0x4_0000;
        const MANUFACTURER_SPECIFIC_DATA = 0x8_0000;

        const BASE = Self::THERMAL_DATA.bits() | Self::MEMORY_TYPE.bits() | Self::SPD_REVISION.bits();
        const MANUFACTURING = Self::MODULE_MANUFACTURER_ID.bits()
            | Self::MODULE_MANUFACTURING_LOCATION.bits()
            | Self::MODULE_MANUFACTURING_DATE.bits()
            | Self::MODULE_SERIAL_NUMBER.bits()
            | Self::MODULE_PART_NUMBER.bits()
            | Self::MODULE_REVISION_CODE.bits()
            | Self::DRAM_MANUFACTURER_CODE.bits()
            | Self::MANUFACTURER_SPECIFIC_DATA.bits();
    }
}

const DDR4_PAGES: &[(u8, PageData)] = &[(0, PageData::BASE), (1, PageData::MANUFACTURING)];
const DDR5_PAGES: &[(u8, PageData)] = &[(0, PageData::BASE), (4, PageData::MANUFACTURING)];

pub fn page_map(generation: Generation) -> &'static [(u8, PageData)] {
    match generation {
        Generation::Ddr4 => DDR4_PAGES,
        Generation::Ddr5 => DDR5_PAGES,
    }
}

/// Field groups of `page`, if the page carries any known fields
pub fn data_of_page(generation: Generation, page: u8) -> Option<PageData> {
    page_map(generation)
        .iter()
        .find(|(p, _)| *p == page)
        .map(|(_, data)| *data)
}

/// Page holding every field of `data`
pub fn page_of(generation: Generation, data: PageData) -> Option<u8> {
    page_map(generation)
        .iter()
        .find(|(_, d)| d.contains(data))
        .map(|(page, _)| *page)
}
