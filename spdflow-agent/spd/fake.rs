//! In-memory SPD bus speaking the DDR4 and DDR5 module protocols

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;
use spdflow_raw::spd::{ddr4, ddr5};
use spdflow_raw::{Direction, SmbusData, SmbusError, SmbusResult, Width};

use crate::smbus::{BusInfo, SmbusBus};

/// EE1004 EEPROM and optional TSE2004 sensor of one DDR4 module
#[derive(Clone)]
pub struct Ddr4Module {
    eeprom: Vec<u8>,
    /// Sensor registers as the host decodes them, MSB first on the wire
    sensor: Option<[u16; 8]>,
}

impl Ddr4Module {
    pub fn new() -> Self {
        let mut eeprom = vec![0; ddr4::EEPROM_LENGTH as usize];
        eeprom[..3].copy_from_slice(&[ddr4::SPD_BYTES_MAGIC, 0x11, 0x0C]);
        Self {
            eeprom,
            sensor: None,
        }
    }

    pub fn set(&mut self, offset: u16, bytes: &[u8]) {
        let offset = offset as usize;
        self.eeprom[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    pub fn set_sensor(&mut self, registers: [u16; 8]) {
        self.sensor = Some(registers);
    }
}

/// SPD5118 hub of one DDR5 module
#[derive(Clone)]
pub struct Ddr5Module {
    eeprom: Vec<u8>,
    mr: [u8; 128],
}

impl Ddr5Module {
    pub fn new() -> Self {
        let mut eeprom = vec![0; ddr5::EEPROM_LENGTH as usize];
        eeprom[..3].copy_from_slice(&[0x30, 0x10, 0x12]);
        let mut mr = [0; 128];
        mr[ddr5::mr::DEVICE_TYPE_MSB as usize] = ddr5::DEVICE_TYPE_MAGIC;
        mr[ddr5::mr::DEVICE_TYPE_LSB as usize] = ddr5::DEVICE_TYPE_LSB;
        mr[ddr5::mr::DEVICE_CAPABILITY as usize] = 1 << ddr5::CAPABILITY_TS_SUPPORT;
        Self { eeprom, mr }
    }

    pub fn set(&mut self, offset: u16, bytes: &[u8]) {
        let offset = offset as usize;
        self.eeprom[offset..offset + bytes.len()].copy_from_slice(bytes);
    }

    pub fn set_mr(&mut self, register: u8, value: u8) {
        self.mr[register as usize] = value;
    }

    pub fn set_mr_word(&mut self, register: u8, value: u16) {
        let [low, high] = value.to_le_bytes();
        self.mr[register as usize] = low;
        self.mr[register as usize + 1] = high;
    }

    pub fn page(&self) -> u8 {
        self.mr[ddr5::mr::VIRTUAL_PAGE as usize]
    }
}

/// One recorded transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transfer {
    pub address: u8,
    pub direction: Direction,
    pub command: u8,
    pub width: Width,
}

#[derive(Default)]
struct State {
    ddr4: HashMap<u8, Ddr4Module>,
    ddr4_page: u8,
    ddr5: HashMap<u8, Ddr5Module>,
    failures: VecDeque<SmbusError>,
    log: Vec<Transfer>,
}

impl State {
    fn ddr4_page_select(
        &mut self,
        address: u8,
        direction: Direction,
        width: Width,
        data: &mut SmbusData,
    ) -> SmbusResult<()> {
        if self.ddr4.is_empty() {
            return Err(SmbusError::NoSuchDevice);
        }
        let page = address - ddr4::PAGE_ADDRESS;
        match (direction, width) {
            (_, Width::Quick) => Ok(()),
            (Direction::Write, Width::ByteData) => {
                self.ddr4_page = page;
                Ok(())
            }
            // The select address of the current page acknowledges a read
            (Direction::Read, Width::Byte) if page == self.ddr4_page => {
                data.set_byte(0);
                Ok(())
            }
            (Direction::Read, Width::Byte) => Err(SmbusError::NoSuchDevice),
            _ => Err(SmbusError::Io),
        }
    }

    fn ddr4_sensor(
        &mut self,
        address: u8,
        direction: Direction,
        command: u8,
        width: Width,
        data: &mut SmbusData,
    ) -> SmbusResult<()> {
        let spd_address = 0x50 | (address & 0x07);
        let registers = self
            .ddr4
            .get(&spd_address)
            .and_then(|module| module.sensor)
            .ok_or(SmbusError::NoSuchDevice)?;
        match (direction, width) {
            (_, Width::Quick) => Ok(()),
            (Direction::Read, Width::WordData) => {
                let value = registers.get(command as usize).copied().unwrap_or(0);
                data.set_word(value.swap_bytes());
                Ok(())
            }
            _ => Err(SmbusError::Io),
        }
    }

    fn transfer(
        &mut self,
        address: u8,
        direction: Direction,
        command: u8,
        width: Width,
        data: &mut SmbusData,
    ) -> SmbusResult<()> {
        if (ddr4::PAGE_ADDRESS..=ddr4::PAGE_ADDRESS + 1).contains(&address) {
            return self.ddr4_page_select(address, direction, width, data);
        }
        if address & 0xF8 == ddr4::TS_ADDRESS_BASE {
            return self.ddr4_sensor(address, direction, command, width, data);
        }

        if let Some(module) = self.ddr4.get(&address) {
            let page_offset = self.ddr4_page as usize * 256;
            return match (direction, width) {
                (_, Width::Quick) => Ok(()),
                (Direction::Read, Width::ByteData) => {
                    data.set_byte(module.eeprom[page_offset + command as usize]);
                    Ok(())
                }
                _ => Err(SmbusError::Io),
            };
        }

        if let Some(module) = self.ddr5.get_mut(&address) {
            return match (direction, width) {
                (_, Width::Quick) => Ok(()),
                (Direction::Read, Width::ByteData) if command & ddr5::NVM_WINDOW != 0 => {
                    let page = (module.page() & 0x07) as usize;
                    let offset = page * 128 + (command & 0x7F) as usize;
                    data.set_byte(module.eeprom[offset]);
                    Ok(())
                }
                (Direction::Read, Width::ByteData) => {
                    data.set_byte(module.mr[command as usize]);
                    Ok(())
                }
                (Direction::Write, Width::ByteData) if command & ddr5::NVM_WINDOW == 0 => {
                    module.mr[command as usize] = data.byte();
                    Ok(())
                }
                (Direction::Read, Width::WordData) if command < 0x7F => {
                    let word = u16::from_le_bytes([
                        module.mr[command as usize],
                        module.mr[command as usize + 1],
                    ]);
                    data.set_word(word);
                    Ok(())
                }
                _ => Err(SmbusError::Io),
            };
        }

        Err(SmbusError::NoSuchDevice)
    }
}

/// Protocol-level bus holding DDR4 and DDR5 modules
pub struct FakeSpdBus {
    info: BusInfo,
    state: Mutex<State>,
}

impl FakeSpdBus {
    pub fn new() -> Self {
        Self {
            info: BusInfo {
                name: "fake SMBus".to_string(),
                ..BusInfo::default()
            },
            state: Mutex::new(State::default()),
        }
    }

    pub fn write_protected() -> Self {
        let mut bus = Self::new();
        bus.info.write_protected = true;
        bus
    }

    pub fn add_ddr4(&self, address: u8, module: Ddr4Module) {
        self.state.lock().ddr4.insert(address, module);
    }

    pub fn add_ddr5(&self, address: u8, module: Ddr5Module) {
        self.state.lock().ddr5.insert(address, module);
    }

    /// Fail the next transfers with `errors`, in order
    pub fn fail_next(&self, errors: &[SmbusError]) {
        self.state.lock().failures.extend(errors.iter().copied());
    }

    pub fn ddr4_page(&self) -> u8 {
        self.state.lock().ddr4_page
    }

    pub fn ddr5_page(&self, address: u8) -> Option<u8> {
        self.state.lock().ddr5.get(&address).map(Ddr5Module::page)
    }

    pub fn set_ddr5_mr(&self, address: u8, register: u8, value: u8) {
        if let Some(module) = self.state.lock().ddr5.get_mut(&address) {
            module.set_mr(register, value);
        }
    }

    pub fn transfers(&self) -> Vec<Transfer> {
        self.state.lock().log.clone()
    }

    pub fn writes_to(&self, address: u8) -> usize {
        self.state
            .lock()
            .log
            .iter()
            .filter(|t| t.address == address && t.direction == Direction::Write)
            .count()
    }
}

impl SmbusBus for FakeSpdBus {
    fn info(&self) -> &BusInfo {
        &self.info
    }

    fn transfer(
        &self,
        address: u8,
        direction: Direction,
        command: u8,
        width: Width,
        data: &mut SmbusData,
    ) -> SmbusResult<()> {
        let mut state = self.state.lock();
        state.log.push(Transfer {
            address,
            direction,
            command,
            width,
        });
        if let Some(error) = state.failures.pop_front() {
            return Err(error);
        }
        state.transfer(address, direction, command, width, data)
    }
}
