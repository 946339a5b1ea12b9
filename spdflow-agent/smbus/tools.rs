//! `i2cdetect`/`i2cdump`-style helpers on top of [`SmbusBus`]

use std::fmt::Write;

use spdflow_raw::{Direction, SmbusError};

use super::SmbusBus;

/// How [`i2c_detect`] probes each address
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DetectMode {
    /// Receive byte on EEPROM-like ranges, quick write elsewhere
    #[default]
    Auto,
    Quick,
    Read,
}

const FIRST_ADDRESS: u8 = 0x03;
const LAST_ADDRESS: u8 = 0x77;

fn probe(bus: &dyn SmbusBus, address: u8, mode: DetectMode) -> Result<(), SmbusError> {
    let read = match mode {
        DetectMode::Quick => false,
        DetectMode::Read => true,
        DetectMode::Auto => matches!(address, 0x30..=0x37 | 0x50..=0x5F),
    };

    if read {
        bus.read_byte(address).map(|_| ())
    } else {
        bus.write_quick(address, Direction::Write)
    }
}

/// Address map of every device answering on `bus`
pub fn i2c_detect(bus: &dyn SmbusBus, mode: DetectMode) -> String {
    let mut out = String::from("     0  1  2  3  4  5  6  7  8  9  a  b  c  d  e  f\n");

    for row in (0u8..128).step_by(16) {
        let _ = write!(out, "{row:02x}: ");
        for address in row..row + 16 {
            if !(FIRST_ADDRESS..=LAST_ADDRESS).contains(&address) {
                out.push_str("   ");
                continue;
            }

            match probe(bus, address, mode) {
                Ok(()) => {
                    let _ = write!(out, "{address:02x} ");
                }
                Err(SmbusError::Busy) => out.push_str("UU "),
                Err(_) => out.push_str("-- "),
            }
        }
        out.push('\n');
    }

    out
}

/// All 256 byte-data registers of one device; unreadable registers show `XX`
pub fn i2c_dump(bus: &dyn SmbusBus, address: u8) -> String {
    let mut out = String::from("     0  1  2  3  4  5  6  7  8  9  a  b  c  d  e  f\n");

    for row in (0u16..256).step_by(16) {
        let _ = write!(out, "{row:02x}:");
        for register in row..row + 16 {
            match bus.read_byte_data(address, register as u8) {
                Ok(value) => {
                    let _ = write!(out, " {value:02x}");
                }
                Err(_) => out.push_str(" XX"),
            }
        }
        out.push('\n');
    }

    out
}

/// Point the device at `register`, then receive `size` consecutive bytes
pub fn i2c_read(
    bus: &dyn SmbusBus,
    address: u8,
    register: u8,
    size: usize,
) -> Result<Vec<u8>, SmbusError> {
    bus.write_byte(address, register)?;
    (0..size).map(|_| bus.read_byte(address)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smbus::sim::{MemoryDevice, SimI801};
    use crate::smbus::{BusInfo, ControllerKind, PollPolicy, SmbusController, I801};
    use spdflow_raw::{SmbusData, SmbusResult, Width};
    use std::sync::Arc;

    /// Answers on a fixed set of addresses and reports one as claimed
    struct Probed {
        info: BusInfo,
        present: Vec<u8>,
        claimed: u8,
        reads: parking_lot::Mutex<Vec<(u8, Width)>>,
    }

    impl SmbusBus for Probed {
        fn info(&self) -> &BusInfo {
            &self.info
        }

        fn transfer(
            &self,
            address: u8,
            _direction: Direction,
            _command: u8,
            width: Width,
            _data: &mut SmbusData,
        ) -> SmbusResult<()> {
            self.reads.lock().push((address, width));
            if address == self.claimed {
                Err(SmbusError::Busy)
            } else if self.present.contains(&address) {
                Ok(())
            } else {
                Err(SmbusError::NoSuchDevice)
            }
        }
    }

    #[test]
    fn test_detect_grid() {
        let bus = Probed {
            info: BusInfo::default(),
            present: vec![0x18, 0x50, 0x52],
            claimed: 0x36,
            reads: Default::default(),
        };

        let grid = i2c_detect(&bus, DetectMode::Auto);
        let lines: Vec<&str> = grid.lines().collect();

        assert_eq!(lines.len(), 9);
        assert_eq!(lines[0], "     0  1  2  3  4  5  6  7  8  9  a  b  c  d  e  f");
        assert!(lines[1].starts_with("00:          -- "));
        assert!(lines[2].contains(" 18 "));
        assert!(lines[4].contains("UU"));
        assert!(lines[6].starts_with("50: 50 -- 52 --"));
        assert!(lines[8].ends_with("--                         "));
    }

    #[test]
    fn test_detect_auto_uses_receive_byte_on_eeproms() {
        let bus = Probed {
            info: BusInfo::default(),
            present: vec![],
            claimed: 0,
            reads: Default::default(),
        };

        i2c_detect(&bus, DetectMode::Auto);
        let reads = bus.reads.lock();
        assert_eq!(reads.len(), 0x75);
        assert!(reads.contains(&(0x50, Width::Byte)));
        assert!(reads.contains(&(0x30, Width::Byte)));
        assert!(reads.contains(&(0x18, Width::Quick)));
        assert!(reads.contains(&(0x60, Width::Quick)));
    }

    #[test]
    fn test_dump_and_read() {
        let sim = Arc::new(SimI801::new(0xEFA0));
        let bytes: Vec<u8> = (0..=255).collect();
        sim.add_device(0x50, MemoryDevice::with_bytes(&bytes));
        let bus = SmbusController::new(
            ControllerKind::Intel(
                I801::new(sim.clone(), 0xEFA0).with_poll_policy(PollPolicy::immediate(450)),
            ),
            BusInfo::default(),
        );

        let dump = i2c_dump(&bus, 0x50);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 17);
        assert!(lines[1].starts_with("00: 00 01 02"));
        assert!(lines[16].ends_with("fe ff"));

        assert_eq!(i2c_read(&bus, 0x50, 0x10, 3).unwrap(), vec![0x10, 0x11, 0x12]);
        assert_eq!(i2c_read(&bus, 0x51, 0x10, 3), Err(SmbusError::NoSuchDevice));
    }
}
