//! AMD PIIX4-compatible host controller state machine

use std::sync::Arc;

use spdflow_raw::controller::piix4::{cmd, reg, HostStatus, HSTCNT_SIZE_MASK, HSTCNT_START};
use spdflow_raw::{Direction, PortIo, SmbusData, SmbusError, SmbusResult, Width, I2C_SMBUS_BLOCK_MAX};

use super::poll::{poll_status, PollPolicy};
use super::SmbusEngine;

pub struct Piix4 {
    port: Arc<dyn PortIo>,
    base: u16,
    poll: PollPolicy,
}

impl Piix4 {
    pub fn new(port: Arc<dyn PortIo>, base: u16) -> Self {
        Self {
            port,
            base,
            poll: PollPolicy::COMPLETION,
        }
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    fn port_of(&self, register: u16) -> SmbusResult<u16> {
        self.base.checked_add(register).ok_or_else(|| {
            tracing::warn!("piix4 0x{:04x}: register 0x{register:x} is past the I/O space", self.base);
            SmbusError::InvalidArgument
        })
    }

    fn inb(&self, register: u16) -> SmbusResult<u8> {
        Ok(self.port.read_port(self.port_of(register)?)?)
    }

    fn outb(&self, register: u16, value: u8) -> SmbusResult<()> {
        Ok(self.port.write_port(self.port_of(register)?, value)?)
    }

    fn check_pre(&self) -> SmbusResult<()> {
        let status = self.inb(reg::HSTSTS)?;
        if HostStatus::from_bits_retain(status).contains(HostStatus::HOST_BUSY) {
            tracing::debug!("piix4 0x{:04x}: host busy before transaction", self.base);
            return Err(SmbusError::Busy);
        }

        if status != 0 {
            self.outb(reg::HSTSTS, status)?;
            if self.inb(reg::HSTSTS)? != 0 {
                return Err(SmbusError::Busy);
            }
        }

        Ok(())
    }

    /// Start the prepared transaction and translate its completion status
    fn transaction(&self) -> SmbusResult<()> {
        let cnt = self.inb(reg::HSTCNT)?;
        self.outb(reg::HSTCNT, cnt | HSTCNT_START)?;

        let polled = poll_status(
            &self.poll,
            || self.inb(reg::HSTSTS),
            |raw| HostStatus::from_bits_retain(raw).is_done(),
        )?;
        let status = HostStatus::from_bits_retain(polled.status);

        let mut result = Ok(());
        if polled.timed_out || status.contains(HostStatus::HOST_BUSY) {
            tracing::debug!("piix4 0x{:04x}: transaction timeout", self.base);
            result = Err(SmbusError::Timeout);
        }
        if status.contains(HostStatus::FAILED) {
            result = Err(SmbusError::Io);
        }
        if status.contains(HostStatus::BUS_COLLISION) {
            tracing::warn!(
                "piix4 0x{:04x}: bus collision, SMBus may be locked until reset",
                self.base
            );
            result = Err(SmbusError::Io);
        }
        if status.contains(HostStatus::DEV_ERR) {
            result = Err(SmbusError::NoSuchDevice);
        }

        let leftover = self.inb(reg::HSTSTS)?;
        if leftover != 0 {
            self.outb(reg::HSTSTS, leftover)?;
        }

        result
    }
}

impl SmbusEngine for Piix4 {
    fn family(&self) -> &'static str {
        "piix4"
    }

    fn base(&self) -> u16 {
        self.base
    }

    fn access(
        &self,
        address: u8,
        direction: Direction,
        command: u8,
        width: Width,
        data: &mut SmbusData,
    ) -> SmbusResult<()> {
        if width == Width::I2cBlockData {
            return Err(SmbusError::OpNotSupported);
        }
        if direction == Direction::Write && width == Width::BlockData {
            let len = data.len_byte() as usize;
            if !(1..=I2C_SMBUS_BLOCK_MAX).contains(&len) {
                return Err(SmbusError::InvalidArgument);
            }
        }

        self.check_pre()?;

        let write = direction == Direction::Write;
        self.outb(reg::HSTADD, direction.address_byte(address))?;

        let size = match width {
            Width::Quick => cmd::QUICK,
            Width::Byte => {
                if write {
                    self.outb(reg::HSTCMD, command)?;
                }
                cmd::BYTE
            }
            Width::ByteData => {
                self.outb(reg::HSTCMD, command)?;
                if write {
                    self.outb(reg::HSTDAT0, data.byte())?;
                }
                cmd::BYTE_DATA
            }
            Width::WordData => {
                self.outb(reg::HSTCMD, command)?;
                if write {
                    let [low, high] = data.word().to_le_bytes();
                    self.outb(reg::HSTDAT0, low)?;
                    self.outb(reg::HSTDAT1, high)?;
                }
                cmd::WORD_DATA
            }
            Width::BlockData => {
                self.outb(reg::HSTCMD, command)?;
                if write {
                    let len = data.block_len();
                    self.outb(reg::HSTDAT0, len as u8)?;
                    // reading HSTCNT resets the block FIFO index
                    self.inb(reg::HSTCNT)?;
                    for &byte in data.block() {
                        self.outb(reg::BLKDAT, byte)?;
                    }
                }
                cmd::BLOCK_DATA
            }
            Width::I2cBlockData => return Err(SmbusError::OpNotSupported),
        };

        self.outb(reg::HSTCNT, size & HSTCNT_SIZE_MASK)?;
        self.transaction()?;

        if write || size == cmd::QUICK {
            return Ok(());
        }

        match size {
            cmd::BYTE | cmd::BYTE_DATA => data.set_byte(self.inb(reg::HSTDAT0)?),
            cmd::WORD_DATA => {
                let low = self.inb(reg::HSTDAT0)?;
                let high = self.inb(reg::HSTDAT1)?;
                data.set_word(u16::from_le_bytes([low, high]));
            }
            cmd::BLOCK_DATA => {
                let len = self.inb(reg::HSTDAT0)?;
                if len == 0 || len as usize > I2C_SMBUS_BLOCK_MAX {
                    tracing::debug!("piix4 0x{:04x}: illegal block length {}", self.base, len);
                    return Err(SmbusError::Protocol);
                }
                data.set_len_byte(len);
                self.inb(reg::HSTCNT)?;
                for i in 1..=len as usize {
                    data.set_block_byte(i, self.inb(reg::BLKDAT)?);
                }
            }
            _ => {}
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smbus::sim::{MemoryDevice, SimMode, SimPiix4};
    use spdflow_raw::controller::piix4::PRIMARY_BASE;

    fn engine(sim: &Arc<SimPiix4>) -> Piix4 {
        Piix4::new(sim.clone(), PRIMARY_BASE).with_poll_policy(PollPolicy::immediate(450))
    }

    #[test]
    fn test_busy_at_precheck_writes_nothing() {
        let sim = Arc::new(SimPiix4::new(PRIMARY_BASE));
        sim.set_mode(SimMode::StuckBusy);
        let mut data = SmbusData::new();

        let result = engine(&sim).access(0x50, Direction::Read, 0, Width::Byte, &mut data);
        assert_eq!(result.map_err(|e| e.status()), Err(-16));
        assert!(sim.writes().is_empty());
    }

    #[test]
    fn test_never_completes_times_out() {
        let sim = Arc::new(SimPiix4::new(PRIMARY_BASE));
        sim.add_device(0x50, MemoryDevice::new());
        sim.set_mode(SimMode::NeverComplete);
        let mut data = SmbusData::new();

        let result = engine(&sim).access(0x50, Direction::Read, 0, Width::ByteData, &mut data);
        assert_eq!(result.map_err(|e| e.status()), Err(-138));
    }

    #[test]
    fn test_byte_and_word_reads() {
        let sim = Arc::new(SimPiix4::new(PRIMARY_BASE));
        sim.add_device(0x52, MemoryDevice::with_bytes(&[0x12, 0x34, 0x56]));
        let eng = engine(&sim);

        let mut data = SmbusData::new();
        eng.access(0x52, Direction::Read, 2, Width::ByteData, &mut data)
            .unwrap();
        assert_eq!(data.byte(), 0x56);

        eng.access(0x52, Direction::Read, 0, Width::WordData, &mut data)
            .unwrap();
        assert_eq!(data.word(), 0x3412);
    }

    #[test]
    fn test_missing_device_is_enxio_and_clears_flags() {
        let sim = Arc::new(SimPiix4::new(PRIMARY_BASE));
        let mut data = SmbusData::new();

        let result = engine(&sim).access(0x55, Direction::Write, 0, Width::Quick, &mut data);
        assert_eq!(result, Err(SmbusError::NoSuchDevice));
        assert_eq!(sim.status(), 0);
    }

    #[test]
    fn test_block_round_trip() {
        let sim = Arc::new(SimPiix4::new(PRIMARY_BASE));
        sim.add_device(0x50, MemoryDevice::new());
        let eng = engine(&sim);

        for n in [1usize, 5, 32] {
            let payload: Vec<u8> = (0..n as u8).rev().collect();
            let mut data = SmbusData::from_block(&payload);
            eng.access(0x50, Direction::Write, 0x40, Width::BlockData, &mut data)
                .unwrap();

            let mut back = SmbusData::new();
            eng.access(0x50, Direction::Read, 0x40, Width::BlockData, &mut back)
                .unwrap();
            assert_eq!(back.len_byte() as usize, n);
            assert_eq!(back.block(), payload.as_slice());
        }
    }

    #[test]
    fn test_block_write_length_is_validated() {
        let sim = Arc::new(SimPiix4::new(PRIMARY_BASE));
        let mut data = SmbusData::new();

        let result = engine(&sim).access(0x50, Direction::Write, 0, Width::BlockData, &mut data);
        assert_eq!(result, Err(SmbusError::InvalidArgument));
        assert!(sim.writes().is_empty());
    }

    #[test]
    fn test_i2c_block_not_supported() {
        let sim = Arc::new(SimPiix4::new(PRIMARY_BASE));
        let mut data = SmbusData::new();

        let result = engine(&sim).access(0x50, Direction::Read, 0, Width::I2cBlockData, &mut data);
        assert_eq!(result.map_err(|e| e.status()), Err(-130));
    }
}
