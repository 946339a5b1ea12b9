//! Nuvoton Super-I/O SMBus master in manual mode

use std::sync::Arc;

use spdflow_raw::controller::nct6775::{
    cmd, reg, HostError, HostStatus, FIFO_CHUNK, MANUAL_START, SOFT_RESET,
};
use spdflow_raw::{Direction, PortIo, SmbusData, SmbusError, SmbusResult, Width, I2C_SMBUS_BLOCK_MAX};

use super::poll::{poll_status, PollPolicy};
use super::SmbusEngine;

pub struct Nct6775 {
    port: Arc<dyn PortIo>,
    base: u16,
    poll: PollPolicy,
}

impl Nct6775 {
    pub fn new(port: Arc<dyn PortIo>, base: u16) -> Self {
        Self {
            port,
            base,
            poll: PollPolicy::SUPERIO,
        }
    }

    pub fn with_poll_policy(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    fn port_of(&self, register: u16) -> SmbusResult<u16> {
        self.base.checked_add(register).ok_or_else(|| {
            tracing::warn!("nct6775 0x{:04x}: register 0x{register:x} is past the I/O space", self.base);
            SmbusError::InvalidArgument
        })
    }

    fn inb(&self, register: u16) -> SmbusResult<u8> {
        Ok(self.port.read_port(self.port_of(register)?)?)
    }

    fn outb(&self, register: u16, value: u8) -> SmbusResult<()> {
        Ok(self.port.write_port(self.port_of(register)?, value)?)
    }

    fn wait_for(&self, done: impl Fn(HostStatus) -> bool) -> SmbusResult<()> {
        let polled = poll_status(
            &self.poll,
            || self.inb(reg::HSTSTS),
            |raw| done(HostStatus::from_bits_retain(raw)),
        )?;
        if polled.timed_out {
            tracing::debug!("nct6775 0x{:04x}: manual mode timeout", self.base);
            return Err(SmbusError::Timeout);
        }
        Ok(())
    }

    fn push_fifo(&self, bytes: &[u8]) -> SmbusResult<()> {
        for &byte in bytes {
            self.outb(reg::HSTDAT, byte)?;
        }
        Ok(())
    }
}

impl SmbusEngine for Nct6775 {
    fn family(&self) -> &'static str {
        "nct6775"
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
        let write = direction == Direction::Write;
        match width {
            Width::I2cBlockData => return Err(SmbusError::OpNotSupported),
            Width::BlockData if !write => return Err(SmbusError::OpNotSupported),
            Width::BlockData => {
                let len = data.len_byte() as usize;
                if !(1..=I2C_SMBUS_BLOCK_MAX).contains(&len) {
                    return Err(SmbusError::InvalidArgument);
                }
            }
            _ => {}
        }

        let status = HostStatus::from_bits_retain(self.inb(reg::HSTSTS)?);
        if status.contains(HostStatus::MANUAL_ACTIVE) {
            tracing::debug!("nct6775 0x{:04x}: manual mode still active", self.base);
            return Err(SmbusError::Busy);
        }

        self.outb(reg::HSTADD, SOFT_RESET)?;
        self.outb(reg::HSTADD, direction.address_byte(address))?;

        // bytes still to be fed to the FIFO after the transaction starts
        let mut pending: &[u8] = &[];

        match width {
            Width::Quick => {}
            Width::Byte | Width::ByteData => {
                self.outb(reg::HSTIDX, command)?;
                if write {
                    self.outb(reg::HSTDAT, data.byte())?;
                    self.outb(reg::HSTCMD, cmd::WRITE_BYTE)?;
                } else {
                    self.outb(reg::HSTCMD, cmd::READ_BYTE)?;
                }
            }
            Width::WordData => {
                self.outb(reg::HSTIDX, command)?;
                if write {
                    self.push_fifo(&data.word().to_le_bytes())?;
                    self.outb(reg::HSTCMD, cmd::WRITE_WORD)?;
                } else {
                    self.outb(reg::HSTCMD, cmd::READ_WORD)?;
                }
            }
            Width::BlockData => {
                self.outb(reg::HSTIDX, command)?;
                let block = data.block();
                self.outb(reg::BLKSZ, block.len() as u8)?;
                let (first, rest) = block.split_at(block.len().min(FIFO_CHUNK));
                self.push_fifo(first)?;
                pending = rest;
                self.outb(reg::HSTCMD, cmd::WRITE_BLOCK)?;
            }
            Width::I2cBlockData => return Err(SmbusError::OpNotSupported),
        }

        self.outb(reg::HSTCTL, MANUAL_START)?;

        for chunk in pending.chunks(FIFO_CHUNK) {
            self.wait_for(|status| status.contains(HostStatus::FIFO_EMPTY))?;
            self.push_fifo(chunk)?;
        }

        self.wait_for(|status| !status.contains(HostStatus::MANUAL_ACTIVE))?;

        if HostError::from_bits_retain(self.inb(reg::HSTERR)?).contains(HostError::NO_ACK) {
            return Err(SmbusError::Protocol);
        }

        if write || width == Width::Quick {
            return Ok(());
        }

        match width {
            Width::Byte | Width::ByteData => data.set_byte(self.inb(reg::HSTDAT)?),
            Width::WordData => {
                let low = self.inb(reg::HSTDAT)?;
                let high = self.inb(reg::HSTDAT)?;
                data.set_word(u16::from_le_bytes([low, high]));
            }
            _ => {}
        }

        Ok(())
    }
}
