//! Intel i801 host controller state machine
//!
//! Polling-mode port of the Linux `i2c-i801` transaction flow. Block
//! transfers always go byte by byte through BLKDAT.

use std::sync::Arc;
use std::time::Duration;

use spdflow_raw::controller::i801::{cmd, reg, AuxControl, HostControl, HostStatus};
use spdflow_raw::{Direction, PortIo, SmbusData, SmbusError, SmbusResult, Width, I2C_SMBUS_BLOCK_MAX};

use super::poll::{poll_status, PollPolicy};
use super::SmbusEngine;

pub struct I801 {
    port: Arc<dyn PortIo>,
    base: u16,
    poll: PollPolicy,
}

impl I801 {
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
            tracing::warn!("i801 0x{:04x}: register 0x{register:x} is past the I/O space", self.base);
            SmbusError::InvalidArgument
        })
    }

    fn inb(&self, register: u16) -> SmbusResult<u8> {
        Ok(self.port.read_port(self.port_of(register)?)?)
    }

    fn outb(&self, register: u16, value: u8) -> SmbusResult<()> {
        Ok(self.port.write_port(self.port_of(register)?, value)?)
    }

    fn status(&self) -> SmbusResult<HostStatus> {
        Ok(HostStatus::from_bits_retain(self.inb(reg::HSTSTS)?))
    }

    fn update_aux(&self, clear: AuxControl) -> SmbusResult<()> {
        let aux = AuxControl::from_bits_retain(self.inb(reg::AUXCTL)?);
        self.outb(reg::AUXCTL, aux.difference(clear).bits())
    }

    /// Make sure the host is idle and no stale flags are latched
    fn check_pre(&self) -> SmbusResult<()> {
        let status = self.status()?;
        if status.contains(HostStatus::HOST_BUSY) {
            tracing::debug!("i801 0x{:04x}: host busy before transaction", self.base);
            return Err(SmbusError::Busy);
        }

        let latent = status & HostStatus::STATUS_FLAGS;
        if !latent.is_empty() {
            tracing::debug!(
                "i801 0x{:04x}: clearing stale status 0x{:02x}",
                self.base,
                latent.bits()
            );
            self.outb(reg::HSTSTS, latent.bits())?;
            if !(self.status()? & HostStatus::STATUS_FLAGS).is_empty() {
                return Err(SmbusError::Busy);
            }
        }

        Ok(())
    }

    /// Wait for BUSY to clear and INTR or an error flag to be set.
    ///
    /// `None` means the wait timed out.
    fn wait_intr(&self) -> SmbusResult<Option<HostStatus>> {
        let polled = poll_status(
            &self.poll,
            || self.inb(reg::HSTSTS),
            |raw| {
                let status = HostStatus::from_bits_retain(raw);
                !status.contains(HostStatus::HOST_BUSY)
                    && status.intersects(HostStatus::ERROR_FLAGS | HostStatus::INTR)
            },
        )?;

        if polled.timed_out {
            return Ok(None);
        }
        Ok(Some(
            HostStatus::from_bits_retain(polled.status)
                & (HostStatus::ERROR_FLAGS | HostStatus::INTR),
        ))
    }

    /// Wait for BYTE_DONE or an error flag
    fn wait_byte_done(&self) -> SmbusResult<Option<HostStatus>> {
        let polled = poll_status(
            &self.poll,
            || self.inb(reg::HSTSTS),
            |raw| {
                HostStatus::from_bits_retain(raw)
                    .intersects(HostStatus::ERROR_FLAGS | HostStatus::BYTE_DONE)
            },
        )?;

        if polled.timed_out {
            return Ok(None);
        }
        Ok(Some(
            HostStatus::from_bits_retain(polled.status) & HostStatus::ERROR_FLAGS,
        ))
    }

    /// Translate the final status and leave the flags cleared
    fn check_post(&self, status: Option<HostStatus>) -> SmbusResult<()> {
        let Some(status) = status else {
            tracing::debug!("i801 0x{:04x}: transaction timeout, killing", self.base);
            let cnt = self.inb(reg::HSTCNT)?;
            self.outb(reg::HSTCNT, cnt | HostControl::KILL.bits())?;
            std::thread::sleep(Duration::from_millis(1));
            let cnt = self.inb(reg::HSTCNT)?;
            self.outb(reg::HSTCNT, cnt & !HostControl::KILL.bits())?;
            self.outb(reg::HSTSTS, HostStatus::STATUS_FLAGS.bits())?;
            return Err(SmbusError::Timeout);
        };

        // Later checks take precedence
        let mut result = Ok(());
        if status.contains(HostStatus::FAILED) {
            result = Err(SmbusError::Io);
        }
        if status.contains(HostStatus::DEV_ERR) {
            result = Err(SmbusError::NoSuchDevice);
        }
        if status.contains(HostStatus::BUS_ERR) {
            result = Err(SmbusError::TryAgain);
        }

        self.outb(reg::HSTSTS, status.bits())?;
        result
    }

    fn transaction(&self, xact: u8) -> SmbusResult<()> {
        let cnt = self.inb(reg::HSTCNT)?;
        self.outb(reg::HSTCNT, cnt & !HostControl::INTREN.bits())?;
        self.outb(reg::HSTCNT, xact | HostControl::START.bits())?;

        let status = self.wait_intr()?;
        self.check_post(status)
    }

    fn block_transaction(
        &self,
        data: &mut SmbusData,
        direction: Direction,
        width: Width,
    ) -> SmbusResult<()> {
        if direction == Direction::Write || width == Width::I2cBlockData {
            let len = data.len_byte().clamp(1, I2C_SMBUS_BLOCK_MAX as u8);
            data.set_len_byte(len);
        } else {
            data.set_len_byte(I2C_SMBUS_BLOCK_MAX as u8);
        }

        let read = direction == Direction::Read;
        let mut len = data.len_byte() as usize;

        if !read {
            self.outb(reg::HSTDAT0, len as u8)?;
            self.outb(reg::BLKDAT, data.block_byte(1))?;
        }

        let mut smbcmd = if width == Width::I2cBlockData && read {
            cmd::I2C_BLOCK_DATA
        } else {
            cmd::BLOCK_DATA
        };

        let mut i = 1;
        while i <= len {
            if i == len && read {
                smbcmd |= HostControl::LAST_BYTE.bits();
            }
            self.outb(reg::HSTCNT, smbcmd)?;

            if i == 1 {
                let cnt = self.inb(reg::HSTCNT)?;
                self.outb(reg::HSTCNT, cnt | HostControl::START.bits())?;
            }

            match self.wait_byte_done()? {
                Some(status) if status.is_empty() => {}
                status => return self.check_post(status),
            }

            if i == 1 && read && width != Width::I2cBlockData {
                len = self.inb(reg::HSTDAT0)? as usize;
                if !(1..=I2C_SMBUS_BLOCK_MAX).contains(&len) {
                    tracing::debug!("i801 0x{:04x}: illegal block length {}", self.base, len);
                    self.recover_block()?;
                    return Err(SmbusError::Protocol);
                }
                data.set_len_byte(len as u8);
            }

            if read {
                data.set_block_byte(i, self.inb(reg::BLKDAT)?);
            } else if i < len {
                self.outb(reg::BLKDAT, data.block_byte(i + 1))?;
            }

            // BLKDAT ready
            self.outb(reg::HSTSTS, HostStatus::BYTE_DONE.bits())?;
            i += 1;
        }

        let status = self.wait_intr()?;
        self.check_post(status)
    }

    /// Drain a block read whose length byte was out of range
    fn recover_block(&self) -> SmbusResult<()> {
        for _ in 0..=self.poll.max_retries {
            if !self.status()?.contains(HostStatus::HOST_BUSY) {
                break;
            }
            self.outb(reg::HSTSTS, HostStatus::BYTE_DONE.bits())?;
        }
        self.outb(reg::HSTSTS, HostStatus::INTR.bits())
    }
}

impl SmbusEngine for I801 {
    fn family(&self) -> &'static str {
        "i801"
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
        self.check_pre()?;

        let write = direction == Direction::Write;
        self.outb(reg::HSTADD, direction.address_byte(address))?;

        let xact = match width {
            Width::Quick => Some(cmd::QUICK),
            Width::Byte => {
                if write {
                    self.outb(reg::HSTCMD, command)?;
                }
                Some(cmd::BYTE)
            }
            Width::ByteData => {
                self.outb(reg::HSTCMD, command)?;
                if write {
                    self.outb(reg::HSTDAT0, data.byte())?;
                }
                Some(cmd::BYTE_DATA)
            }
            Width::WordData => {
                self.outb(reg::HSTCMD, command)?;
                if write {
                    let [low, high] = data.word().to_le_bytes();
                    self.outb(reg::HSTDAT0, low)?;
                    self.outb(reg::HSTDAT1, high)?;
                }
                Some(cmd::WORD_DATA)
            }
            Width::BlockData => {
                self.outb(reg::HSTCMD, command)?;
                None
            }
            Width::I2cBlockData => {
                // DATA1 carries the command for I2C block reads
                if write {
                    self.outb(reg::HSTCMD, command)?;
                } else {
                    self.outb(reg::HSTDAT1, command)?;
                }
                None
            }
        };

        self.update_aux(AuxControl::CRC)?;

        let result = match xact {
            Some(xact) => self.transaction(xact),
            None => self.block_transaction(data, direction, width),
        };

        // PEC and E32B must not survive the transaction
        let restored = self.update_aux(AuxControl::CRC | AuxControl::E32B);
        result?;
        restored?;

        if write || xact.is_none() {
            return Ok(());
        }

        match xact {
            Some(cmd::BYTE) | Some(cmd::BYTE_DATA) => data.set_byte(self.inb(reg::HSTDAT0)?),
            Some(cmd::WORD_DATA) => {
                let low = self.inb(reg::HSTDAT0)?;
                let high = self.inb(reg::HSTDAT1)?;
                data.set_word(u16::from_le_bytes([low, high]));
            }
            _ => {}
        }

        Ok(())
    }
}
