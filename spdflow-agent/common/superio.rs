use std::sync::Arc;

use spdflow_raw::controller::superio::{self, reg};
use spdflow_raw::PortIo;

use crate::error::{Result, SpdflowError};

/// Index/data access to a Super-I/O chip's configuration space
pub struct SuperIo {
    port: Arc<dyn PortIo>,
    index: u16,
}

impl SuperIo {
    pub fn new(port: Arc<dyn PortIo>, index: u16) -> Self {
        Self { port, index }
    }

    /// Unlock configuration mode; released when the guard drops
    pub fn enter(&self) -> Result<SuperIoGuard<'_>> {
        self.port.write_port(self.index, superio::ENTER_KEY)?;
        self.port.write_port(self.index, superio::ENTER_KEY)?;
        Ok(SuperIoGuard { sio: self })
    }

    pub fn read_byte(&self, register: u8) -> Result<u8> {
        self.port.write_port(self.index, register)?;
        Ok(self.port.read_port(self.index + 1)?)
    }

    pub fn write_byte(&self, register: u8, value: u8) -> Result<()> {
        self.port.write_port(self.index, register)?;
        Ok(self.port.write_port(self.index + 1, value)?)
    }

    /// Big-endian register pair at `register`, `register + 1`
    pub fn read_word(&self, register: u8) -> Result<u16> {
        let high = self.read_byte(register)?;
        let low = self.read_byte(register + 1)?;
        Ok(u16::from_be_bytes([high, low]))
    }

    /// Masked chip ID
    pub fn chip_id(&self) -> Result<u16> {
        Ok(self.read_word(reg::DEVID)? & superio::ID_MASK)
    }

    /// SMBus master base address of a Nuvoton chip
    pub fn smbus_base(&self) -> Result<u16> {
        self.write_byte(reg::LOGDEV, superio::LOGDEV_SMBUS)?;
        let base = self.read_word(reg::SMBA)?;
        if base == 0 || base == 0xFFFF {
            return Err(SpdflowError::SuperIoError(format!(
                "SMBus logical device reports base 0x{base:04X}"
            )));
        }
        Ok(base)
    }
}

pub struct SuperIoGuard<'a> {
    sio: &'a SuperIo,
}

impl std::ops::Deref for SuperIoGuard<'_> {
    type Target = SuperIo;

    fn deref(&self) -> &SuperIo {
        self.sio
    }
}

impl Drop for SuperIoGuard<'_> {
    fn drop(&mut self) {
        let _ = self.sio.port.write_port(self.sio.index, superio::EXIT_KEY);
    }
}
