//! Raw x86 I/O port access
//!
//! SMBus host controllers are programmed through legacy I/O ports. On Linux
//! these are reachable through `/dev/port`, where the file offset is the port
//! number. The one-shot helpers here open the device for every call; the
//! agent keeps a long-lived handle instead.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;

use crate::status::SmbusError;

pub const DEV_PORT: &str = "/dev/port";

pub type Result<T> = std::result::Result<T, PortError>;

/// Errors that can occur during port I/O
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Failed to open {path}: {source}")]
    OpenFailed {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to read port 0x{port:04X}: {source}")]
    ReadFailed { port: u16, source: std::io::Error },

    #[error("Failed to write port 0x{port:04X}: {source}")]
    WriteFailed { port: u16, source: std::io::Error },

    #[error("Failed to seek to port 0x{port:04X}: {source}")]
    SeekFailed { port: u16, source: std::io::Error },
}

/// A byte-wide I/O port accessor.
///
/// Implementations are trusted synchronous primitives; the SMBus engine
/// treats any failure as an I/O error of the running transaction.
pub trait PortIo: Send + Sync {
    fn read_port(&self, port: u16) -> Result<u8>;

    fn write_port(&self, port: u16, value: u8) -> Result<()>;
}

impl From<PortError> for SmbusError {
    fn from(_: PortError) -> Self {
        SmbusError::Io
    }
}

fn open(write: bool) -> Result<File> {
    let mut options = OpenOptions::new();
    options.read(true);
    if write {
        options.write(true).custom_flags(libc::O_SYNC);
    }
    options.open(DEV_PORT).map_err(|e| PortError::OpenFailed {
        path: DEV_PORT.to_string(),
        source: e,
    })
}

/// Read one byte from an I/O port
///
/// # Errors
///
/// Returns an error if `/dev/port` cannot be opened (requires root or
/// CAP_SYS_RAWIO) or the port cannot be read.
pub fn read_port(port: u16) -> Result<u8> {
    let mut file = open(false)?;
    file.seek(SeekFrom::Start(port as u64))
        .map_err(|e| PortError::SeekFailed { port, source: e })?;

    let mut buffer = [0u8; 1];
    file.read_exact(&mut buffer)
        .map_err(|e| PortError::ReadFailed { port, source: e })?;

    Ok(buffer[0])
}

/// Write one byte to an I/O port
///
/// # Safety
///
/// Writing arbitrary ports can hang the machine. Only use offsets from the
/// controller register maps in this crate.
pub fn write_port(port: u16, value: u8) -> Result<()> {
    let mut file = open(true)?;
    file.seek(SeekFrom::Start(port as u64))
        .map_err(|e| PortError::SeekFailed { port, source: e })?;

    file.write_all(&[value])
        .map_err(|e| PortError::WriteFailed { port, source: e })?;

    Ok(())
}
