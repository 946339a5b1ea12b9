use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::AsRawFd;

use spdflow_raw::port::{self, PortError, PortIo, DEV_PORT};

use crate::error::Result;

/// Long-lived `/dev/port` handle shared by every controller on the host
pub struct DevPort {
    file: parking_lot::Mutex<File>,
}

impl DevPort {
    pub fn open() -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(DEV_PORT)
            .map_err(|e| PortError::OpenFailed {
                path: DEV_PORT.to_string(),
                source: e,
            })?;

        tracing::info!("Opened {} as handle {}", DEV_PORT, file.as_raw_fd());

        Ok(Self {
            file: parking_lot::Mutex::new(file),
        })
    }
}

impl PortIo for DevPort {
    fn read_port(&self, port: u16) -> port::Result<u8> {
        let mut file = self.file.lock();

        file.seek(SeekFrom::Start(port as u64))
            .map_err(|e| PortError::SeekFailed { port, source: e })?;

        let mut buffer = [0u8; 1];
        file.read_exact(&mut buffer)
            .map_err(|e| PortError::ReadFailed { port, source: e })?;

        tracing::trace!("Port read: 0x{:04x} = 0x{:02x}", port, buffer[0]);
        Ok(buffer[0])
    }

    fn write_port(&self, port: u16, value: u8) -> port::Result<()> {
        let mut file = self.file.lock();

        file.seek(SeekFrom::Start(port as u64))
            .map_err(|e| PortError::SeekFailed { port, source: e })?;

        file.write_all(&[value])
            .map_err(|e| PortError::WriteFailed { port, source: e })?;

        tracing::trace!("Port write: 0x{:04x} <- 0x{:02x}", port, value);
        Ok(())
    }
}

/// Check that `/dev/port` exists and can be opened
pub fn check_access() -> Result<()> {
    std::fs::metadata(DEV_PORT)?;
    OpenOptions::new().read(true).write(true).open(DEV_PORT)?;
    Ok(())
}
