//! # spdflow-raw
//!
//! Register definitions for SMBus host controllers and the DDR4/DDR5 SPD
//! devices hanging off them.
//!
//! This crate holds the bit-level facts: controller register offsets and
//! status bits for the Intel i801, AMD PIIX4 and Nuvoton NCT6775 families,
//! the DDR4 EE1004/TSE2004 and DDR5 SPD5118 register maps, the SMBus status
//! code taxonomy, the raw I/O-port primitive through `/dev/port` and the
//! Linux i2c-dev ioctl interface.
//! Transaction state machines live in `spdflow-agent`.
//!
//! ## Usage
//!
//! ```ignore
//! use spdflow_raw::controller::i801;
//! use spdflow_raw::{PortIo, RegisterLayout};
//!
//! let status = i801::HostStatus::from_bits_retain(port.read_port(base + i801::reg::HSTSTS)?);
//! if status.contains(i801::HostStatus::HOST_BUSY) {
//!     return Err(SmbusError::Busy);
//! }
//! ```

pub mod controller;
pub mod i2cdev;
pub mod port;
pub mod register;
pub mod smbus;
pub mod spd;
pub mod status;

// Re-export for convenience
pub use port::{read_port, write_port, PortError, PortIo};
pub use register::{Register, RegisterLayout};
pub use smbus::{Direction, SmbusData, Width, I2C_SMBUS_BLOCK_MAX, SPD_ADDRESSES};
pub use status::{SmbusError, SmbusResult};
