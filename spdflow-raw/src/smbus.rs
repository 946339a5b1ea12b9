//! SMBus protocol vocabulary shared by every host controller

use std::ops::RangeInclusive;

/// Longest SMBus block payload
pub const I2C_SMBUS_BLOCK_MAX: usize = 32;

/// Length prefix + block payload + PEC slack
pub const SMBUS_DATA_LEN: usize = I2C_SMBUS_BLOCK_MAX + 2;

/// Bus addresses that can carry a memory module SPD EEPROM
pub const SPD_ADDRESSES: RangeInclusive<u8> = 0x50..=0x57;

/// Transfer direction, encoded as the R/W bit of the address byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Direction {
    Write = 0,
    Read = 1,
}

impl Direction {
    /// Address byte as sent on the wire
    pub const fn address_byte(self, address: u8) -> u8 {
        ((address & 0x7F) << 1) | self as u8
    }
}

/// SMBus transaction width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    Quick,
    Byte,
    ByteData,
    WordData,
    BlockData,
    I2cBlockData,
}

impl Width {
    pub const fn is_block(self) -> bool {
        matches!(self, Width::BlockData | Width::I2cBlockData)
    }
}

/// Fixed-capacity transaction payload.
///
/// Layout follows the Linux `i2c_smbus_data` union: a byte lives at offset 0,
/// a word is little-endian at offsets 0..2, and a block carries its length at
/// offset 0 followed by up to 32 data bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmbusData([u8; SMBUS_DATA_LEN]);

impl Default for SmbusData {
    fn default() -> Self {
        Self([0; SMBUS_DATA_LEN])
    }
}

impl SmbusData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_byte(value: u8) -> Self {
        let mut data = Self::default();
        data.set_byte(value);
        data
    }

    pub fn from_word(value: u16) -> Self {
        let mut data = Self::default();
        data.set_word(value);
        data
    }

    /// Build a block payload; anything past 32 bytes is dropped
    pub fn from_block(bytes: &[u8]) -> Self {
        let mut data = Self::default();
        data.set_block(bytes);
        data
    }

    pub fn byte(&self) -> u8 {
        self.0[0]
    }

    pub fn set_byte(&mut self, value: u8) {
        self.0[0] = value;
    }

    pub fn word(&self) -> u16 {
        u16::from_le_bytes([self.0[0], self.0[1]])
    }

    pub fn set_word(&mut self, value: u16) {
        self.0[..2].copy_from_slice(&value.to_le_bytes());
    }

    /// Raw length prefix, unclamped
    pub fn len_byte(&self) -> u8 {
        self.0[0]
    }

    pub fn set_len_byte(&mut self, len: u8) {
        self.0[0] = len;
    }

    /// Block length clamped to the protocol maximum
    pub fn block_len(&self) -> usize {
        (self.0[0] as usize).min(I2C_SMBUS_BLOCK_MAX)
    }

    pub fn block(&self) -> &[u8] {
        &self.0[1..=self.block_len()]
    }

    pub fn set_block(&mut self, bytes: &[u8]) {
        let len = bytes.len().min(I2C_SMBUS_BLOCK_MAX);
        self.0[0] = len as u8;
        self.0[1..=len].copy_from_slice(&bytes[..len]);
    }

    /// Block byte at 1-based position `index`, as used by byte-by-byte engines
    pub fn block_byte(&self, index: usize) -> u8 {
        self.0[index.min(SMBUS_DATA_LEN - 1)]
    }

    pub fn set_block_byte(&mut self, index: usize, value: u8) {
        self.0[index.min(SMBUS_DATA_LEN - 1)] = value;
    }

    pub fn as_bytes(&self) -> &[u8; SMBUS_DATA_LEN] {
        &self.0
    }

    /// Raw buffer, for handing to the kernel as `union i2c_smbus_data`
    pub fn as_bytes_mut(&mut self) -> &mut [u8; SMBUS_DATA_LEN] {
        &mut self.0
    }
}
