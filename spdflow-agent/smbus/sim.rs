//! Register-level simulations of the host controllers, used by unit tests

use std::collections::HashMap;

use parking_lot::Mutex;
use spdflow_raw::controller::{i801, nct6775, piix4};
use spdflow_raw::port;
use spdflow_raw::PortIo;

/// Fault injected into a simulated host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimMode {
    Normal,
    /// The busy bit never clears
    StuckBusy,
    /// Transactions start but never finish
    NeverComplete,
    /// Every transaction ends with these status/error bits
    FailWith(u8),
}

/// A 256-byte register file plus SMBus block buffers keyed by command
#[derive(Debug, Clone)]
pub struct MemoryDevice {
    regs: [u8; 256],
    blocks: HashMap<u8, Vec<u8>>,
    pointer: u8,
}

impl MemoryDevice {
    pub fn new() -> Self {
        Self {
            regs: [0; 256],
            blocks: HashMap::new(),
            pointer: 0,
        }
    }

    pub fn with_bytes(bytes: &[u8]) -> Self {
        let mut device = Self::new();
        let n = bytes.len().min(256);
        device.regs[..n].copy_from_slice(&bytes[..n]);
        device
    }

    pub fn set_block(&mut self, command: u8, bytes: Vec<u8>) {
        self.blocks.insert(command, bytes);
    }

    pub fn reg(&self, index: u8) -> u8 {
        self.regs[index as usize]
    }

    fn receive_byte(&mut self) -> u8 {
        let value = self.regs[self.pointer as usize];
        self.pointer = self.pointer.wrapping_add(1);
        value
    }

    fn send_byte(&mut self, value: u8) {
        self.pointer = value;
    }

    fn read_byte_data(&self, command: u8) -> u8 {
        self.regs[command as usize]
    }

    fn write_byte_data(&mut self, command: u8, value: u8) {
        self.regs[command as usize] = value;
    }

    fn read_word_data(&self, command: u8) -> [u8; 2] {
        [
            self.regs[command as usize],
            self.regs[command.wrapping_add(1) as usize],
        ]
    }

    fn write_word_data(&mut self, command: u8, value: [u8; 2]) {
        self.regs[command as usize] = value[0];
        self.regs[command.wrapping_add(1) as usize] = value[1];
    }

    fn read_block(&self, command: u8) -> Vec<u8> {
        self.blocks.get(&command).cloned().unwrap_or_default()
    }

    fn write_block(&mut self, command: u8, bytes: &[u8]) {
        self.blocks.insert(command, bytes.to_vec());
    }

    fn read_i2c_block(&self, command: u8) -> Vec<u8> {
        self.regs[command as usize..].to_vec()
    }
}

impl Default for MemoryDevice {
    fn default() -> Self {
        Self::new()
    }
}

/// State shared by every simulated host
struct Common {
    base: u16,
    regs: [u8; 16],
    status: u8,
    mode: SimMode,
    devices: HashMap<u8, MemoryDevice>,
    writes: Vec<(u16, u8)>,
}

impl Common {
    fn new(base: u16) -> Self {
        Self {
            base,
            regs: [0; 16],
            status: 0,
            mode: SimMode::Normal,
            devices: HashMap::new(),
            writes: Vec::new(),
        }
    }

    fn offset(&self, port: u16) -> usize {
        (port.wrapping_sub(self.base) & 0xF) as usize
    }
}

macro_rules! sim_accessors {
    ($sim:ident) => {
        impl $sim {
            pub fn set_mode(&self, mode: SimMode) {
                self.state.lock().common.mode = mode;
            }

            pub fn add_device(&self, address: u8, device: MemoryDevice) {
                self.state.lock().common.devices.insert(address, device);
            }

            pub fn device(&self, address: u8) -> Option<MemoryDevice> {
                self.state.lock().common.devices.get(&address).cloned()
            }

            /// Set status bits as if left over from an earlier transaction
            pub fn latch_status(&self, bits: u8) {
                self.state.lock().common.status |= bits;
            }

            pub fn writes(&self) -> Vec<(u16, u8)> {
                self.state.lock().common.writes.clone()
            }

            pub fn status(&self) -> u8 {
                self.state.lock().common.status
            }

            /// Set a register without recording a write
            pub fn poke(&self, port: u16, value: u8) {
                let mut state = self.state.lock();
                let offset = state.common.offset(port);
                state.common.regs[offset] = value;
            }

            pub fn peek(&self, port: u16) -> u8 {
                let state = self.state.lock();
                state.common.regs[state.common.offset(port)]
            }
        }
    };
}

// ---------------------------------------------------------------------------
// i801
// ---------------------------------------------------------------------------

struct I801Block {
    read: bool,
    address: u8,
    command: u8,
    bytes: Vec<u8>,
    position: usize,
    expected: usize,
}

struct I801State {
    common: Common,
    block: Option<I801Block>,
}

pub struct SimI801 {
    state: Mutex<I801State>,
}

sim_accessors!(SimI801);

impl SimI801 {
    pub fn new(base: u16) -> Self {
        Self {
            state: Mutex::new(I801State {
                common: Common::new(base),
                block: None,
            }),
        }
    }
}

impl I801State {
    fn start(&mut self, opcode: u8) {
        use i801::{cmd, reg, HostStatus};

        match self.common.mode {
            SimMode::NeverComplete => {
                self.common.status |= HostStatus::HOST_BUSY.bits();
                return;
            }
            SimMode::FailWith(bits) => {
                self.common.status |= bits;
                return;
            }
            _ => {}
        }

        let regs = &mut self.common.regs;
        let address = regs[reg::HSTADD as usize] >> 1;
        let read = regs[reg::HSTADD as usize] & 1 == 1;
        let command = regs[reg::HSTCMD as usize];

        let Some(device) = self.common.devices.get_mut(&address) else {
            self.common.status |= HostStatus::DEV_ERR.bits();
            return;
        };

        match opcode {
            cmd::QUICK => {}
            cmd::BYTE if read => regs[reg::HSTDAT0 as usize] = device.receive_byte(),
            cmd::BYTE => device.send_byte(command),
            cmd::BYTE_DATA if read => regs[reg::HSTDAT0 as usize] = device.read_byte_data(command),
            cmd::BYTE_DATA => device.write_byte_data(command, regs[reg::HSTDAT0 as usize]),
            cmd::WORD_DATA if read => {
                let [low, high] = device.read_word_data(command);
                regs[reg::HSTDAT0 as usize] = low;
                regs[reg::HSTDAT1 as usize] = high;
            }
            cmd::WORD_DATA => device.write_word_data(
                command,
                [regs[reg::HSTDAT0 as usize], regs[reg::HSTDAT1 as usize]],
            ),
            cmd::BLOCK_DATA | cmd::I2C_BLOCK_DATA => {
                let bytes = if !read {
                    vec![regs[reg::BLKDAT as usize]]
                } else if opcode == cmd::I2C_BLOCK_DATA {
                    device.read_i2c_block(regs[reg::HSTDAT1 as usize])
                } else {
                    let bytes = device.read_block(command);
                    regs[reg::HSTDAT0 as usize] = bytes.len() as u8;
                    bytes
                };
                if read {
                    regs[reg::BLKDAT as usize] = bytes.first().copied().unwrap_or(0);
                }
                self.block = Some(I801Block {
                    read,
                    address,
                    command,
                    expected: regs[reg::HSTDAT0 as usize] as usize,
                    bytes,
                    position: 0,
                });
                self.common.status |= HostStatus::BYTE_DONE.bits();
                return;
            }
            _ => {}
        }

        self.common.status |= HostStatus::INTR.bits();
    }

    /// Software cleared BYTE_DONE: move the block transfer one byte forward
    fn advance_block(&mut self) {
        use i801::{reg, HostControl, HostStatus};

        let Some(block) = self.block.as_mut() else {
            return;
        };
        let regs = &mut self.common.regs;

        let finished = if block.read {
            block.position += 1;
            let last = regs[reg::HSTCNT as usize] & HostControl::LAST_BYTE.bits() != 0;
            if last || block.position >= block.bytes.len() {
                true
            } else {
                regs[reg::BLKDAT as usize] = block.bytes[block.position];
                false
            }
        } else if block.bytes.len() >= block.expected {
            if let Some(device) = self.common.devices.get_mut(&block.address) {
                device.write_block(block.command, &block.bytes);
            }
            true
        } else {
            block.bytes.push(regs[reg::BLKDAT as usize]);
            false
        };

        if finished {
            self.block = None;
            self.common.status |= HostStatus::INTR.bits();
        } else {
            self.common.status |= HostStatus::BYTE_DONE.bits();
        }
    }
}

impl PortIo for SimI801 {
    fn read_port(&self, port: u16) -> port::Result<u8> {
        use i801::{reg, HostControl, HostStatus};

        let state = self.state.lock();
        let offset = state.common.offset(port);
        Ok(match offset as u16 {
            reg::HSTSTS if state.common.mode == SimMode::StuckBusy => {
                state.common.status | HostStatus::HOST_BUSY.bits()
            }
            reg::HSTSTS => state.common.status,
            reg::HSTCNT => state.common.regs[offset] & !HostControl::START.bits(),
            _ => state.common.regs[offset],
        })
    }

    fn write_port(&self, port: u16, value: u8) -> port::Result<()> {
        use i801::{reg, HostControl, HostStatus};

        let mut state = self.state.lock();
        state.common.writes.push((port, value));
        let offset = state.common.offset(port);

        match offset as u16 {
            reg::HSTSTS => {
                state.common.status &= !value;
                if value & HostStatus::BYTE_DONE.bits() != 0 {
                    state.advance_block();
                }
            }
            reg::HSTCNT => {
                state.common.regs[offset] = value & !HostControl::START.bits();
                if value & HostControl::KILL.bits() != 0 {
                    state.block = None;
                    state.common.status &= !HostStatus::HOST_BUSY.bits();
                    state.common.status |= HostStatus::FAILED.bits();
                } else if value & HostControl::START.bits() != 0 {
                    state.start(value & 0x1C);
                }
            }
            _ => state.common.regs[offset] = value,
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PIIX4
// ---------------------------------------------------------------------------

struct Piix4State {
    common: Common,
    buffer: [u8; 32],
    index: usize,
}

pub struct SimPiix4 {
    state: Mutex<Piix4State>,
}

sim_accessors!(SimPiix4);

impl SimPiix4 {
    pub fn new(base: u16) -> Self {
        Self {
            state: Mutex::new(Piix4State {
                common: Common::new(base),
                buffer: [0; 32],
                index: 0,
            }),
        }
    }
}

impl Piix4State {
    fn start(&mut self, opcode: u8) {
        use piix4::{cmd, reg, HostStatus};

        match self.common.mode {
            SimMode::NeverComplete => {
                self.common.status |= HostStatus::HOST_BUSY.bits();
                return;
            }
            SimMode::FailWith(bits) => {
                self.common.status |= bits | HostStatus::INTR.bits();
                return;
            }
            _ => {}
        }

        let regs = &mut self.common.regs;
        let address = regs[reg::HSTADD as usize] >> 1;
        let read = regs[reg::HSTADD as usize] & 1 == 1;
        let command = regs[reg::HSTCMD as usize];

        let Some(device) = self.common.devices.get_mut(&address) else {
            self.common.status |= (HostStatus::DEV_ERR | HostStatus::INTR).bits();
            return;
        };

        match opcode {
            cmd::QUICK => {}
            cmd::BYTE if read => regs[reg::HSTDAT0 as usize] = device.receive_byte(),
            cmd::BYTE => device.send_byte(command),
            cmd::BYTE_DATA if read => regs[reg::HSTDAT0 as usize] = device.read_byte_data(command),
            cmd::BYTE_DATA => device.write_byte_data(command, regs[reg::HSTDAT0 as usize]),
            cmd::WORD_DATA if read => {
                let [low, high] = device.read_word_data(command);
                regs[reg::HSTDAT0 as usize] = low;
                regs[reg::HSTDAT1 as usize] = high;
            }
            cmd::WORD_DATA => device.write_word_data(
                command,
                [regs[reg::HSTDAT0 as usize], regs[reg::HSTDAT1 as usize]],
            ),
            cmd::BLOCK_DATA if read => {
                let bytes = device.read_block(command);
                let n = bytes.len().min(32);
                self.buffer[..n].copy_from_slice(&bytes[..n]);
                regs[reg::HSTDAT0 as usize] = bytes.len() as u8;
            }
            cmd::BLOCK_DATA => {
                let n = (regs[reg::HSTDAT0 as usize] as usize).min(32);
                device.write_block(command, &self.buffer[..n]);
            }
            _ => {}
        }

        self.common.status |= HostStatus::INTR.bits();
    }
}

impl PortIo for SimPiix4 {
    fn read_port(&self, port: u16) -> port::Result<u8> {
        use piix4::{reg, HostStatus, HSTCNT_START};

        let mut state = self.state.lock();
        let offset = state.common.offset(port);
        Ok(match offset as u16 {
            reg::HSTSTS if state.common.mode == SimMode::StuckBusy => {
                state.common.status | HostStatus::HOST_BUSY.bits()
            }
            reg::HSTSTS => state.common.status,
            reg::HSTCNT => {
                state.index = 0;
                state.common.regs[offset] & !HSTCNT_START
            }
            reg::BLKDAT => {
                let value = state.buffer[state.index % 32];
                state.index += 1;
                value
            }
            _ => state.common.regs[offset],
        })
    }

    fn write_port(&self, port: u16, value: u8) -> port::Result<()> {
        use piix4::{reg, HSTCNT_SIZE_MASK, HSTCNT_START};

        let mut state = self.state.lock();
        state.common.writes.push((port, value));
        let offset = state.common.offset(port);

        match offset as u16 {
            reg::HSTSTS => state.common.status &= !value,
            reg::HSTCNT => {
                state.common.regs[offset] = value & !HSTCNT_START;
                if value & HSTCNT_START != 0 {
                    state.start(value & HSTCNT_SIZE_MASK);
                }
            }
            reg::BLKDAT => {
                let index = state.index % 32;
                state.buffer[index] = value;
                state.index += 1;
            }
            _ => state.common.regs[offset] = value,
        }

        Ok(())
    }
}

// ---------------------------------------------------------------------------
// NCT6775
// ---------------------------------------------------------------------------

struct NctState {
    common: Common,
    command: Option<u8>,
    fifo: Vec<u8>,
    active: bool,
    error: u8,
    /// Remaining bytes of a block write in progress
    block_remaining: usize,
    block_bytes: Vec<u8>,
}

pub struct SimNct6775 {
    state: Mutex<NctState>,
}

sim_accessors!(SimNct6775);

impl SimNct6775 {
    pub fn new(base: u16) -> Self {
        Self {
            state: Mutex::new(NctState {
                common: Common::new(base),
                command: None,
                fifo: Vec::new(),
                active: false,
                error: 0,
                block_remaining: 0,
                block_bytes: Vec::new(),
            }),
        }
    }
}

impl NctState {
    fn reset(&mut self) {
        self.command = None;
        self.fifo.clear();
        self.error = 0;
        self.block_remaining = 0;
        self.block_bytes.clear();
    }

    fn start(&mut self) {
        use nct6775::{cmd, reg, HostError};

        match self.common.mode {
            SimMode::NeverComplete => {
                self.active = true;
                return;
            }
            SimMode::FailWith(bits) => {
                self.error = bits;
                return;
            }
            _ => {}
        }

        let regs = &self.common.regs;
        let address = regs[reg::HSTADD as usize] >> 1;
        let index = regs[reg::HSTIDX as usize];
        let size = regs[reg::BLKSZ as usize] as usize;

        let Some(device) = self.common.devices.get_mut(&address) else {
            self.error = HostError::NO_ACK.bits();
            return;
        };

        match self.command {
            None => {}
            Some(cmd::READ_BYTE) => self.fifo = vec![device.read_byte_data(index)],
            Some(cmd::READ_WORD) => self.fifo = device.read_word_data(index).to_vec(),
            Some(cmd::WRITE_BYTE) => {
                let value = self.fifo.first().copied().unwrap_or(0);
                device.write_byte_data(index, value);
                self.fifo.clear();
            }
            Some(cmd::WRITE_WORD) => {
                let low = self.fifo.first().copied().unwrap_or(0);
                let high = self.fifo.get(1).copied().unwrap_or(0);
                device.write_word_data(index, [low, high]);
                self.fifo.clear();
            }
            Some(cmd::WRITE_BLOCK) => {
                self.block_bytes = std::mem::take(&mut self.fifo);
                self.block_remaining = size.saturating_sub(self.block_bytes.len());
                if self.block_remaining > 0 {
                    self.active = true;
                    return;
                }
                device.write_block(index, &self.block_bytes);
            }
            Some(_) => self.error = HostError::NO_ACK.bits(),
        }
    }

    /// FIFO refill during a block write
    fn push_block_byte(&mut self, value: u8) {
        use nct6775::reg;

        self.block_bytes.push(value);
        self.block_remaining -= 1;
        if self.block_remaining == 0 {
            let address = self.common.regs[reg::HSTADD as usize] >> 1;
            let index = self.common.regs[reg::HSTIDX as usize];
            if let Some(device) = self.common.devices.get_mut(&address) {
                device.write_block(index, &self.block_bytes);
            }
            self.active = false;
        }
    }
}

impl PortIo for SimNct6775 {
    fn read_port(&self, port: u16) -> port::Result<u8> {
        use nct6775::{reg, HostStatus};

        let mut state = self.state.lock();
        let offset = state.common.offset(port);
        Ok(match offset as u16 {
            reg::HSTSTS => {
                let mut status = HostStatus::empty();
                if state.active || state.common.mode == SimMode::StuckBusy {
                    status |= HostStatus::MANUAL_ACTIVE;
                }
                if state.fifo.is_empty() {
                    status |= HostStatus::FIFO_EMPTY;
                }
                status.bits()
            }
            reg::HSTERR => state.error,
            reg::HSTDAT => {
                if state.fifo.is_empty() {
                    0
                } else {
                    state.fifo.remove(0)
                }
            }
            _ => state.common.regs[offset],
        })
    }

    fn write_port(&self, port: u16, value: u8) -> port::Result<()> {
        use nct6775::{reg, MANUAL_START, SOFT_RESET};

        let mut state = self.state.lock();
        state.common.writes.push((port, value));
        let offset = state.common.offset(port);

        match offset as u16 {
            reg::HSTADD if value == SOFT_RESET => state.reset(),
            reg::HSTCMD => state.command = Some(value),
            reg::HSTDAT if state.block_remaining > 0 => state.push_block_byte(value),
            reg::HSTDAT => state.fifo.push(value),
            reg::HSTCTL if value == MANUAL_START => state.start(),
            _ => {}
        }
        if offset as u16 != reg::HSTDAT {
            state.common.regs[offset] = value;
        }

        Ok(())
    }
}
