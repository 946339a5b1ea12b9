//! Generation detection for one SPD address

use std::sync::Arc;

use spdflow_raw::spd::{self, Generation, MemoryType};

use super::{Ddr4Accessor, Ddr5Accessor, SpdAccessor, SpdDevice};
use crate::smbus::SmbusBus;

/// Outcome of probing one SPD address.
///
/// Detection never fails; an unusable address yields `is_valid() == false`.
pub struct SpdDetector {
    address: u8,
    memory_type: MemoryType,
    valid: bool,
    device: Option<SpdDevice>,
}

impl SpdDetector {
    /// Probe `address` for a DDR4 module first, then DDR5.
    ///
    /// `hint` restricts the probes to one generation. Without a hint and
    /// without a match, the legacy memory type byte is read so older
    /// systems can still be recognised, though no accessor is built for
    /// them.
    pub fn detect(bus: Arc<dyn SmbusBus>, address: u8, hint: Option<MemoryType>) -> Self {
        let hint = hint.filter(|ty| *ty != MemoryType::Reserved);
        let wants = |generation: Generation| hint.map_or(true, |ty| ty.generation() == Some(generation));

        let device = if wants(Generation::Ddr4) && Ddr4Accessor::is_available(bus.as_ref(), address) {
            Some(SpdDevice::Ddr4(Ddr4Accessor::new(bus.clone(), address)))
        } else if wants(Generation::Ddr5) && Ddr5Accessor::is_available(bus.as_ref(), address) {
            Some(SpdDevice::Ddr5(Ddr5Accessor::new(bus.clone(), address)))
        } else {
            None
        };

        if let Some(mut device) = device {
            let memory_type = device.memory_type();
            tracing::info!(
                "{}: {} module at 0x{address:02x} ({})",
                bus.info().name,
                device.generation().name(),
                memory_type.name()
            );
            return Self {
                address,
                memory_type,
                valid: true,
                device: Some(device),
            };
        }

        if let Some(memory_type) = hint {
            return Self::invalid(address, memory_type);
        }

        match bus.read_byte_data(address, spd::offset::MEMORY_TYPE as u8) {
            Ok(raw) => {
                let memory_type = MemoryType::from_raw(raw).unwrap_or_default();
                tracing::debug!("0x{address:02x}: legacy probe found {}", memory_type.name());
                Self {
                    address,
                    memory_type,
                    valid: memory_type.generation().is_some(),
                    device: None,
                }
            }
            Err(e) => {
                tracing::debug!("0x{address:02x}: nothing detected: {e}");
                Self::invalid(address, MemoryType::Reserved)
            }
        }
    }

    fn invalid(address: u8, memory_type: MemoryType) -> Self {
        Self {
            address,
            memory_type,
            valid: false,
            device: None,
        }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    pub fn memory_type(&self) -> MemoryType {
        self.memory_type
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn device(&mut self) -> Option<&mut SpdDevice> {
        self.device.as_mut()
    }

    pub fn into_device(self) -> Option<SpdDevice> {
        self.device
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::smbus::sim::{MemoryDevice, SimI801};
    use crate::smbus::{BusInfo, ControllerKind, PollPolicy, SmbusController, I801};
    use crate::spd::fake::{Ddr4Module, Ddr5Module, FakeSpdBus};

    #[test]
    fn test_detects_ddr4_first() {
        let bus = Arc::new(FakeSpdBus::new());
        bus.add_ddr4(0x50, Ddr4Module::new());

        let mut detector = SpdDetector::detect(bus.clone(), 0x50, None);
        assert!(detector.is_valid());
        assert_eq!(detector.memory_type(), MemoryType::Ddr4Sdram);
        assert!(matches!(detector.device(), Some(SpdDevice::Ddr4(_))));
    }

    #[test]
    fn test_detects_ddr5() {
        let bus = Arc::new(FakeSpdBus::new());
        bus.add_ddr5(0x52, Ddr5Module::new());

        let detector = SpdDetector::detect(bus.clone(), 0x52, None);
        assert!(detector.is_valid());
        assert_eq!(detector.address(), 0x52);
        assert_eq!(detector.memory_type(), MemoryType::Ddr5Sdram);
        let device = detector.into_device();
        assert!(matches!(device, Some(SpdDevice::Ddr5(_))));
    }

    #[test]
    fn test_hint_restricts_generation() {
        let bus = Arc::new(FakeSpdBus::new());
        bus.add_ddr5(0x50, Ddr5Module::new());

        let detector = SpdDetector::detect(bus.clone(), 0x50, Some(MemoryType::Ddr4Sdram));
        assert!(!detector.is_valid());
        assert!(detector.into_device().is_none());

        let detector = SpdDetector::detect(bus.clone(), 0x50, Some(MemoryType::Lpddr5Sdram));
        assert!(detector.is_valid());
    }

    #[test]
    fn test_empty_address() {
        let bus = Arc::new(FakeSpdBus::new());
        let detector = SpdDetector::detect(bus, 0x55, None);
        assert!(!detector.is_valid());
        assert_eq!(detector.memory_type(), MemoryType::Reserved);
    }

    fn legacy_bus(memory_type: u8) -> Arc<SmbusController> {
        let sim = Arc::new(SimI801::new(0xEFA0));
        sim.add_device(0x50, MemoryDevice::with_bytes(&[0x92, 0x10, memory_type]));
        Arc::new(SmbusController::new(
            ControllerKind::Intel(
                I801::new(sim, 0xEFA0).with_poll_policy(PollPolicy::immediate(450)),
            ),
            BusInfo::default(),
        ))
    }

    #[test]
    fn test_legacy_probe() {
        let detector = SpdDetector::detect(legacy_bus(0x0B), 0x50, None);
        assert!(!detector.is_valid());
        assert_eq!(detector.memory_type(), MemoryType::Ddr3Sdram);

        let mut detector = SpdDetector::detect(legacy_bus(0x0C), 0x50, None);
        assert!(detector.is_valid());
        assert_eq!(detector.memory_type(), MemoryType::Ddr4Sdram);
        assert!(detector.device().is_none());
    }

    #[test]
    fn test_end_to_end_ddr4_on_simulated_bus() {
        let sim = Arc::new(SimI801::new(0xEFA0));
        sim.add_device(0x36, MemoryDevice::new());
        sim.add_device(0x50, MemoryDevice::with_bytes(&[0x23, 0x11, 0x0C]));
        let bus: Arc<dyn SmbusBus> = Arc::new(SmbusController::new(
            ControllerKind::Intel(
                I801::new(sim.clone(), 0xEFA0).with_poll_policy(PollPolicy::immediate(450)),
            ),
            BusInfo::default(),
        ));

        let detector = SpdDetector::detect(bus, 0x50, None);
        assert!(detector.is_valid());
        assert_eq!(detector.memory_type(), MemoryType::Ddr4Sdram);
    }
}
