//! Registry of the buses found on this machine

use std::sync::Arc;

use super::discovery::BusDiscovery;
use super::{SmbusBus, SmbusController};
use crate::error::{Result, SpdflowError};

/// Owns every detected controller for the lifetime of the process
#[derive(Default)]
pub struct SmbusManager {
    buses: Vec<Arc<SmbusController>>,
}

impl SmbusManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `discovery` and register everything it finds
    pub fn detect(discovery: &dyn BusDiscovery) -> Result<Self> {
        let mut manager = Self::new();
        for controller in discovery.discover()? {
            manager.add(controller);
        }

        if manager.buses.is_empty() {
            return Err(SpdflowError::NoBus);
        }
        Ok(manager)
    }

    /// Register a controller, assigning the next port id
    pub fn add(&mut self, mut controller: SmbusController) -> Arc<SmbusController> {
        controller.set_port_id(self.buses.len());
        tracing::info!(
            "Registered SMBus {} ({}, {} 0x{:04X}{})",
            controller.info().port_id,
            controller.info().name,
            controller.kind().engine().family(),
            controller.kind().engine().base(),
            if controller.has_write_protection() {
                ", SPD write protected"
            } else {
                ""
            }
        );

        let controller = Arc::new(controller);
        self.buses.push(controller.clone());
        controller
    }

    pub fn buses(&self) -> &[Arc<SmbusController>] {
        &self.buses
    }

    /// First bus of the given controller kind (`intel`, `amd`, `nuvoton`, `i2c-dev`)
    pub fn find(&self, kind: &str) -> Option<Arc<SmbusController>> {
        self.buses
            .iter()
            .find(|bus| bus.kind().name() == kind)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.buses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buses.is_empty()
    }
}
