use prometheus::{Gauge, Registry};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::Result;
use crate::metrics::dimm::DimmMetric;
use crate::spd::{SpdAccessor, SpdDevice, ThermalSensorState};

/// A detected module and the bus it was found on
pub struct MonitoredDimm {
    pub bus: String,
    pub device: SpdDevice,
}

pub struct DimmMetricExporter {
    registry: Arc<Registry>,
    dimms: Arc<parking_lot::Mutex<Vec<MonitoredDimm>>>,
    gauges: HashMap<DimmMetric, Vec<Gauge>>,
}

impl DimmMetricExporter {
    pub fn new(dimms: Vec<MonitoredDimm>) -> Result<Self> {
        let mut exporter = Self {
            registry: Arc::new(Registry::new()),
            dimms: Arc::new(parking_lot::Mutex::new(dimms)),
            gauges: HashMap::new(),
        };

        exporter.register_metrics()?;

        Ok(exporter)
    }

    fn register_metrics(&mut self) -> Result<()> {
        let labels: Vec<HashMap<String, String>> = self
            .dimms
            .lock()
            .iter_mut()
            .map(|dimm| {
                crate::module_labels! {
                    bus => dimm.bus.clone(),
                    address => format!("0x{:02x}", dimm.device.address()),
                    generation => dimm.device.generation().name().to_string(),
                    part_number => dimm.device.module_part_number(),
                }
            })
            .collect();

        for &metric in DimmMetric::ALL {
            let mut gauges = Vec::with_capacity(labels.len());
            for dimm_labels in &labels {
                let opts = prometheus::Opts::new(metric.name(), metric.help())
                    .const_labels(dimm_labels.clone());
                let gauge = Gauge::with_opts(opts)?;
                self.registry.register(Box::new(gauge.clone()))?;
                gauges.push(gauge);
            }
            self.gauges.insert(metric, gauges);
        }

        Ok(())
    }

    fn set(&self, metric: DimmMetric, index: usize, value: f64) {
        if let Some(gauge) = self.gauges.get(&metric).and_then(|g| g.get(index)) {
            gauge.set(value);
        }
    }

    /// Refresh every module once (called by the collector)
    pub async fn collect(&self) {
        let dimms = Arc::clone(&self.dimms);
        let readings = tokio::task::spawn_blocking(move || {
            let mut dimms = dimms.lock();
            dimms
                .iter_mut()
                .map(|dimm| {
                    dimm.device.update();
                    if dimm.device.thermal_sensor().present && !dimm.device.update_temperature() {
                        tracing::debug!(
                            "{}: temperature of 0x{:02x} unavailable",
                            dimm.bus,
                            dimm.device.address()
                        );
                    }
                    *dimm.device.thermal_sensor()
                })
                .collect::<Vec<ThermalSensorState>>()
        })
        .await;

        let readings = match readings {
            Ok(readings) => readings,
            Err(e) => {
                tracing::error!("DIMM collection task failed: {}", e);
                return;
            }
        };

        for (index, sensor) in readings.iter().enumerate() {
            for &metric in DimmMetric::ALL {
                self.set(metric, index, metric.value(sensor));
            }
        }
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    pub fn len(&self) -> usize {
        self.dimms.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
