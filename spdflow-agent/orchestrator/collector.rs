//! Periodic DIMM sensor collection driven by one async loop

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ExportConfig;
use crate::prom::{DimmMetricExporter, MonitoredDimm};
use crate::smbus::SmbusBus;
use crate::spd::SpdDetector;

/// Probe `addresses` on every bus and keep the modules that have an accessor
pub fn scan_modules(buses: &[Arc<dyn SmbusBus>], addresses: &[u8]) -> Vec<MonitoredDimm> {
    let mut dimms = Vec::new();

    for bus in buses {
        for &address in addresses {
            let detector = SpdDetector::detect(Arc::clone(bus), address, None);
            if !detector.is_valid() {
                continue;
            }
            let memory_type = detector.memory_type();
            match detector.into_device() {
                Some(device) => dimms.push(MonitoredDimm {
                    bus: bus.info().name.clone(),
                    device,
                }),
                None => tracing::warn!(
                    "{}: {} module at 0x{address:02x} found by legacy probe only, skipping",
                    bus.info().name,
                    memory_type.name()
                ),
            }
        }
    }

    tracing::info!("Monitoring {} DIMM(s)", dimms.len());
    dimms
}

/// Running collection loop
pub struct CollectorHandle {
    task: JoinHandle<()>,
}

impl CollectorHandle {
    /// Wait for the loop to stop; `false` if it panicked or was aborted
    pub async fn join(self) -> bool {
        match self.task.await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("DIMM collection task failed: {e}");
                false
            }
        }
    }
}

pub struct MetricCollector {
    interval: Duration,
    dimm_exporter: Arc<DimmMetricExporter>,
}

impl MetricCollector {
    pub fn new(config: &ExportConfig, buses: &[Arc<dyn SmbusBus>]) -> crate::error::Result<Self> {
        let dimms = scan_modules(buses, &config.addresses);
        let exporter = DimmMetricExporter::new(dimms)?;
        tracing::info!("DIMM exporter initialized");

        Ok(Self::with_exporter(
            exporter,
            Duration::from_secs(config.interval_secs),
        ))
    }

    pub fn with_exporter(exporter: DimmMetricExporter, interval: Duration) -> Self {
        Self {
            interval,
            dimm_exporter: Arc::new(exporter),
        }
    }

    /// Exporter handle for the metrics handler
    pub fn dimm_exporter(&self) -> Arc<DimmMetricExporter> {
        Arc::clone(&self.dimm_exporter)
    }

    /// Start the collection loop; it exits once `cancel` fires
    pub fn start(self, cancel: CancellationToken) -> CollectorHandle {
        tracing::info!("Starting DIMM collection every {:?}", self.interval);

        CollectorHandle {
            task: tokio::spawn(async move {
                self.collection_loop(cancel).await;
            }),
        }
    }

    async fn collection_loop(self, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(self.interval);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Collection loop cancelled");
                    break;
                }
                _ = interval.tick() => {
                    self.dimm_exporter.collect().await;
                }
            }
        }
    }
}
