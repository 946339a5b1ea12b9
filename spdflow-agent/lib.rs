// Macros (must be first for visibility)
#[macro_use]
pub mod macros;

pub mod common;
pub mod config;
pub mod error;
pub mod metrics;
pub mod orchestrator;
pub mod prom;
pub mod smbus;
pub mod spd;

pub use config::ExportConfig;
pub use error::{Result, SpdflowError};
pub use orchestrator::MetricCollector;
pub use prom::DimmMetricExporter;
pub use smbus::{SmbusBus, SmbusController, SmbusManager};
pub use spd::{SpdAccessor, SpdDetector, SpdDevice};
