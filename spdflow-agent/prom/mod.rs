pub mod dimm;

pub use dimm::{DimmMetricExporter, MonitoredDimm};
