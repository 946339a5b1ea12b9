pub mod collector;

pub use collector::{scan_modules, CollectorHandle, MetricCollector};
