pub mod dimm;

pub use dimm::DimmMetric;
