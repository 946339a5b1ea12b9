use crate::sensor_gauges;

sensor_gauges! {
    /// Per-module gauges exported for every detected DIMM
    pub enum DimmMetric {
        Temperature => "dimm_temperature_celsius", "Last DIMM thermal sensor reading",
            |s| s.temperature as f64;
        HighLimit => "dimm_high_limit_celsius", "DIMM thermal sensor high limit",
            |s| s.high_limit as f64;
        LowLimit => "dimm_low_limit_celsius", "DIMM thermal sensor low limit",
            |s| s.low_limit as f64;
        CriticalHighLimit => "dimm_critical_high_limit_celsius",
            "DIMM thermal sensor critical high limit",
            |s| s.critical_high_limit as f64;
        CriticalLowLimit => "dimm_critical_low_limit_celsius",
            "DIMM thermal sensor critical low limit",
            |s| s.critical_low_limit as f64;
        SensorStatus => "dimm_sensor_status",
            "0 good, 1 above high, 2 below low, 3 above critical high, 4 below critical low",
            |s| s.status.code() as f64;
        SensorEnabled => "dimm_sensor_enabled", "1 when the DIMM thermal sensor is enabled",
            |s| if s.enabled { 1.0 } else { 0.0 };
    }
}
