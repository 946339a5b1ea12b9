//! Declarative tables for the per-module DIMM gauges

/// Declare the gauges exported for every module from one table.
///
/// Each row names the variant, the metric name, its help text and how the
/// value is read from the module's [`ThermalSensorState`]. Status and
/// enable flags are mapped to numbers in the row itself.
///
/// [`ThermalSensorState`]: crate::spd::ThermalSensorState
///
/// # Example
/// ```
/// use spdflow::sensor_gauges;
/// use spdflow::spd::ThermalSensorState;
///
/// sensor_gauges! {
///     pub enum BoardGauge {
///         Temperature => "dimm_temperature_celsius", "Last reading",
///             |s| s.temperature as f64;
///         Enabled => "dimm_sensor_enabled", "1 when enabled",
///             |s| if s.enabled { 1.0 } else { 0.0 };
///     }
/// }
///
/// let sensor = ThermalSensorState {
///     temperature: 41.5,
///     enabled: true,
///     ..Default::default()
/// };
/// assert_eq!(BoardGauge::Temperature.name(), "dimm_temperature_celsius");
/// assert_eq!(BoardGauge::Temperature.value(&sensor), 41.5);
/// assert_eq!(BoardGauge::Enabled.value(&sensor), 1.0);
/// assert_eq!(BoardGauge::ALL.len(), 2);
/// ```
#[macro_export]
macro_rules! sensor_gauges {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident {
            $(
                $variant:ident => $metric:literal, $help:literal,
                    |$sensor:ident| $value:expr;
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $name {
            $($variant,)*
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant,)*];

            pub fn name(&self) -> &'static str {
                match self {
                    $($name::$variant => $metric,)*
                }
            }

            pub fn help(&self) -> &'static str {
                match self {
                    $($name::$variant => $help,)*
                }
            }

            pub fn value(&self, sensor: &$crate::spd::ThermalSensorState) -> f64 {
                match self {
                    $($name::$variant => {
                        let $sensor = sensor;
                        $value
                    })*
                }
            }
        }
    };
}

/// Constant label set identifying one module's gauges
///
/// # Example
/// ```
/// use spdflow::module_labels;
///
/// let labels = module_labels! {
///     bus => "SMBus I801 adapter at efa0 (i2c-0)".to_string(),
///     address => format!("0x{:02x}", 0x51),
/// };
/// assert_eq!(labels["address"], "0x51");
/// ```
#[macro_export]
macro_rules! module_labels {
    ($($label:ident => $value:expr),* $(,)?) => {
        ::std::collections::HashMap::<String, String>::from([
            $((stringify!($label).to_string(), $value),)*
        ])
    };
}
