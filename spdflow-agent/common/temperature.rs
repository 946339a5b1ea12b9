use spdflow_raw::spd::{TEMPERATURE_LSB, TEMPERATURE_MASK, TEMPERATURE_SIGN};

/// Decode a 13-bit two's-complement-style sensor reading into °C
pub fn convert_raw_temperature(raw: u16) -> f32 {
    let raw = raw & TEMPERATURE_MASK;
    if raw & TEMPERATURE_SIGN != 0 {
        (raw & !TEMPERATURE_SIGN) as f32 * TEMPERATURE_LSB - 256.0
    } else {
        raw as f32 * TEMPERATURE_LSB
    }
}

pub fn celsius_to_fahrenheit(celsius: f32) -> f32 {
    celsius * 9.0 / 5.0 + 32.0
}

pub fn fahrenheit_to_celsius(fahrenheit: f32) -> f32 {
    (fahrenheit - 32.0) * 5.0 / 9.0
}
