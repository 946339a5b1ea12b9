pub mod bits;
pub mod date;
pub mod lock;
pub mod pci;
pub mod port;
pub mod superio;
pub mod temperature;

pub use bits::{is_bit_set, normalize_bcd, swap_bits, unset_bit};
pub use date::iso_week_to_date;
pub use lock::{GlobalBusGuard, GlobalBusLock};
pub use port::{check_access, DevPort};
pub use superio::SuperIo;
pub use temperature::{celsius_to_fahrenheit, convert_raw_temperature, fahrenheit_to_celsius};
