//! Generic register abstractions for typed register programming

/// Trait for register layouts that can be converted to/from raw values
///
/// Controller registers are 8 bits wide and SPD thermal registers 16 bits;
/// both travel as `u16` here.
///
/// # Example
///
/// ```ignore
/// use spdflow_raw::register::RegisterLayout;
///
/// #[derive(Debug, Default)]
/// struct MyConfig {
///     enable: bool,
///     hysteresis: u8,
/// }
///
/// impl RegisterLayout for MyConfig {
///     fn to_raw(&self) -> u16 {
///         (self.enable as u16) | ((self.hysteresis as u16 & 0x3) << 9)
///     }
///
///     fn from_raw(value: u16) -> Self {
///         Self {
///             enable: (value & 1) != 0,
///             hysteresis: ((value >> 9) & 0x3) as u8,
///         }
///     }
/// }
/// ```
pub trait RegisterLayout: Sized {
    /// Convert this register layout to a raw value
    fn to_raw(&self) -> u16;

    /// Parse a raw value into this register layout
    fn from_raw(value: u16) -> Self;

    /// Validate that the register values are within acceptable ranges
    fn validate(&self) -> Result<(), &'static str> {
        Ok(())
    }
}

/// A register offset paired with its typed layout
#[derive(Debug, Clone, Copy)]
pub struct Register<T: RegisterLayout> {
    /// Register offset (port offset or SPD command byte)
    pub offset: u16,
    /// Typed register layout
    pub layout: T,
}

impl<T: RegisterLayout> Register<T> {
    pub fn new(offset: u16, layout: T) -> Self {
        Self { offset, layout }
    }

    /// Decode a raw value read from `offset`
    pub fn decode(offset: u16, value: u16) -> Self {
        Self {
            offset,
            layout: T::from_raw(value),
        }
    }

    pub fn validate(&self) -> Result<(), &'static str> {
        self.layout.validate()
    }

    pub fn to_raw(&self) -> u16 {
        self.layout.to_raw()
    }
}
