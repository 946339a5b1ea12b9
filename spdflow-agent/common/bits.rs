//! Bit and BCD helpers used by SPD field decoders

pub fn is_bit_set(value: u8, bit: u8) -> bool {
    bit < 8 && value & (1 << bit) != 0
}

pub fn unset_bit(value: u8, bit: u8) -> u8 {
    if bit < 8 {
        value & !(1 << bit)
    } else {
        value
    }
}

/// Swap the high and low nibble
pub fn swap_bits(value: u8) -> u8 {
    value.rotate_left(4)
}

/// Decode a two-digit packed BCD byte
pub fn normalize_bcd(value: u8) -> u8 {
    (value >> 4) * 10 + (value & 0x0F)
}
