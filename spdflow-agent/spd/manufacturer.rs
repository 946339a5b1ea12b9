//! JEP106 manufacturer identification codes

use std::collections::HashMap;

use once_cell::sync::Lazy;

/// Bank number (1-based) → ID code (with parity bit) → name
static MANUFACTURER_BANKS: Lazy<HashMap<u8, HashMap<u8, &'static str>>> = Lazy::new(|| {
    let banks: &[(u8, &[(u8, &str)])] = &[
        (
            1,
            &[
                (0x01, "AMD"),
                (0x2C, "Micron Technology"),
                (0x4F, "Transcend Information"),
                (0x89, "Intel"),
                (0x94, "Smart Modular"),
                (0x98, "Kioxia"),
                (0xAD, "SK Hynix"),
                (0xC1, "Infineon"),
                (0xCE, "Samsung"),
            ],
        ),
        (2, &[(0x7A, "Apacer Technology"), (0x98, "Kingston")]),
        (3, &[(0x9E, "Corsair"), (0xFE, "Elpida")]),
        (4, &[(0x0B, "Nanya Technology")]),
        (5, &[(0xCB, "A-DATA Technology"), (0xCD, "G.Skill"), (0xEF, "Team Group")]),
        (6, &[(0x9B, "Crucial Technology")]),
        (7, &[(0x02, "Patriot Memory")]),
    ];

    banks
        .iter()
        .map(|(bank, codes)| (*bank, codes.iter().copied().collect()))
        .collect()
});

/// Look up a manufacturer by continuation code (parity bit stripped or not)
/// and ID code
pub fn manufacturer_name(continuation_code: u8, id_code: u8) -> Option<&'static str> {
    let bank = (continuation_code & 0x7F).wrapping_add(1);
    MANUFACTURER_BANKS.get(&bank)?.get(&id_code).copied()
}
