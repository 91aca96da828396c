//! Lock bits

/// Parts that ship without any bootloader support
const TARGETS_WITHOUT_BOOTLOADER: &[&str] = &[
    "atmega48", "atmega48p", "attiny4313", "attiny2313", "attiny1634", "attiny861", "attiny841",
    "attiny461", "attiny441", "attiny261", "attiny167", "attiny88", "attiny87", "attiny85",
    "attiny84", "attiny48", "attiny45", "attiny44", "attiny43", "attiny40", "attiny26", "attiny25",
    "attiny24", "attiny13", "attiny13a",
];

/// Boot section protected against self-programming
const LOCK_BOOT_SECTION: u8 = 0x0F;
/// No protection and no boot section
const UNLOCKED: u8 = 0xFF;

/// Lock bits allowing a new bootloader to be written
pub const DEFAULT_UNLOCK: u8 = 0x3F;
/// Lock bits written after a bootloader has been burned
pub const DEFAULT_BOOTLOADER_LOCK: u8 = LOCK_BOOT_SECTION;

/// Whether `mcu` can host a resident bootloader
pub fn has_bootloader_support(mcu: &str) -> bool {
    !TARGETS_WITHOUT_BOOTLOADER.contains(&mcu)
}

/// Lock bits used when setting the fuses of `mcu`
pub fn lock_bits(mcu: &str) -> u8 {
    if has_bootloader_support(mcu) {
        LOCK_BOOT_SECTION
    } else {
        UNLOCKED
    }
}
