//! Extended fuse byte
//!
//! Not every part has one. Parts listed under
//! [ExtendedFuseLayout::NoExtendedFuse] resolve to `None`, and no extended
//! fuse write is issued for them at all.

use crate::{
    fuses::{layout_of, FuseKind},
    hardware::{BodLevel, Uart},
    Error,
};

/// CFD, clock failure detection on the PB parts
const CFD_BIT: u8 = 3;

/// Bit layouts of the extended fuse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtendedFuseLayout {
    /// Two fuse bytes only
    NoExtendedFuse,
    /// BODLEVEL
    MegaAvr,
    /// CFD and BODLEVEL
    MegaPb,
    /// BOOTSZ and BOOTRST
    MegaX8,
    /// M103C/WDTON or SELFPRGEN, independent of the settings
    Fixed,
    /// BODLEVEL and TA0SEL of the AT90CAN parts
    Can,
    /// M161C and BODLEVEL
    Mega162,
}

pub(crate) const EXTENDED_FUSE_LAYOUTS: &[(ExtendedFuseLayout, &[&str])] = &[
    (
        ExtendedFuseLayout::NoExtendedFuse,
        &[
            "atmega8535", "atmega8515", "atmega8", "atmega16", "atmega32", "attiny13a", "attiny13",
        ],
    ),
    (
        ExtendedFuseLayout::MegaAvr,
        &[
            "atmega2561", "atmega2560", "atmega1284", "atmega1284p", "atmega1281", "atmega1280",
            "atmega644a", "atmega644p", "atmega640", "atmega328", "atmega328p", "atmega324a",
            "atmega324p", "atmega324pa", "atmega164a", "atmega164p",
        ],
    ),
    (ExtendedFuseLayout::MegaPb, &["atmega328pb", "atmega324pb"]),
    (
        ExtendedFuseLayout::MegaX8,
        &["atmega168", "atmega168p", "atmega168pb", "atmega88", "atmega88p", "atmega88pb"],
    ),
    (
        ExtendedFuseLayout::Fixed,
        &["atmega128", "atmega64", "atmega48", "atmega48p", "atmega48pb"],
    ),
    (ExtendedFuseLayout::Can, &["at90can128", "at90can64", "at90can32"]),
    (ExtendedFuseLayout::Mega162, &["atmega162"]),
];

impl ExtendedFuseLayout {
    pub fn of(mcu: &str) -> Option<Self> {
        layout_of(EXTENDED_FUSE_LAYOUTS, mcu)
    }

    fn efuse(self, uart: Uart, bod: BodLevel, cfd: bool) -> Option<u8> {
        let value = match self {
            ExtendedFuseLayout::NoExtendedFuse => return None,
            ExtendedFuseLayout::MegaAvr => match bod {
                BodLevel::_4V3 => 0xFC,
                BodLevel::_2V7 => 0xFD,
                BodLevel::_1V8 => 0xFE,
                _ => 0xFF,
            },
            ExtendedFuseLayout::MegaPb => {
                let cfd = u8::from(cfd) << CFD_BIT;
                match bod {
                    BodLevel::_4V3 => 0xF4 | cfd,
                    BodLevel::_2V7 => 0xF5 | cfd,
                    BodLevel::_1V8 => 0xF6 | cfd,
                    _ => 0xF7,
                }
            }
            ExtendedFuseLayout::MegaX8 => {
                if uart.has_bootloader() {
                    0xFC
                } else {
                    0xFD
                }
            }
            ExtendedFuseLayout::Fixed => 0xFF,
            ExtendedFuseLayout::Can => match bod {
                BodLevel::_4V1 => 0xFD,
                BodLevel::_4V0 => 0xFB,
                BodLevel::_3V9 => 0xF9,
                BodLevel::_3V8 => 0xF7,
                BodLevel::_2V7 => 0xF5,
                BodLevel::_2V6 => 0xF3,
                BodLevel::_2V5 => 0xF1,
                _ => 0xFF,
            },
            ExtendedFuseLayout::Mega162 => match bod {
                BodLevel::_4V3 => 0xF9,
                BodLevel::_2V7 => 0xFB,
                BodLevel::_1V8 => 0xFD,
                _ => 0xFF,
            },
        };

        Some(value)
    }
}

/// Calculate the extended fuse of `mcu`
///
/// Returns `Ok(None)` for parts which have no extended fuse.
pub fn efuse(mcu: &str, uart: Uart, bod: BodLevel, cfd: bool) -> Result<Option<u8>, Error> {
    let layout = ExtendedFuseLayout::of(mcu).ok_or_else(|| Error::UnsupportedTarget {
        mcu: mcu.to_string(),
        fuse: FuseKind::Extended,
    })?;

    Ok(layout.efuse(uart, bod, cfd))
}
