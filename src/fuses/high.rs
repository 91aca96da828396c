//! High fuse byte

use crate::{
    fuses::{layout_of, FuseKind},
    hardware::{BodLevel, Oscillator, Uart},
    Error,
};

const EESAVE_BIT: u8 = 3;
/// CKOPT, full rail-to-rail swing of the crystal oscillator
const CKOPT_BIT: u8 = 4;
const JTAGEN_BIT: u8 = 6;

/// Bit layouts of the high fuse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighFuseLayout {
    /// OCDEN, JTAGEN, SPIEN, WDTON, EESAVE, BOOTSZ and BOOTRST
    LargeMegaJtag,
    /// RSTDISBL, DWEN, SPIEN, WDTON, EESAVE, BOOTSZ and BOOTRST
    Mega328,
    /// As [HighFuseLayout::LargeMegaJtag], with a smaller boot section
    Mega164,
    /// RSTDISBL, DWEN, SPIEN, WDTON, EESAVE and BODLEVEL
    MegaX8,
    /// OCDEN, JTAGEN, SPIEN, CKOPT, EESAVE, BOOTSZ and BOOTRST
    ClassicMegaJtag,
    /// S8535C/RSTDISBL, WDTON, SPIEN, CKOPT, EESAVE, BOOTSZ and BOOTRST
    ClassicMega,
    /// SELFPRGEN, DWEN, BODLEVEL and RSTDISBL
    Tiny13,
}

pub(crate) const HIGH_FUSE_LAYOUTS: &[(HighFuseLayout, &[&str])] = &[
    (
        HighFuseLayout::LargeMegaJtag,
        &[
            "atmega2561", "atmega2560", "atmega1284", "atmega1284p", "atmega1281", "atmega1280",
            "atmega644a", "atmega644p", "atmega640", "atmega324a", "atmega324p", "atmega324pa",
            "atmega324pb", "at90can128", "at90can64", "at90can32",
        ],
    ),
    (HighFuseLayout::Mega328, &["atmega328", "atmega328p", "atmega328pb"]),
    (HighFuseLayout::Mega164, &["atmega164a", "atmega164p", "atmega162"]),
    (
        HighFuseLayout::MegaX8,
        &[
            "atmega168", "atmega168p", "atmega168pb", "atmega88", "atmega88p", "atmega88pb",
            "atmega48", "atmega48p", "atmega48pb",
        ],
    ),
    (HighFuseLayout::ClassicMegaJtag, &["atmega128", "atmega64", "atmega32"]),
    (HighFuseLayout::ClassicMega, &["atmega8535", "atmega8515", "atmega16", "atmega8"]),
    (HighFuseLayout::Tiny13, &["attiny13", "attiny13a"]),
];

impl HighFuseLayout {
    pub fn of(mcu: &str) -> Option<Self> {
        layout_of(HIGH_FUSE_LAYOUTS, mcu)
    }

    /// Whether JTAGEN is part of this layout
    pub fn has_jtag(self) -> bool {
        matches!(
            self,
            HighFuseLayout::LargeMegaJtag | HighFuseLayout::Mega164 | HighFuseLayout::ClassicMegaJtag
        )
    }

    fn hfuse(
        self,
        uart: Uart,
        oscillator: Oscillator,
        bod: BodLevel,
        eesave: bool,
        jtagen: bool,
    ) -> u8 {
        let eesave = u8::from(eesave) << EESAVE_BIT;
        let ckopt = u8::from(oscillator == Oscillator::External) << CKOPT_BIT;
        let jtagen = u8::from(jtagen) << JTAGEN_BIT;

        // Boot section reserved (BOOTRST programmed) vs. full program memory
        let boot = |with_bootloader: u8, without_bootloader: u8| {
            if uart.has_bootloader() {
                with_bootloader
            } else {
                without_bootloader
            }
        };

        match self {
            HighFuseLayout::LargeMegaJtag => boot(0xDE, 0xDF) & !jtagen & !eesave,
            HighFuseLayout::Mega328 => boot(0xDE, 0xDF) & !eesave,
            HighFuseLayout::Mega164 => boot(0xDC, 0xDD) & !jtagen & !eesave,
            HighFuseLayout::MegaX8 => {
                let baseline: u8 = match bod {
                    BodLevel::_4V3 => 0xDC,
                    BodLevel::_2V7 => 0xDD,
                    BodLevel::_1V8 => 0xDE,
                    _ => 0xDF,
                };
                baseline & !eesave
            }
            HighFuseLayout::ClassicMegaJtag => boot(0xDE, 0xDF) & !jtagen & !ckopt & !eesave,
            HighFuseLayout::ClassicMega => boot(0xDC, 0xDD) & !ckopt & !eesave,
            // Picked by BOD level alone, bits 7..5 are reserved and stay 1
            HighFuseLayout::Tiny13 => match bod {
                BodLevel::_4V3 => 0xF9,
                BodLevel::_2V7 => 0xFB,
                BodLevel::_1V8 => 0xFD,
                _ => 0xFF,
            },
        }
    }
}

/// Calculate the high fuse of `mcu`
pub fn hfuse(
    mcu: &str,
    uart: Uart,
    oscillator: Oscillator,
    bod: BodLevel,
    eesave: bool,
    jtagen: bool,
) -> Result<u8, Error> {
    let layout = HighFuseLayout::of(mcu).ok_or_else(|| Error::UnsupportedTarget {
        mcu: mcu.to_string(),
        fuse: FuseKind::High,
    })?;

    Ok(layout.hfuse(uart, oscillator, bod, eesave, jtagen))
}
