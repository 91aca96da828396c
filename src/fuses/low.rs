//! Low fuse byte

use crate::{
    fuses::{layout_of, FuseKind},
    hardware::{BodLevel, ClockSpeed, Oscillator},
    Error,
};

/// CKOUT, clock output on CLKO
const CKOUT_BIT: u8 = 6;
/// BODEN on the classic megaAVR parts, BODLEVEL right above it
const BOD_BITS: u8 = 6;
/// EESAVE lives in the low fuse of the ATtiny13
const TINY13_EESAVE_BIT: u8 = 6;

/// Bit layouts of the low fuse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LowFuseLayout {
    /// CKDIV8, CKOUT, SUT and CKSEL
    MegaAvr,
    /// BODLEVEL, BODEN, SUT and CKSEL
    ClassicMega,
    /// SPIEN, EESAVE, WDTON, CKDIV8, SUT and CKSEL
    Tiny13,
}

pub(crate) const LOW_FUSE_LAYOUTS: &[(LowFuseLayout, &[&str])] = &[
    (
        LowFuseLayout::MegaAvr,
        &[
            "atmega2561", "atmega2560", "atmega1284", "atmega1284p", "atmega1281", "atmega1280",
            "atmega644a", "atmega644p", "atmega640", "atmega328", "atmega328p", "atmega328pb",
            "atmega324a", "atmega324p", "atmega324pa", "atmega324pb", "atmega168", "atmega168p",
            "atmega168pb", "atmega164a", "atmega164p", "atmega162", "atmega88", "atmega88p",
            "atmega88pb", "atmega48", "atmega48p", "atmega48pb", "at90can128", "at90can64",
            "at90can32",
        ],
    ),
    (
        LowFuseLayout::ClassicMega,
        &[
            "atmega8535", "atmega8515", "atmega128", "atmega64", "atmega32", "atmega16", "atmega8",
        ],
    ),
    (LowFuseLayout::Tiny13, &["attiny13", "attiny13a"]),
];

/// Internal oscillator presets of the ATtiny13, with and without CKDIV8
const TINY13_INTERNAL: &[(u32, u8)] = &[
    (9_600_000, 0x7A),
    (4_800_000, 0x79),
    (1_200_000, 0x6A),
    (600_000, 0x69),
    (128_000, 0x7B),
    (16_000, 0x6B),
];

/// Factory setting of the ATtiny13: 9.6 MHz divided by 8
const TINY13_FALLBACK: u8 = 0x6A;

impl LowFuseLayout {
    pub fn of(mcu: &str) -> Option<Self> {
        layout_of(LOW_FUSE_LAYOUTS, mcu)
    }

    /// Baseline selected by the clock source, all switchable bits at 1
    fn baseline(self, f_cpu: ClockSpeed, oscillator: Oscillator) -> u8 {
        let internal_8mhz = f_cpu.hz() == 8_000_000;

        match (self, oscillator) {
            (LowFuseLayout::MegaAvr, Oscillator::External) => 0xFF,
            (LowFuseLayout::MegaAvr, Oscillator::ExternalClock) => 0xE0,
            (LowFuseLayout::MegaAvr, Oscillator::Internal) if internal_8mhz => 0xE2,
            (LowFuseLayout::MegaAvr, Oscillator::Internal) => 0x62,

            (LowFuseLayout::ClassicMega, Oscillator::External) => 0xFF,
            (LowFuseLayout::ClassicMega, Oscillator::ExternalClock) => 0xE0,
            (LowFuseLayout::ClassicMega, Oscillator::Internal) if internal_8mhz => 0xE4,
            (LowFuseLayout::ClassicMega, Oscillator::Internal) => 0xE1,

            (LowFuseLayout::Tiny13, Oscillator::External | Oscillator::ExternalClock) => 0x78,
            (LowFuseLayout::Tiny13, Oscillator::Internal) => TINY13_INTERNAL
                .iter()
                .find(|(hz, _)| *hz == f_cpu.hz())
                .map_or(TINY13_FALLBACK, |(_, value)| *value),
        }
    }

    fn lfuse(
        self,
        f_cpu: ClockSpeed,
        oscillator: Oscillator,
        bod: BodLevel,
        eesave: bool,
        ckout: bool,
    ) -> u8 {
        let baseline = self.baseline(f_cpu, oscillator);

        match self {
            LowFuseLayout::MegaAvr => baseline & !(u8::from(ckout) << CKOUT_BIT),
            LowFuseLayout::ClassicMega => {
                // BODLEVEL:BODEN, programmed bits are 0
                let bod_bits: u8 = match bod {
                    BodLevel::_4V0 => 0b11,
                    BodLevel::_2V7 => 0b01,
                    _ => 0b00,
                };
                baseline & !(bod_bits << BOD_BITS)
            }
            LowFuseLayout::Tiny13 => baseline & !(u8::from(eesave) << TINY13_EESAVE_BIT),
        }
    }
}

/// Calculate the low fuse of `mcu`
pub fn lfuse(
    mcu: &str,
    f_cpu: ClockSpeed,
    oscillator: Oscillator,
    bod: BodLevel,
    eesave: bool,
    ckout: bool,
) -> Result<u8, Error> {
    let layout = LowFuseLayout::of(mcu).ok_or_else(|| Error::UnsupportedTarget {
        mcu: mcu.to_string(),
        fuse: FuseKind::Low,
    })?;

    Ok(layout.lfuse(f_cpu, oscillator, bod, eesave, ckout))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::fuses::tests::all_hardware_configs;

    const MHZ_16: ClockSpeed = ClockSpeed::from_hz(16_000_000);
    const MHZ_8: ClockSpeed = ClockSpeed::from_hz(8_000_000);

    #[test]
    fn atmega328p_external_crystal() {
        let value = lfuse("atmega328p", MHZ_16, Oscillator::External, BodLevel::_2V7, true, false);
        assert_eq!(value.unwrap(), 0xFF);
    }

    #[test]
    fn attiny13a_internal_9m6_with_eesave() {
        let value = lfuse(
            "attiny13a",
            ClockSpeed::from_hz(9_600_000),
            Oscillator::Internal,
            BodLevel::_2V7,
            true,
            false,
        )
        .unwrap();

        assert_eq!(value, 0x7A & !(1 << 6));
        assert_eq!(value, 0x3A);
    }

    #[test]
    fn mega_internal_oscillator() {
        let osc = Oscillator::Internal;
        assert_eq!(lfuse("atmega328p", MHZ_8, osc, BodLevel::_2V7, true, false).unwrap(), 0xE2);
        assert_eq!(lfuse("atmega328p", MHZ_16, osc, BodLevel::_2V7, true, false).unwrap(), 0x62);
        assert_eq!(lfuse("at90can64", MHZ_8, osc, BodLevel::_2V7, true, true).unwrap(), 0xA2);
        assert_eq!(
            lfuse("atmega2560", MHZ_16, Oscillator::ExternalClock, BodLevel::_2V7, true, false)
                .unwrap(),
            0xE0
        );
    }

    #[test]
    fn classic_mega_encodes_bod_in_low_fuse() {
        let value = |bod| lfuse("atmega8", MHZ_16, Oscillator::External, bod, true, false).unwrap();

        assert_eq!(value(BodLevel::_4V0), 0x3F);
        assert_eq!(value(BodLevel::_2V7), 0xBF);
        assert_eq!(value(BodLevel::Disabled), 0xFF);
        assert_eq!(
            lfuse("atmega16", MHZ_8, Oscillator::Internal, BodLevel::_4V0, true, false).unwrap(),
            0x24
        );
        assert_eq!(
            lfuse("atmega32", MHZ_16, Oscillator::Internal, BodLevel::_2V7, true, false).unwrap(),
            0xA1
        );
    }

    #[test]
    fn classic_mega_ignores_clock_output() {
        for ckout in [false, true] {
            let osc = Oscillator::External;
            let value = lfuse("atmega128", MHZ_16, osc, BodLevel::Disabled, true, ckout);
            assert_eq!(value.unwrap(), 0xFF);
        }
    }

    #[test]
    fn tiny13_presets() {
        let value = |hz| {
            lfuse(
                "attiny13",
                ClockSpeed::from_hz(hz),
                Oscillator::Internal,
                BodLevel::_2V7,
                false,
                false,
            )
            .unwrap()
        };

        assert_eq!(value(9_600_000), 0x7A);
        assert_eq!(value(4_800_000), 0x79);
        assert_eq!(value(1_200_000), 0x6A);
        assert_eq!(value(600_000), 0x69);
        assert_eq!(value(128_000), 0x7B);
        assert_eq!(value(16_000), 0x6B);
        assert_eq!(value(20_000_000), TINY13_FALLBACK);
    }

    #[test]
    fn tiny13_external_clock_sources_share_baseline() {
        for osc in [Oscillator::External, Oscillator::ExternalClock] {
            let value = lfuse("attiny13a", MHZ_16, osc, BodLevel::_2V7, false, false);
            assert_eq!(value.unwrap(), 0x78);
        }
    }

    #[test]
    fn ckout_toggles_only_bit_6() {
        for (layout, parts) in LOW_FUSE_LAYOUTS {
            if *layout != LowFuseLayout::MegaAvr {
                continue;
            }
            for mcu in parts.iter() {
                for hw in all_hardware_configs().iter().filter(|hw| !hw.ckout).step_by(37) {
                    let off = lfuse(mcu, hw.f_cpu, hw.oscillator, hw.bod, hw.eesave, false).unwrap();
                    let on = lfuse(mcu, hw.f_cpu, hw.oscillator, hw.bod, hw.eesave, true).unwrap();

                    assert_eq!(off ^ on, 1 << CKOUT_BIT, "{mcu}: {hw:?}");
                }
            }
        }
    }

    #[test]
    fn eesave_toggles_only_bit_6_on_tiny13() {
        for mcu in ["attiny13", "attiny13a"] {
            for hw in all_hardware_configs().iter().filter(|hw| !hw.eesave).step_by(29) {
                let off = lfuse(mcu, hw.f_cpu, hw.oscillator, hw.bod, false, hw.ckout).unwrap();
                let on = lfuse(mcu, hw.f_cpu, hw.oscillator, hw.bod, true, hw.ckout).unwrap();

                assert_eq!(off ^ on, 1 << TINY13_EESAVE_BIT, "{mcu}: {hw:?}");
            }
        }
    }

    #[test]
    fn layouts_do_not_overlap() {
        let mut seen = std::collections::HashSet::new();
        for (_, parts) in LOW_FUSE_LAYOUTS {
            for mcu in parts.iter() {
                assert!(seen.insert(*mcu), "{mcu} listed twice");
            }
        }
    }
}
