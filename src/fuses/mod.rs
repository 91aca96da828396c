//! Fuse byte calculation
//!
//! AVR parts sharing a fuse layout are grouped per register: the low, high and
//! extended fuses are partitioned independently, so a part can share its low
//! fuse layout with one set of parts and its high fuse layout with another.
//! Each register module holds its partition as a table of `(layout, parts)`
//! rows. Adding a part is a matter of listing it in the right row; the bit
//! rules of a layout only change when the datasheet layout itself does.
//!
//! All calculations are pure. An MCU missing from a register's table is an
//! [Error::UnsupportedTarget]; there is no safe default fuse value.

use std::fmt;

use log::debug;
use strum::Display;

pub use self::{
    extended::{efuse, ExtendedFuseLayout},
    high::{hfuse, HighFuseLayout},
    lock::{has_bootloader_support, lock_bits, DEFAULT_BOOTLOADER_LOCK, DEFAULT_UNLOCK},
    low::{lfuse, LowFuseLayout},
};
use crate::{board::BoardConfig, hardware::HardwareConfig, Error};

mod extended;
mod high;
mod lock;
mod low;

/// A fuse register, named the way avrdude names its memory
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Display)]
pub enum FuseKind {
    #[strum(serialize = "lfuse")]
    Low,
    #[strum(serialize = "hfuse")]
    High,
    #[strum(serialize = "efuse")]
    Extended,
    #[strum(serialize = "lock")]
    Lock,
}

/// The action the fuses are resolved for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuseAction {
    /// Program the fuses of the chip
    SetFuses,
    /// Prepare the chip for burning a new bootloader
    BurnBootloader,
}

impl FuseAction {
    /// Board file section holding the explicit fuse values for this action
    pub fn section(self) -> &'static str {
        match self {
            FuseAction::SetFuses => "fuses",
            FuseAction::BurnBootloader => "bootloader",
        }
    }
}

/// Lock bits to program along with the fuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockBits {
    /// Regular protection of the boot section
    Lock(u8),
    /// Unlocked memory, so a new bootloader can be written
    Unlock(u8),
}

impl LockBits {
    pub fn value(self) -> u8 {
        match self {
            LockBits::Lock(value) | LockBits::Unlock(value) => value,
        }
    }

    /// Key of the value in the resolved fuse mapping
    pub fn name(self) -> &'static str {
        match self {
            LockBits::Lock(_) => "lock",
            LockBits::Unlock(_) => "unlock",
        }
    }
}

impl fmt::Display for LockBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", FuseByte(self.value()))
    }
}

/// A fuse byte formatted as a two digit, `0x` prefixed hex string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuseByte(pub u8);

impl fmt::Display for FuseByte {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// The values to program into a chip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FuseSet {
    pub lfuse: u8,
    pub hfuse: u8,
    /// `None` for parts without an extended fuse; nothing is written then
    pub efuse: Option<u8>,
    pub lock: LockBits,
}

impl FuseSet {
    /// The registers to write, in programming order
    ///
    /// Lock bits go first so an unlock takes effect before anything else.
    pub fn writes(&self) -> impl Iterator<Item = (FuseKind, u8)> {
        [
            Some((FuseKind::Lock, self.lock.value())),
            Some((FuseKind::High, self.hfuse)),
            Some((FuseKind::Low, self.lfuse)),
            self.efuse.map(|efuse| (FuseKind::Extended, efuse)),
        ]
        .into_iter()
        .flatten()
    }

    /// Formatted values keyed by `lfuse`, `hfuse`, `efuse` and `lock`/`unlock`
    ///
    /// This is the mapping reported as the selected fuses.
    pub fn to_map(&self) -> Vec<(&'static str, String)> {
        let mut map = vec![
            ("lfuse", FuseByte(self.lfuse).to_string()),
            ("hfuse", FuseByte(self.hfuse).to_string()),
        ];
        if let Some(efuse) = self.efuse {
            map.push(("efuse", FuseByte(efuse).to_string()));
        }
        map.push((self.lock.name(), self.lock.to_string()));

        map
    }
}

impl fmt::Display for FuseSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "lfuse = {}, hfuse = {}",
            FuseByte(self.lfuse),
            FuseByte(self.hfuse)
        )?;
        if let Some(efuse) = self.efuse {
            write!(f, ", efuse = {}", FuseByte(efuse))?;
        }

        Ok(())
    }
}

/// Which hardware settings have an effect on the fuses of an MCU
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub uart: bool,
    pub ckout: bool,
    pub jtagen: bool,
    pub cfd: bool,
}

/// Report the hardware settings the fuse layouts of `mcu` react to
pub fn settings(mcu: &str) -> Settings {
    Settings {
        uart: HighFuseLayout::of(mcu).is_some_and(|layout| layout != HighFuseLayout::Tiny13),
        ckout: LowFuseLayout::of(mcu) == Some(LowFuseLayout::MegaAvr),
        jtagen: HighFuseLayout::of(mcu).is_some_and(HighFuseLayout::has_jtag),
        cfd: ExtendedFuseLayout::of(mcu) == Some(ExtendedFuseLayout::MegaPb),
    }
}

/// Calculate every fuse of `mcu` from its hardware settings
pub fn compute(mcu: &str, hw: &HardwareConfig) -> Result<FuseSet, Error> {
    Ok(FuseSet {
        lfuse: lfuse(mcu, hw.f_cpu, hw.oscillator, hw.bod, hw.eesave, hw.ckout)?,
        hfuse: hfuse(mcu, hw.uart, hw.oscillator, hw.bod, hw.eesave, hw.jtagen)?,
        efuse: efuse(mcu, hw.uart, hw.bod, hw.cfd)?,
        lock: LockBits::Lock(lock_bits(mcu)),
    })
}

/// Resolve the fuses of a board for the given action
///
/// Values given explicitly in the action's section of the board file win.
/// Anything missing is calculated, which is only possible for the cores whose
/// fuse layouts are known (see [crate::Core]). When burning a bootloader, only
/// the Optiboot based cores are calculated; the others write exactly the
/// `[bootloader]` values, without an extended fuse unless one is given.
pub fn resolve(board: &BoardConfig, action: FuseAction) -> Result<FuseSet, Error> {
    let mcu = board.mcu()?;
    let overrides = board.fuse_overrides(action);

    let lfuse_override = overrides.lfuse.map(|v| parse_fuse_byte(FuseKind::Low, v)).transpose()?;
    let hfuse_override = overrides.hfuse.map(|v| parse_fuse_byte(FuseKind::High, v)).transpose()?;
    let efuse_override = overrides
        .efuse
        .map(|v| parse_fuse_byte(FuseKind::Extended, v))
        .transpose()?;

    // Non-Optiboot bootloaders are burned with their configured fuses only
    let dynamic_core = board
        .core()
        .filter(|core| action == FuseAction::SetFuses || core.uses_optiboot());

    let (lfuse, hfuse, efuse) = match (dynamic_core, lfuse_override, hfuse_override) {
        (Some(core), lfuse_override, hfuse_override) => {
            let hw = board.hardware()?;
            debug!("Calculating fuses for {mcu} ({core}): {hw:?}");

            let lfuse = match lfuse_override {
                Some(value) => value,
                None => lfuse(&mcu, hw.f_cpu, hw.oscillator, hw.bod, hw.eesave, hw.ckout)?,
            };
            let hfuse = match hfuse_override {
                Some(value) => value,
                None => hfuse(&mcu, hw.uart, hw.oscillator, hw.bod, hw.eesave, hw.jtagen)?,
            };
            let efuse = match efuse_override {
                Some(value) => Some(value),
                None => efuse(&mcu, hw.uart, hw.bod, hw.cfd)?,
            };

            (lfuse, hfuse, efuse)
        }
        (None, Some(lfuse), Some(hfuse)) => (lfuse, hfuse, efuse_override),
        (None, _, _) => {
            return Err(Error::DynamicFusesUnsupported {
                mcu,
                section: action.section(),
            })
        }
    };

    let lock = match action {
        FuseAction::SetFuses => match overrides.lock_bits {
            Some(value) => LockBits::Lock(parse_fuse_byte(FuseKind::Lock, value)?),
            None => LockBits::Lock(lock_bits(&mcu)),
        },
        FuseAction::BurnBootloader => match overrides.unlock_bits {
            Some(value) => LockBits::Unlock(parse_fuse_byte(FuseKind::Lock, value)?),
            None => LockBits::Unlock(DEFAULT_UNLOCK),
        },
    };

    let fuses = FuseSet {
        lfuse,
        hfuse,
        efuse,
        lock,
    };
    debug!("Resolved fuses for {mcu}: {fuses}, {} = {lock}", lock.name());

    Ok(fuses)
}

/// Parse an explicitly configured fuse value
///
/// Accepts `0x` prefixed hex, `0b` prefixed binary and plain decimal.
pub fn parse_fuse_byte(fuse: FuseKind, value: &str) -> Result<u8, Error> {
    let trimmed = value.trim();
    let lower = trimmed.to_lowercase();

    let parsed = if let Some(hex) = lower.strip_prefix("0x") {
        u8::from_str_radix(hex, 16)
    } else if let Some(bin) = lower.strip_prefix("0b") {
        u8::from_str_radix(bin, 2)
    } else {
        lower.parse()
    };

    parsed.map_err(|_| Error::InvalidFuseValue {
        fuse,
        value: value.to_string(),
    })
}

/// Find the layout row listing `mcu`
pub(crate) fn layout_of<L: Copy>(table: &[(L, &[&str])], mcu: &str) -> Option<L> {
    table
        .iter()
        .find(|(_, parts)| parts.contains(&mcu))
        .map(|(layout, _)| *layout)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator;

    use super::*;
    use crate::hardware::{BodLevel, ClockSpeed, Oscillator, Uart};

    /// Every part with a known low fuse layout
    pub(crate) fn supported_mcus() -> Vec<&'static str> {
        low::LOW_FUSE_LAYOUTS
            .iter()
            .flat_map(|(_, parts)| parts.iter().copied())
            .collect()
    }

    pub(crate) fn all_hardware_configs() -> Vec<HardwareConfig> {
        let clocks = [
            16_000_000, 8_000_000, 9_600_000, 4_800_000, 1_200_000, 600_000, 128_000, 16_000,
            20_000_000,
        ];
        let mut configs = Vec::new();

        for hz in clocks {
            for oscillator in Oscillator::iter() {
                for bod in BodLevel::iter() {
                    for uart in Uart::iter() {
                        for flags in 0..16u8 {
                            configs.push(HardwareConfig {
                                f_cpu: ClockSpeed::from_hz(hz),
                                oscillator,
                                bod,
                                uart,
                                eesave: flags & 1 != 0,
                                jtagen: flags & 2 != 0,
                                ckout: flags & 4 != 0,
                                cfd: flags & 8 != 0,
                            });
                        }
                    }
                }
            }
        }

        configs
    }

    #[test]
    fn every_supported_mcu_has_low_and_high_fuse() {
        let configs = all_hardware_configs();

        for mcu in supported_mcus() {
            for hw in &configs {
                assert!(compute(mcu, hw).is_ok(), "{mcu} failed with {hw:?}");
            }
        }
    }

    #[test]
    fn calculation_is_idempotent() {
        let hw = HardwareConfig {
            oscillator: Oscillator::Internal,
            f_cpu: ClockSpeed::from_hz(8_000_000),
            ckout: true,
            ..HardwareConfig::default()
        };

        for mcu in supported_mcus() {
            assert_eq!(compute(mcu, &hw).unwrap(), compute(mcu, &hw).unwrap());
        }
    }

    #[test]
    fn unknown_mcu_fails_every_register() {
        let hw = HardwareConfig::default();
        let mcu = "atmega_nonexistent";

        assert!(matches!(
            lfuse(mcu, hw.f_cpu, hw.oscillator, hw.bod, hw.eesave, hw.ckout),
            Err(Error::UnsupportedTarget { fuse: FuseKind::Low, .. })
        ));
        assert!(matches!(
            hfuse(mcu, hw.uart, hw.oscillator, hw.bod, hw.eesave, hw.jtagen),
            Err(Error::UnsupportedTarget { fuse: FuseKind::High, .. })
        ));
        assert!(matches!(
            efuse(mcu, hw.uart, hw.bod, hw.cfd),
            Err(Error::UnsupportedTarget { fuse: FuseKind::Extended, .. })
        ));
        assert!(compute(mcu, &hw).is_err());
    }

    #[test]
    fn atmega328p_defaults() {
        let fuses = compute("atmega328p", &HardwareConfig::default()).unwrap();

        assert_eq!(
            fuses,
            FuseSet {
                lfuse: 0xFF,
                hfuse: 0xD6,
                efuse: Some(0xFD),
                lock: LockBits::Lock(0x0F),
            }
        );
    }

    #[test]
    fn writes_skip_missing_extended_fuse() {
        let fuses = compute("atmega8", &HardwareConfig::default()).unwrap();
        let kinds: Vec<_> = fuses.writes().map(|(kind, _)| kind).collect();

        assert_eq!(kinds, [FuseKind::Lock, FuseKind::High, FuseKind::Low]);
    }

    #[test]
    fn map_uses_two_digit_hex() {
        let fuses = FuseSet {
            lfuse: 0x3A,
            hfuse: 0x09,
            efuse: None,
            lock: LockBits::Unlock(0x3F),
        };

        assert_eq!(
            fuses.to_map(),
            vec![
                ("lfuse", "0x3A".to_string()),
                ("hfuse", "0x09".to_string()),
                ("unlock", "0x3F".to_string()),
            ]
        );
    }

    #[test]
    fn fuse_byte_formats() {
        assert_eq!(parse_fuse_byte(FuseKind::Low, "0xFF").unwrap(), 0xFF);
        assert_eq!(parse_fuse_byte(FuseKind::Low, "0XdE").unwrap(), 0xDE);
        assert_eq!(parse_fuse_byte(FuseKind::Low, "0b00111111").unwrap(), 0x3F);
        assert_eq!(parse_fuse_byte(FuseKind::Low, "63").unwrap(), 0x3F);
        assert!(parse_fuse_byte(FuseKind::Low, "0x100").is_err());
        assert!(parse_fuse_byte(FuseKind::Low, "").is_err());
    }

    #[test]
    fn settings_follow_layouts() {
        assert_eq!(
            settings("atmega1284p"),
            Settings {
                uart: true,
                ckout: true,
                jtagen: true,
                cfd: false,
            }
        );
        assert_eq!(
            settings("atmega328pb"),
            Settings {
                uart: true,
                ckout: true,
                jtagen: false,
                cfd: true,
            }
        );
        assert_eq!(
            settings("atmega32"),
            Settings {
                uart: true,
                ckout: false,
                jtagen: true,
                cfd: false,
            }
        );
        assert_eq!(settings("attiny13a"), Settings::default());
    }

    fn board(toml: &str) -> BoardConfig {
        toml.parse().unwrap()
    }

    #[test]
    fn partial_override_calculates_the_rest() {
        let board = board(
            "[build]\nmcu = \"atmega328p\"\ncore = \"MiniCore\"\n\n[fuses]\nlfuse = \"0xE2\"\n",
        );

        assert_eq!(
            resolve(&board, FuseAction::SetFuses).unwrap(),
            FuseSet {
                lfuse: 0xE2,
                hfuse: 0xD6,
                efuse: Some(0xFD),
                lock: LockBits::Lock(0x0F),
            }
        );
    }

    #[test]
    fn invalid_override_is_rejected() {
        let board = board(
            "[build]\nmcu = \"atmega328p\"\ncore = \"MiniCore\"\n\n[fuses]\nlfuse = \"0x1FF\"\n",
        );

        assert!(matches!(
            resolve(&board, FuseAction::SetFuses),
            Err(Error::InvalidFuseValue { fuse: FuseKind::Low, .. })
        ));
    }

    #[test]
    fn lock_bits_override_for_set_fuses() {
        let board = board(
            "[build]\nmcu = \"atmega328p\"\ncore = \"MiniCore\"\n\n[fuses]\nlock_bits = \"0x3C\"\n",
        );

        let fuses = resolve(&board, FuseAction::SetFuses).unwrap();
        assert_eq!(fuses.lock, LockBits::Lock(0x3C));
    }

    #[test]
    fn lock_and_unlock_are_never_mixed() {
        let board = board(
            r#"
[build]
mcu = "atmega328p"
core = "MiniCore"

[fuses]
lock_bits = "0x2F"

[bootloader]
lock_bits = "0x0F"
"#,
        );

        let set = resolve(&board, FuseAction::SetFuses).unwrap();
        assert_eq!(set.lock, LockBits::Lock(0x2F));

        let burn = resolve(&board, FuseAction::BurnBootloader).unwrap();
        assert_eq!(burn.lock, LockBits::Unlock(DEFAULT_UNLOCK));
        assert_eq!(burn.to_map().last().unwrap().0, "unlock");

        for mcu in supported_mcus() {
            let board = board_for(mcu);
            assert!(matches!(
                resolve(&board, FuseAction::SetFuses).unwrap().lock,
                LockBits::Lock(_)
            ));
            assert_eq!(
                resolve(&board, FuseAction::BurnBootloader).unwrap().lock,
                LockBits::Unlock(0x3F)
            );
        }
    }

    fn board_for(mcu: &str) -> BoardConfig {
        board(&format!("[build]\nmcu = \"{mcu}\"\ncore = \"MegaCore\"\n"))
    }

    #[test]
    fn non_optiboot_bootloader_uses_configured_fuses_only() {
        let board = board(
            r#"
[build]
mcu = "atmega162"
core = "MajorCore"

[bootloader]
lfuse = "0xFF"
hfuse = "0xD6"
"#,
        );

        let burn = resolve(&board, FuseAction::BurnBootloader).unwrap();
        assert_eq!(burn.efuse, None);
        assert_eq!((burn.lfuse, burn.hfuse), (0xFF, 0xD6));

        // setting fuses still calculates for the same core
        let set = resolve(&board, FuseAction::SetFuses).unwrap();
        assert_eq!(set.efuse, Some(0xFB));
    }

    #[test]
    fn unknown_core_needs_low_and_high_fuse() {
        let board = board(
            "[build]\nmcu = \"atmega32u4\"\ncore = \"arduino\"\n\n[fuses]\nlfuse = \"0xFF\"\n",
        );

        assert!(matches!(
            resolve(&board, FuseAction::SetFuses),
            Err(Error::DynamicFusesUnsupported { section: "fuses", .. })
        ));
    }
}
