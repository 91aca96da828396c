//! Board configuration
//!
//! A board file is a TOML document with the sections `[build]`, `[hardware]`,
//! `[fuses]`, `[bootloader]` and `[upload]`:
//!
//! ```toml
//! [build]
//! mcu = "atmega328p"
//! f_cpu = "16000000L"
//! core = "MiniCore"
//!
//! [hardware]
//! oscillator = "external"
//! bod = "2.7v"
//! uart = "uart0"
//!
//! [upload]
//! protocol = "usbasp"
//! ```
//!
//! Every key is optional; the hardware settings fall back to their documented
//! defaults when resolved through [BoardConfig::hardware].

use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
    str::FromStr,
};

use log::debug;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, VariantNames};

use crate::{
    error::TomlError,
    fuses::{parse_fuse_byte, FuseAction, FuseKind, DEFAULT_BOOTLOADER_LOCK},
    hardware::{parse_clock_speed, parse_setting, parse_switch, HardwareConfig},
    Error,
};

/// Cores whose fuse layouts are known, and can therefore be calculated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, VariantNames)]
pub enum Core {
    MiniCore,
    MegaCore,
    MightyCore,
    MajorCore,
    MicroCore,
}

impl Core {
    /// Whether bootloaders follow the Optiboot flash directory convention
    pub fn uses_optiboot(self) -> bool {
        matches!(self, Core::MiniCore | Core::MegaCore | Core::MightyCore)
    }
}

/// Build settings
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct BuildSection {
    /// Target MCU, e.g. `atmega328p`
    pub mcu: Option<String>,
    /// CPU frequency, e.g. `16000000L`
    pub f_cpu: Option<String>,
    /// Arduino core of the board
    pub core: Option<String>,
    /// Root directory of the framework package holding the bootloaders
    pub framework_dir: Option<PathBuf>,
}

/// Hardware settings as written in the board file
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct HardwareSection {
    pub oscillator: Option<String>,
    pub bod: Option<String>,
    pub uart: Option<String>,
    pub eesave: Option<String>,
    pub jtagen: Option<String>,
    pub ckout: Option<String>,
    pub cfd: Option<String>,
}

/// Explicit fuse values used when setting fuses
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct FusesSection {
    pub lfuse: Option<String>,
    pub hfuse: Option<String>,
    pub efuse: Option<String>,
    pub lock_bits: Option<String>,
}

/// Bootloader image and the fuses used when burning it
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct BootloaderSection {
    pub file: Option<PathBuf>,
    pub lfuse: Option<String>,
    pub hfuse: Option<String>,
    pub efuse: Option<String>,
    pub lock_bits: Option<String>,
    pub unlock_bits: Option<String>,
}

/// Programmer settings
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct UploadSection {
    /// avrdude programmer id, `custom` leaves it to `flags`
    pub protocol: Option<String>,
    /// Baud rate of the serial bootloader
    pub speed: Option<u32>,
    /// Port the programmer is connected to
    pub port: Option<String>,
    /// Extra arguments passed to avrdude
    #[serde(default)]
    pub flags: Vec<String>,
    /// avrdude executable
    pub avrdude: Option<String>,
    /// avrdude configuration file
    pub avrdude_conf: Option<PathBuf>,
}

/// A resolved board configuration
#[derive(Debug, Deserialize, Serialize, Default, Clone)]
pub struct BoardConfig {
    #[serde(default)]
    pub build: BuildSection,
    #[serde(default)]
    pub hardware: HardwareSection,
    pub fuses: Option<FusesSection>,
    pub bootloader: Option<BootloaderSection>,
    #[serde(default)]
    pub upload: UploadSection,
}

/// Explicit values found in the section belonging to a [FuseAction]
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FuseOverrides<'a> {
    pub lfuse: Option<&'a str>,
    pub hfuse: Option<&'a str>,
    pub efuse: Option<&'a str>,
    pub lock_bits: Option<&'a str>,
    pub unlock_bits: Option<&'a str>,
}

impl BoardConfig {
    /// Load a board file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let data = read_to_string(path)
            .map_err(|e| Error::FileOpenError(path.display().to_string(), e))?;

        let board: BoardConfig = data.parse()?;
        debug!("Board config from {}: {:#?}", path.display(), board);

        Ok(board)
    }

    /// The target MCU, lowercased
    pub fn mcu(&self) -> Result<String, Error> {
        non_empty(&self.build.mcu)
            .map(str::to_lowercase)
            .ok_or(Error::MissingMcu)
    }

    /// The configured core, if it is one with known fuse layouts
    pub fn core(&self) -> Option<Core> {
        non_empty(&self.build.core).and_then(|core| core.parse().ok())
    }

    /// Name of the configured core, as written in the board file
    pub fn core_name(&self) -> &str {
        non_empty(&self.build.core).unwrap_or("")
    }

    /// Resolve the hardware settings, applying the defaults for missing keys
    pub fn hardware(&self) -> Result<HardwareConfig, Error> {
        let hw = &self.hardware;
        let mut config = HardwareConfig::default();

        if let Some(f_cpu) = non_empty(&self.build.f_cpu) {
            config.f_cpu = parse_clock_speed(f_cpu)?;
        }
        if let Some(oscillator) = non_empty(&hw.oscillator) {
            config.oscillator = parse_setting("oscillator", oscillator)?;
        }
        if let Some(bod) = non_empty(&hw.bod) {
            config.bod = parse_setting("bod", bod)?;
        }
        if let Some(uart) = non_empty(&hw.uart) {
            config.uart = parse_setting("uart", uart)?;
        }
        if let Some(eesave) = non_empty(&hw.eesave) {
            config.eesave = parse_switch("eesave", eesave)?;
        }
        if let Some(jtagen) = non_empty(&hw.jtagen) {
            config.jtagen = parse_switch("jtagen", jtagen)?;
        }
        if let Some(ckout) = non_empty(&hw.ckout) {
            config.ckout = parse_switch("ckout", ckout)?;
        }
        if let Some(cfd) = non_empty(&hw.cfd) {
            config.cfd = parse_switch("cfd", cfd)?;
        }

        Ok(config)
    }

    /// Explicit fuse values for `action`; empty strings count as missing
    pub fn fuse_overrides(&self, action: FuseAction) -> FuseOverrides<'_> {
        match action {
            FuseAction::SetFuses => self
                .fuses
                .as_ref()
                .map(|fuses| FuseOverrides {
                    lfuse: non_empty(&fuses.lfuse),
                    hfuse: non_empty(&fuses.hfuse),
                    efuse: non_empty(&fuses.efuse),
                    lock_bits: non_empty(&fuses.lock_bits),
                    unlock_bits: None,
                })
                .unwrap_or_default(),
            FuseAction::BurnBootloader => self
                .bootloader
                .as_ref()
                .map(|bootloader| FuseOverrides {
                    lfuse: non_empty(&bootloader.lfuse),
                    hfuse: non_empty(&bootloader.hfuse),
                    efuse: non_empty(&bootloader.efuse),
                    lock_bits: non_empty(&bootloader.lock_bits),
                    unlock_bits: non_empty(&bootloader.unlock_bits),
                })
                .unwrap_or_default(),
        }
    }

    /// Lock bits written once a bootloader has been burned
    pub fn bootloader_lock_bits(&self) -> Result<u8, Error> {
        match self.fuse_overrides(FuseAction::BurnBootloader).lock_bits {
            Some(value) => parse_fuse_byte(FuseKind::Lock, value),
            None => Ok(DEFAULT_BOOTLOADER_LOCK),
        }
    }

    /// Framework directory holding the bootloader images
    pub fn framework_dir(&self) -> Option<&Path> {
        self.build.framework_dir.as_deref()
    }
}

impl FromStr for BoardConfig {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s).map_err(|e| TomlError::new(e, s.to_string()).into())
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}
