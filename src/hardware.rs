//! Hardware settings of a board
//!
//! These are the inputs of the fuse calculation. Board files carry them as
//! plain strings (`oscillator = "internal"`, `eesave = "no"`, ...); they are
//! parsed into the typed [HardwareConfig] once, so the calculator itself never
//! deals with unrecognized values.

use std::{fmt, str::FromStr};

use strum::{Display, EnumIter, EnumString, VariantNames};

use crate::Error;

/// Clock source driving the MCU
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    Hash,
    PartialEq,
    Eq,
    Display,
    EnumIter,
    EnumString,
    VariantNames,
)]
#[non_exhaustive]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Oscillator {
    /// External crystal or resonator
    #[default]
    External,
    /// Calibrated internal RC oscillator
    Internal,
    /// External clock signal on XTAL1
    ExternalClock,
}

/// Brown-out detection threshold
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    Hash,
    PartialEq,
    Eq,
    Display,
    EnumIter,
    EnumString,
    VariantNames,
)]
#[non_exhaustive]
#[strum(ascii_case_insensitive)]
pub enum BodLevel {
    #[strum(serialize = "4.3v")]
    _4V3,
    #[strum(serialize = "4.1v")]
    _4V1,
    #[strum(serialize = "4.0v")]
    _4V0,
    #[strum(serialize = "3.9v")]
    _3V9,
    #[strum(serialize = "3.8v")]
    _3V8,
    #[default]
    #[strum(serialize = "2.7v")]
    _2V7,
    #[strum(serialize = "2.6v")]
    _2V6,
    #[strum(serialize = "2.5v")]
    _2V5,
    #[strum(serialize = "1.8v")]
    _1V8,
    /// Brown-out detection turned off
    #[strum(to_string = "disabled", serialize = "none", serialize = "off")]
    Disabled,
}

/// UART used by the resident bootloader
///
/// [Uart::NoBootloader] doubles as "the chip has no bootloader", which gives the
/// whole program memory to the application.
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    Hash,
    PartialEq,
    Eq,
    Display,
    EnumIter,
    EnumString,
    VariantNames,
)]
#[non_exhaustive]
#[strum(ascii_case_insensitive)]
pub enum Uart {
    #[default]
    #[strum(serialize = "uart0")]
    Uart0,
    #[strum(serialize = "uart1")]
    Uart1,
    #[strum(serialize = "uart2")]
    Uart2,
    #[strum(serialize = "uart3")]
    Uart3,
    #[strum(serialize = "no_bootloader")]
    NoBootloader,
}

impl Uart {
    /// Whether a bootloader section is reserved in program memory
    pub fn has_bootloader(self) -> bool {
        self != Uart::NoBootloader
    }
}

/// CPU clock frequency, as given by `F_CPU`
///
/// Board files write it the way the compiler define is written, e.g.
/// `16000000L`; it is printed back in that form.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ClockSpeed(u32);

impl ClockSpeed {
    pub const fn from_hz(hz: u32) -> Self {
        ClockSpeed(hz)
    }

    pub fn hz(self) -> u32 {
        self.0
    }
}

impl Default for ClockSpeed {
    fn default() -> Self {
        ClockSpeed(16_000_000)
    }
}

impl fmt::Display for ClockSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}L", self.0)
    }
}

impl FromStr for ClockSpeed {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_uppercase();
        let digits = s
            .strip_suffix("UL")
            .or_else(|| s.strip_suffix('L'))
            .unwrap_or(&s);

        digits.parse().map(ClockSpeed)
    }
}

/// Hardware settings feeding the fuse calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareConfig {
    pub f_cpu: ClockSpeed,
    pub oscillator: Oscillator,
    pub bod: BodLevel,
    pub uart: Uart,
    /// Preserve EEPROM contents through chip erase
    pub eesave: bool,
    /// Enable the JTAG interface
    pub jtagen: bool,
    /// Output the system clock on the CLKO pin
    pub ckout: bool,
    /// Enable clock failure detection
    pub cfd: bool,
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            f_cpu: ClockSpeed::default(),
            oscillator: Oscillator::default(),
            bod: BodLevel::default(),
            uart: Uart::default(),
            eesave: true,
            jtagen: false,
            ckout: false,
            cfd: false,
        }
    }
}

/// Parse a named enum setting, reporting the accepted values on failure
pub(crate) fn parse_setting<T>(key: &'static str, value: &str) -> Result<T, Error>
where
    T: FromStr + VariantNames,
{
    value
        .trim()
        .parse()
        .map_err(|_| Error::InvalidHardwareSetting {
            key,
            value: value.to_string(),
            expected: format!("The accepted values are: {}", T::VARIANTS.join(", ")),
        })
}

/// Parse a `yes`/`no` switch
pub(crate) fn parse_switch(key: &'static str, value: &str) -> Result<bool, Error> {
    match value.trim().to_lowercase().as_str() {
        "yes" => Ok(true),
        "no" => Ok(false),
        _ => Err(Error::InvalidHardwareSetting {
            key,
            value: value.to_string(),
            expected: "The accepted values are: yes, no".into(),
        }),
    }
}

/// Parse the clock frequency setting
pub(crate) fn parse_clock_speed(value: &str) -> Result<ClockSpeed, Error> {
    value.parse().map_err(|_| Error::InvalidHardwareSetting {
        key: "f_cpu",
        value: value.to_string(),
        expected: "Expected a frequency in Hz, e.g. `16000000L`".into(),
    })
}
