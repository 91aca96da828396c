//! Library and application errors

use std::{
    fmt::{Display, Formatter},
    io,
    iter::once,
    path::PathBuf,
};

use miette::{Diagnostic, LabeledSpan, SourceCode};
use strum::VariantNames;
use thiserror::Error;

use crate::{board::Core, fuses::FuseKind};

/// All possible errors returned by avrfuse
#[derive(Debug, Diagnostic, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("Couldn't calculate {fuse} for {mcu}")]
    #[diagnostic(
        code(avrfuse::unsupported_target),
        help("The fuse layout of this MCU is unknown. Specify the fuses explicitly in the board file")
    )]
    UnsupportedTarget { mcu: String, fuse: FuseKind },

    #[error("Dynamic fuses generation for {mcu} is not supported, no fuses given in [{section}]")]
    #[diagnostic(
        code(avrfuse::dynamic_fuses_unsupported),
        help("Please specify `lfuse` and `hfuse` in the board file, or use one of the cores: {}",
             Core::VARIANTS.join(", "))
    )]
    DynamicFusesUnsupported { mcu: String, section: &'static str },

    #[error("Burning a bootloader is not supported for {mcu} with core '{core}'")]
    #[diagnostic(
        code(avrfuse::unsupported_bootloader),
        help("Set `bootloader.file` to a bootloader image, or flash the application with an external programmer")
    )]
    UnsupportedBootloader { mcu: String, core: String },

    #[error("Missing bootloader configuration")]
    #[diagnostic(
        code(avrfuse::missing_bootloader_config),
        help("Add a [bootloader] section with `file`, `lfuse` and `hfuse` to the board file")
    )]
    MissingBootloaderConfig,

    #[error("Missing bootloader fuses")]
    #[diagnostic(
        code(avrfuse::missing_bootloader_fuses),
        help("Both `bootloader.lfuse` and `bootloader.hfuse` are required")
    )]
    MissingBootloaderFuses,

    #[error("Couldn't find bootloader image {}", .0.display())]
    #[diagnostic(
        code(avrfuse::bootloader_not_found),
        help("Check `bootloader.file` or pass the framework directory with `--framework-dir`")
    )]
    BootloaderNotFound(PathBuf),

    #[error("Invalid value '{value}' for `hardware.{key}`")]
    #[diagnostic(code(avrfuse::invalid_hardware_setting))]
    InvalidHardwareSetting {
        key: &'static str,
        value: String,
        #[help]
        expected: String,
    },

    #[error("Invalid {fuse} value '{value}'")]
    #[diagnostic(
        code(avrfuse::invalid_fuse_value),
        help("Fuse values are single bytes, written as `0x3F`, `0b00111111` or `63`")
    )]
    InvalidFuseValue { fuse: FuseKind, value: String },

    #[error("No target MCU configured")]
    #[diagnostic(
        code(avrfuse::missing_mcu),
        help("Set `build.mcu` in the board file")
    )]
    MissingMcu,

    #[error("Failed to open file: {0}")]
    #[diagnostic(code(avrfuse::file_open))]
    FileOpenError(String, #[source] io::Error),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Toml(#[from] TomlError),

    #[error(transparent)]
    IoError(#[from] io::Error),

    #[error("Failed to execute {tool}")]
    #[diagnostic(
        code(avrfuse::flashing_tool_spawn),
        help("Make sure avrdude is installed, or point `upload.avrdude` at the executable")
    )]
    FlashingToolSpawn {
        tool: String,
        #[source]
        source: io::Error,
    },

    #[error("{tool} failed with {}", exit_status(.code))]
    #[diagnostic(code(avrfuse::flashing_tool_failed))]
    FlashingToolFailed { tool: String, code: Option<i32> },
}

fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".into(),
    }
}

/// Board file parse error, labelled with the offending span
#[derive(Debug)]
pub struct TomlError {
    err: toml::de::Error,
    source: String,
}

impl TomlError {
    pub fn new(err: toml::de::Error, source: String) -> Self {
        TomlError { err, source }
    }
}

impl Display for TomlError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Failed to parse board configuration")
    }
}

// no `source` on purpose to prevent duplicating the message
impl std::error::Error for TomlError {}

impl Diagnostic for TomlError {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        Some(Box::new("avrfuse::toml"))
    }

    fn source_code(&self) -> Option<&dyn SourceCode> {
        Some(&self.source)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        let span = self.err.span()?;

        Some(Box::new(once(LabeledSpan::new(
            Some(self.err.message().to_string()),
            span.start,
            span.len(),
        ))))
    }
}
