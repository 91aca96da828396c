//! avrdude invocations
//!
//! Every action ends in one or more avrdude runs. The commands are built as
//! plain argument vectors so they can be printed in a dry run exactly as they
//! would be executed.

use std::{
    fmt,
    path::Path,
    process::{Command, Stdio},
};

use log::{debug, info, warn};

use crate::{
    board::BoardConfig,
    bootloader::BootloaderPlan,
    fuses::{has_bootloader_support, FuseByte, FuseKind, FuseSet},
    Error,
};

/// Executable used when `upload.avrdude` is unset
pub const AVRDUDE: &str = "avrdude";
/// Programmer id which leaves the programmer selection to `upload.flags`
const CUSTOM_PROTOCOL: &str = "custom";

/// A single avrdude run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvrdudeCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Short description of what the run does, e.g. `Setting fuses`
    pub description: String,
}

impl AvrdudeCommand {
    fn new(
        board: &BoardConfig,
        description: impl Into<String>,
        verbose: bool,
    ) -> Result<Self, Error> {
        let mcu = board.mcu()?;
        let upload = &board.upload;

        let mut args = Vec::new();
        if verbose {
            args.push("-v".to_string());
        }
        args.extend(["-p".to_string(), mcu]);
        if let Some(conf) = &upload.avrdude_conf {
            args.extend(["-C".to_string(), conf.display().to_string()]);
        }

        match upload.protocol.as_deref() {
            Some(CUSTOM_PROTOCOL) => warn!(
                "The `custom` upload protocol is used! The upload and fuse flags may \
                 conflict, make sure `upload.flags` selects the programmer"
            ),
            Some(protocol) if !protocol.is_empty() => {
                args.extend(["-c".to_string(), protocol.to_string()])
            }
            _ => {}
        }
        args.extend(upload.flags.iter().cloned());

        Ok(AvrdudeCommand {
            program: upload.avrdude.clone().unwrap_or_else(|| AVRDUDE.to_string()),
            args,
            description: description.into(),
        })
    }

    fn push_write(&mut self, memory: &str, value: impl fmt::Display, format: char) {
        self.args.push(format!("-U{memory}:w:{value}:{format}"));
    }

    /// Program `fuses`, lock bits first
    pub fn fuses(board: &BoardConfig, fuses: &FuseSet, verbose: bool) -> Result<Self, Error> {
        let mut command = Self::new(board, "Setting fuses", verbose)?;

        if has_bootloader_support(&board.mcu()?) {
            command.args.push("-e".to_string());
        }
        for (kind, value) in fuses.writes() {
            command.push_write(&kind.to_string(), FuseByte(value), 'm');
        }

        Ok(command)
    }

    /// Unlock and set the fuses, then flash the image and lock the boot section
    pub fn bootloader(
        board: &BoardConfig,
        plan: &BootloaderPlan,
        verbose: bool,
    ) -> Result<Vec<Self>, Error> {
        let fuses = Self::fuses(board, &plan.fuses, verbose)?;

        let mut flash = Self::new(board, "Uploading bootloader", verbose)?;
        flash.args.push("-e".to_string());
        flash.push_write("flash", plan.image.display(), 'i');
        flash.push_write(&FuseKind::Lock.to_string(), FuseByte(plan.lock_bits), 'm');

        Ok(vec![fuses, flash])
    }

    /// Upload firmware through the resident bootloader
    pub fn upload(
        board: &BoardConfig,
        hex: &Path,
        port: Option<&str>,
        verbose: bool,
    ) -> Result<Self, Error> {
        let description = format!("Uploading {}", hex.display());
        let mut command = Self::serial(board, description, port, verbose)?;
        command.args.push("-D".to_string());
        command.push_write("flash", hex.display(), 'i');

        Ok(command)
    }

    /// Upload EEPROM contents through the resident bootloader
    pub fn upload_eeprom(
        board: &BoardConfig,
        eep: &Path,
        port: Option<&str>,
        verbose: bool,
    ) -> Result<Self, Error> {
        let description = format!("Uploading {}", eep.display());
        let mut command = Self::serial(board, description, port, verbose)?;
        command.push_write("eeprom", eep.display(), 'i');

        Ok(command)
    }

    /// Flash firmware with an external programmer, erasing the chip
    pub fn program(board: &BoardConfig, hex: &Path, verbose: bool) -> Result<Self, Error> {
        let mut command = Self::new(board, format!("Programming {}", hex.display()), verbose)?;
        command.push_write("flash", hex.display(), 'i');

        Ok(command)
    }

    fn serial(
        board: &BoardConfig,
        description: String,
        port: Option<&str>,
        verbose: bool,
    ) -> Result<Self, Error> {
        let mut command = Self::new(board, description, verbose)?;

        if let Some(port) = port.or(board.upload.port.as_deref()) {
            command.args.extend(["-P".to_string(), port.to_string()]);
        }
        if let Some(speed) = board.upload.speed {
            command.args.extend(["-b".to_string(), speed.to_string()]);
        }

        Ok(command)
    }

    /// Run avrdude, blocking until it exits
    pub fn run(&self) -> Result<(), Error> {
        info!("{}", self.description);
        debug!("Running {self}");

        let status = Command::new(&self.program)
            .args(&self.args)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|source| Error::FlashingToolSpawn {
                tool: self.program.clone(),
                source,
            })?;

        if status.success() {
            Ok(())
        } else {
            Err(Error::FlashingToolFailed {
                tool: self.program.clone(),
                code: status.code(),
            })
        }
    }
}

impl fmt::Display for AvrdudeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", quote(&self.program))?;
        for arg in &self.args {
            write!(f, " {}", quote(arg))?;
        }

        Ok(())
    }
}

fn quote(arg: &str) -> String {
    if arg.chars().any(char::is_whitespace) {
        format!("\"{arg}\"")
    } else {
        arg.to_string()
    }
}
