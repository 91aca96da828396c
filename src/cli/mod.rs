//! Types and functions for the command-line interface
//!
//! The contents of this module are intended for use with the `avrfuse`
//! command-line application, and are likely not of much use otherwise.
//!
//! Important note: the contents of this module are not covered by semver.

use std::path::PathBuf;

use clap::Args;
use log::{debug, info};
use miette::Result;

use self::config::load_board;
use crate::{
    board::BoardConfig,
    bootloader,
    command::AvrdudeCommand,
    fuses::{self, FuseAction, FuseSet},
    hardware::HardwareConfig,
};

pub mod config;
pub mod logging;

/// Board file selection
#[derive(Debug, Args)]
#[non_exhaustive]
pub struct BoardArgs {
    /// Board file, `avrfuse.toml` is searched for when omitted
    #[arg(short = 'b', long, env = "AVRFUSE_BOARD")]
    pub board: Option<PathBuf>,
}

/// Execution options shared by the actions running avrdude
#[derive(Debug, Args)]
#[non_exhaustive]
pub struct ExecArgs {
    /// Print the avrdude commands instead of running them
    #[arg(long)]
    pub dry_run: bool,
}

/// Set the fuses of the target
#[derive(Debug, Args)]
#[non_exhaustive]
pub struct FusesArgs {
    #[clap(flatten)]
    pub board_args: BoardArgs,
    #[clap(flatten)]
    pub exec_args: ExecArgs,
}

/// Burn a bootloader onto the target
#[derive(Debug, Args)]
#[non_exhaustive]
pub struct BootloaderArgs {
    #[clap(flatten)]
    pub board_args: BoardArgs,
    /// Framework package holding the bootloader images
    #[arg(long, env = "AVRFUSE_FRAMEWORK_DIR")]
    pub framework_dir: Option<PathBuf>,
    #[clap(flatten)]
    pub exec_args: ExecArgs,
}

/// Upload an image through the resident bootloader
#[derive(Debug, Args)]
#[non_exhaustive]
pub struct UploadArgs {
    /// Intel HEX image to upload
    pub image: PathBuf,
    /// Serial port of the target, overrides `upload.port`
    #[arg(short = 'P', long, env = "AVRFUSE_PORT")]
    pub port: Option<String>,
    #[clap(flatten)]
    pub board_args: BoardArgs,
    #[clap(flatten)]
    pub exec_args: ExecArgs,
}

/// Flash an image with an external programmer
#[derive(Debug, Args)]
#[non_exhaustive]
pub struct ProgramArgs {
    /// Intel HEX image to flash
    pub image: PathBuf,
    #[clap(flatten)]
    pub board_args: BoardArgs,
    #[clap(flatten)]
    pub exec_args: ExecArgs,
}

/// Calculate and program the fuses of the board
pub fn set_fuses(args: FusesArgs, verbose: bool) -> Result<()> {
    let board = load_board(args.board_args.board.as_deref())?;
    let fuses = resolve_fuses(&board, FuseAction::SetFuses)?;

    let command = AvrdudeCommand::fuses(&board, &fuses, verbose)?;
    execute(&[command], &args.exec_args)
}

/// Set the fuses for, and burn, the board's bootloader
pub fn burn_bootloader(args: BootloaderArgs, verbose: bool) -> Result<()> {
    let board = load_board(args.board_args.board.as_deref())?;
    if board.core().is_some() {
        print_target_configuration(&board.mcu()?, &board.hardware()?);
    }

    let plan = bootloader::plan(&board, args.framework_dir.as_deref())?;
    print_selected_fuses(&plan.fuses);
    println!("Bootloader: {}", plan.image.display());

    let commands = AvrdudeCommand::bootloader(&board, &plan, verbose)?;
    execute(&commands, &args.exec_args)
}

/// Upload firmware through the bootloader
pub fn upload(args: UploadArgs, verbose: bool) -> Result<()> {
    let board = load_board(args.board_args.board.as_deref())?;

    let command = AvrdudeCommand::upload(&board, &args.image, args.port.as_deref(), verbose)?;
    execute(&[command], &args.exec_args)
}

/// Upload EEPROM contents through the bootloader
pub fn upload_eeprom(args: UploadArgs, verbose: bool) -> Result<()> {
    let board = load_board(args.board_args.board.as_deref())?;

    let command =
        AvrdudeCommand::upload_eeprom(&board, &args.image, args.port.as_deref(), verbose)?;
    execute(&[command], &args.exec_args)
}

/// Flash firmware with an external programmer
pub fn program(args: ProgramArgs, verbose: bool) -> Result<()> {
    let board = load_board(args.board_args.board.as_deref())?;

    let command = AvrdudeCommand::program(&board, &args.image, verbose)?;
    execute(&[command], &args.exec_args)
}

/// Print the target configuration and its fuses without running anything
pub fn show(args: BoardArgs) -> Result<()> {
    let board = load_board(args.board.as_deref())?;
    resolve_fuses(&board, FuseAction::SetFuses)?;

    Ok(())
}

fn resolve_fuses(board: &BoardConfig, action: FuseAction) -> Result<FuseSet> {
    if board.core().is_some() {
        print_target_configuration(&board.mcu()?, &board.hardware()?);
    }

    let fuses = fuses::resolve(board, action)?;
    print_selected_fuses(&fuses);

    Ok(fuses)
}

fn execute(commands: &[AvrdudeCommand], args: &ExecArgs) -> Result<()> {
    for command in commands {
        if args.dry_run {
            println!("{command}");
        } else {
            command.run()?;
        }
    }

    if !args.dry_run {
        info!("Done");
    }

    Ok(())
}

/// Print the hardware settings the fuses of `mcu` are calculated from
pub fn print_target_configuration(mcu: &str, hw: &HardwareConfig) {
    println!("{}", target_configuration(mcu, hw));
}

/// Print the fuse bytes which are about to be written
pub fn print_selected_fuses(fuses: &FuseSet) {
    debug!("Resolved {fuses}");
    println!("\n{}", selected_fuses(fuses));
}

fn selected_fuses(fuses: &FuseSet) -> String {
    let values = fuses
        .to_map()
        .into_iter()
        .map(|(name, value)| format!("{name} = {value}"))
        .collect::<Vec<_>>();

    format!("Selected fuses: [{}]", values.join(", "))
}

fn target_configuration(mcu: &str, hw: &HardwareConfig) -> String {
    let settings = fuses::settings(mcu);
    let switch = |on: bool| if on { "yes" } else { "no" };

    let mut lines = vec![
        "\nTARGET CONFIGURATION:".to_string(),
        "---------------------".to_string(),
        format!("Target = {mcu}"),
        format!("Clock speed = {}", hw.f_cpu),
        format!("Oscillator = {}", hw.oscillator),
        format!("BOD level = {}", hw.bod),
        format!("Save EEPROM = {}", switch(hw.eesave)),
    ];
    if settings.uart {
        lines.push(format!("UART port = {}", hw.uart));
    }
    if settings.ckout {
        lines.push(format!("Clock output = {}", switch(hw.ckout)));
    }
    if settings.jtagen {
        lines.push(format!("JTAG enable = {}", switch(hw.jtagen)));
    }
    if settings.cfd {
        lines.push(format!("CFD enable = {}", switch(hw.cfd)));
    }
    lines.push("---------------------".to_string());

    lines.join("\n")
}
