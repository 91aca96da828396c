use avrfuse::cli::{
    self, logging::initialize_logger, BoardArgs, BootloaderArgs, FusesArgs, ProgramArgs,
    UploadArgs,
};
use clap::{Parser, Subcommand};
use log::{debug, LevelFilter};
use miette::Result;

#[derive(Debug, Parser)]
#[command(about, max_term_width = 100, propagate_version = true, version)]
pub struct Cli {
    #[command(subcommand)]
    subcommand: Commands,

    /// Log level
    #[arg(long, global = true, default_value = "info", env = "AVRFUSE_LOG_LEVEL")]
    log_level: LevelFilter,

    /// Let avrdude report what it is doing
    #[arg(short = 'v', long, global = true)]
    verbose: bool,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Calculate the fuses of the board and program them
    ///
    /// Fuses given in the `[fuses]` section of the board file are used as-is,
    /// the remaining ones are calculated from the `[hardware]` settings for the
    /// MiniCore, MegaCore, MightyCore, MajorCore and MicroCore cores.
    Fuses(FusesArgs),
    /// Unlock the chip, set its fuses and burn the bootloader
    Bootloader(BootloaderArgs),
    /// Upload an image through the bootloader
    Upload(UploadArgs),
    /// Upload EEPROM contents through the bootloader
    UploadEeprom(UploadArgs),
    /// Flash an image with an external programmer
    Program(ProgramArgs),
    /// Print the target configuration and its fuses
    Show(BoardArgs),
}

fn main() -> Result<()> {
    miette::set_panic_hook();

    let args = Cli::parse();
    initialize_logger(args.log_level);
    debug!("{:#?}", args);

    match args.subcommand {
        Commands::Fuses(fuses_args) => cli::set_fuses(fuses_args, args.verbose),
        Commands::Bootloader(bootloader_args) => cli::burn_bootloader(bootloader_args, args.verbose),
        Commands::Upload(upload_args) => cli::upload(upload_args, args.verbose),
        Commands::UploadEeprom(upload_args) => cli::upload_eeprom(upload_args, args.verbose),
        Commands::Program(program_args) => cli::program(program_args, args.verbose),
        Commands::Show(board_args) => cli::show(board_args),
    }
}
