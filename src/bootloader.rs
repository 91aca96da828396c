//! Bootloader image selection
//!
//! The Optiboot based cores (MiniCore, MegaCore and MightyCore) ship one
//! prebuilt image per MCU, UART, baud rate and clock speed, laid out as
//!
//! ```text
//! <framework>/bootloaders/optiboot_flash/bootloaders/<mcu>/<F_CPU>/
//!     optiboot_flash_<mcu>_<UART>_<speed>_<F_CPU>.hex
//! ```
//!
//! with a `_BIGBOOT.hex` variant for parts whose boot section is larger than
//! the default. Every other core names its image explicitly through
//! `bootloader.file`, either as a path of its own or relative to
//! `<framework>/bootloaders`.

use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::{
    board::BoardConfig,
    fuses::{has_bootloader_support, resolve, FuseAction, FuseSet},
    Error,
};

/// Baud rate the Optiboot images are named after when `upload.speed` is unset
pub const DEFAULT_UPLOAD_SPEED: u32 = 115_200;

/// Everything needed to burn a bootloader
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootloaderPlan {
    /// Image to flash
    pub image: PathBuf,
    /// Fuses written before the image, with the lock bits cleared
    pub fuses: FuseSet,
    /// Lock bits written after the image
    pub lock_bits: u8,
}

/// Select the bootloader image and fuses of `board`
///
/// `framework_dir` takes precedence over `build.framework_dir`.
pub fn plan(board: &BoardConfig, framework_dir: Option<&Path>) -> Result<BootloaderPlan, Error> {
    let mcu = board.mcu()?;
    let hw = board.hardware()?;

    if !has_bootloader_support(&mcu) || !hw.uart.has_bootloader() {
        return Err(Error::UnsupportedBootloader {
            mcu,
            core: board.core_name().to_string(),
        });
    }

    let optiboot = board.core().is_some_and(|core| core.uses_optiboot());
    if !optiboot {
        if board.bootloader.is_none() {
            return Err(Error::MissingBootloaderConfig);
        }
        let overrides = board.fuse_overrides(FuseAction::BurnBootloader);
        if overrides.lfuse.is_none() || overrides.hfuse.is_none() {
            return Err(Error::MissingBootloaderFuses);
        }
    }

    let fuses = resolve(board, FuseAction::BurnBootloader)?;
    let lock_bits = board.bootloader_lock_bits()?;

    let framework_dir = framework_dir.or_else(|| board.framework_dir());
    let explicit = board
        .bootloader
        .as_ref()
        .and_then(|section| section.file.as_deref())
        .filter(|file| !file.as_os_str().is_empty());

    let image = match explicit {
        Some(file) if file.is_file() => file.to_path_buf(),
        _ if optiboot => {
            let speed = board.upload.speed.unwrap_or(DEFAULT_UPLOAD_SPEED);
            optiboot_image(
                framework_dir.unwrap_or(Path::new("")),
                &mcu,
                &hw.uart.to_string(),
                speed,
                &hw.f_cpu.to_string(),
            )
        }
        Some(file) => framework_dir
            .unwrap_or(Path::new(""))
            .join("bootloaders")
            .join(file),
        None => {
            return Err(Error::UnsupportedBootloader {
                mcu,
                core: board.core_name().to_string(),
            })
        }
    };
    debug!("Bootloader image: {}", image.display());

    if !image.is_file() {
        return Err(Error::BootloaderNotFound(image));
    }
    info!("Using bootloader {}", image.display());

    Ok(BootloaderPlan {
        image,
        fuses,
        lock_bits,
    })
}

/// Path of the Optiboot image matching the given settings
///
/// Falls back to the `_BIGBOOT` variant when the regular image is missing; the
/// returned path is not guaranteed to exist.
pub fn optiboot_image(
    framework_dir: &Path,
    mcu: &str,
    uart: &str,
    speed: u32,
    f_cpu: &str,
) -> PathBuf {
    let uart = uart.to_uppercase();
    let f_cpu = f_cpu.to_uppercase();

    let dir = framework_dir
        .join("bootloaders")
        .join("optiboot_flash")
        .join("bootloaders")
        .join(mcu)
        .join(&f_cpu);
    let name = format!("optiboot_flash_{mcu}_{uart}_{speed}_{f_cpu}");

    let image = dir.join(format!("{name}.hex"));
    if image.is_file() {
        image
    } else {
        dir.join(format!("{name}_BIGBOOT.hex"))
    }
}
