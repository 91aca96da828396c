//! Fuse, bootloader and `avrdude` command calculation for AVR boards
//!
//! `avrfuse` takes a resolved board description (target MCU, clock speed,
//! oscillator, brown-out level, bootloader UART and a handful of feature
//! switches) and derives the fuse bytes and lock bits to program into the chip.
//! On top of that it selects the bootloader image to burn and assembles the
//! command lines for the external `avrdude` utility.
//!
//! The fuse calculation itself lives in [fuses] and is a set of pure functions.
//! Every fatal configuration problem is returned as an [Error]; deciding
//! whether to exit the process is left to the caller.
//!
//! ## Cargo Features
//!
//! - `cli`: Enables the command-line interface and its logger. This feature is
//!   enabled by default; disable it when only the library is needed.

#![cfg_attr(docsrs, feature(doc_cfg))]

pub use self::{
    board::{BoardConfig, Core},
    error::Error,
    fuses::{FuseAction, FuseKind, FuseSet, LockBits},
    hardware::{BodLevel, ClockSpeed, HardwareConfig, Oscillator, Uart},
};

pub mod board;
pub mod bootloader;
#[cfg(feature = "cli")]
#[cfg_attr(docsrs, doc(cfg(feature = "cli")))]
pub mod cli;
pub mod command;
pub mod error;
pub mod fuses;
pub mod hardware;
