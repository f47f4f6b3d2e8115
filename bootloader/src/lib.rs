//! Eos Bootloader Library
//!
//! Finds the Atlas kernel on any volume the firmware exposes, loads it with
//! the firmware image loader and hands over control with a fixed command
//! line. All boot stages are written against the `Firmware` trait; the UEFI
//! implementation is only built for UEFI targets.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

/// Bootloader error type and firmware status mapping
pub mod error;

/// Compiled-in boot configuration
pub mod config;

/// Firmware services context and its UEFI implementation
pub mod firmware;

/// Pool buffers released exactly once
pub mod memory;

/// Keypress/timer gate before automatic boot
pub mod timeout;

/// File system volume discovery
pub mod volume;

/// Reads one path from one volume
pub mod locator;

/// Kernel search over all volumes and candidate paths
pub mod resolver;

/// Command line as UEFI load options
pub mod cmdline;

/// Loads and starts the kernel image
pub mod launcher;

/// Whole-loader state machine
pub mod boot_flow;

pub use boot_flow::run;
pub use config::BootConfig;
pub use error::{BootError, Result};
pub use firmware::{Firmware, ImageExit, ReadOnlyFile, VolumeRoot, Wake};
