//! Image Launcher
//!
//! Loads the resolved kernel through the firmware's image loader, attaches
//! the command line and starts it. A working kernel never gives control
//! back, so every return from this module is an error. The kernel buffer and
//! the command line stay alive until after the start call and are released
//! on every path that returns.

use alloc::string::String;
use core::convert::Infallible;

use log::{error, info};

use crate::cmdline::CommandLine;
use crate::error::{BootError, Result};
use crate::firmware::{Firmware, ImageExit};
use crate::memory::PoolBuffer;
use crate::resolver::ResolvedKernel;

/// Load `kernel`, hand it `cmdline` and jump to it.
///
/// Only returns if loading or starting failed.
pub fn launch<F: Firmware>(
    firmware: &F,
    kernel: ResolvedKernel<'_, F>,
    cmdline: &str,
) -> Result<Infallible> {
    let image = firmware
        .load_image(kernel.buffer.as_slice())
        .map_err(|err| BootError::LoadFailed(err.status()))?;
    info!("Kernel image loaded from {} ({} bytes)", kernel.path, kernel.size());

    let cmdline = match CommandLine::new(firmware, cmdline) {
        Ok(cmdline) => cmdline,
        Err(err) => {
            firmware.unload_image(image);
            return Err(err);
        }
    };

    if let Err(err) = firmware.attach_load_options(&image, kernel.volume, cmdline.as_bytes()) {
        firmware.unload_image(image);
        return Err(BootError::LoadFailed(err.status()));
    }

    info!("Jumping to Atlas...");
    let exit = firmware.start_image(image);

    // Control came back: the kernel did not take over the machine
    report_exit(firmware, exit)
}

fn report_exit<F: Firmware>(firmware: &F, exit: ImageExit) -> Result<Infallible> {
    match exit.exit_data {
        Some((ptr, len)) => {
            let message = unsafe { PoolBuffer::from_raw(firmware, ptr, len) };
            error!(
                "Kernel returned {:?}: {}",
                exit.status,
                decode_exit_message(message.as_slice())
            );
        }
        None => error!("Kernel returned {:?}", exit.status),
    }

    Err(BootError::KernelReturned {
        status: exit.status,
    })
}

/// Decode a NUL-terminated UCS-2 exit message, replacing invalid units
pub fn decode_exit_message(bytes: &[u8]) -> String {
    let units = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .take_while(|&unit| unit != 0);

    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}
