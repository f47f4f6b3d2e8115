//! Boot flow
//!
//! `INIT -> WAIT_TIMEOUT -> RESOLVING -> LOADING -> STARTING`. Successful
//! starts never come back; every other outcome ends in a status for the
//! firmware to act on.

use log::{error, info, warn};
use uefi_raw::Status;

use crate::config::BootConfig;
use crate::error::Result;
use crate::firmware::Firmware;
use crate::launcher::launch;
use crate::resolver::resolve_kernel;
use crate::timeout::wait_for_key_or_timeout;

/// Run the loader against `firmware` and return the status for the firmware.
pub fn run<F: Firmware>(firmware: &F, config: &BootConfig) -> Status {
    info!("{}", config.banner);

    match boot(firmware, config) {
        Ok(never) => match never {},
        Err(err) => {
            error!("Boot failed: {}", err);
            err.status()
        }
    }
}

fn boot<F: Firmware>(firmware: &F, config: &BootConfig) -> Result<core::convert::Infallible> {
    config.validate()?;

    if config.has_timeout() {
        if let Err(err) = wait_for_key_or_timeout(firmware, config.timeout) {
            warn!("Waiting for input failed ({}), continuing", err);
        }
    }

    let kernel = resolve_kernel(firmware, config.kernel_paths)?;
    launch(firmware, kernel, config.cmdline)
}
