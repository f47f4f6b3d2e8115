// Volume enumeration
//
// The list is fetched fresh for every candidate path; firmware order is
// preserved and nothing is cached between calls.

use alloc::vec::Vec;

use log::debug;
use uefi_raw::Status;

use crate::error::{BootError, Result};
use crate::firmware::Firmware;

/// List every volume that exposes a file hierarchy, in firmware order.
///
/// An empty result is reported as `NoVolumes` so the caller can fold it into
/// its search outcome.
pub fn enumerate_volumes<F: Firmware>(firmware: &F) -> Result<Vec<F::Volume>> {
    let volumes = match firmware.locate_volumes() {
        Ok(volumes) => volumes,
        Err(BootError::Firmware(Status::NOT_FOUND)) => Vec::new(),
        Err(err) => return Err(err),
    };

    if volumes.is_empty() {
        return Err(BootError::NoVolumes);
    }

    debug!("Found {} file system volume(s)", volumes.len());
    Ok(volumes)
}
