//! Kernel Resolver
//!
//! Drives the locator over every volume for each candidate path in priority
//! order. The first readable file wins; a later path is only tried once the
//! current one failed on all volumes.

use core::fmt;

use log::{debug, info, warn};

use crate::error::{BootError, Result};
use crate::firmware::Firmware;
use crate::locator::read_file;
use crate::memory::FileBuffer;
use crate::volume::enumerate_volumes;

/// Kernel bytes together with where they were found
pub struct ResolvedKernel<'fw, F: Firmware> {
    pub buffer: FileBuffer<'fw, F>,
    pub volume: F::Volume,
    pub path: &'static str,
}

impl<F: Firmware> ResolvedKernel<'_, F> {
    pub fn size(&self) -> usize {
        self.buffer.len()
    }
}

impl<F: Firmware> fmt::Debug for ResolvedKernel<'_, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedKernel")
            .field("path", &self.path)
            .field("volume", &self.volume)
            .field("size", &self.size())
            .finish()
    }
}

/// Search `candidates` across all volumes and return the first hit.
///
/// Fails with `KernelNotFound` once every path has been tried on every
/// volume. Errors that are not recoverable end the search immediately.
pub fn resolve_kernel<'fw, F: Firmware>(
    firmware: &'fw F,
    candidates: &[&'static str],
) -> Result<ResolvedKernel<'fw, F>> {
    for &path in candidates {
        let volumes = match enumerate_volumes(firmware) {
            Ok(volumes) => volumes,
            Err(err) if err.is_recoverable() => {
                warn!("Cannot search for {}: {}", path, err);
                continue;
            }
            Err(err) => return Err(err),
        };

        for &volume in &volumes {
            match read_file(firmware, volume, path) {
                Ok(buffer) => {
                    info!(
                        "Found kernel {} on volume {:?} ({} bytes)",
                        path,
                        volume,
                        buffer.len()
                    );
                    return Ok(ResolvedKernel {
                        buffer,
                        volume,
                        path,
                    });
                }
                Err(err) if err.is_recoverable() => {
                    debug!("{} not usable on {:?}: {}", path, volume, err);
                }
                Err(err) => return Err(err),
            }
        }

        warn!("{} not found on any of {} volume(s)", path, volumes.len());
    }

    Err(BootError::KernelNotFound)
}
