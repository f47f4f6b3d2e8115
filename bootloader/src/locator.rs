//! File Locator
//!
//! Reads one candidate path from one volume into an exactly-sized pool
//! buffer. Directory and file handles are closed before returning and a
//! failed attempt leaves no allocation behind, so the resolver can move on to
//! the next volume without leaking.

use alloc::vec::Vec;

use log::debug;

use crate::error::{BootError, Result};
use crate::firmware::{Firmware, ReadOnlyFile, VolumeRoot};
use crate::memory::FileBuffer;

/// Initial metadata scratch size; `FileInfo` plus a long file name fits easily
pub const INFO_SCRATCH_SIZE: usize = 512;

/// Largest metadata size accepted on retry; a `FileInfo` is never near this
pub const MAX_INFO_SIZE: usize = 64 * 1024;

#[repr(C, align(8))]
struct InfoScratch([u8; INFO_SCRATCH_SIZE]);

/// Read `path` on `volume` into a freshly allocated buffer.
///
/// The returned buffer length equals the size the firmware reported for the
/// file.
pub fn read_file<'fw, F: Firmware>(
    firmware: &'fw F,
    volume: F::Volume,
    path: &str,
) -> Result<FileBuffer<'fw, F>> {
    let mut root = firmware.open_root(volume)?;
    let mut file = root.open_read(path)?;

    let size = query_file_size(&mut file)?;
    if size == 0 {
        return Err(BootError::EmptyFile);
    }
    let size = usize::try_from(size).map_err(|_| BootError::OutOfResources)?;

    let mut buffer = FileBuffer::allocate(firmware, size)?;
    read_exact(&mut file, buffer.as_mut_slice())?;

    debug!("Read {} bytes of {} from {:?}", size, path, volume);
    Ok(buffer)
}

/// Ask the firmware for the file size, retrying once with the size it
/// reports when the fixed scratch area is too small.
fn query_file_size<R: ReadOnlyFile>(file: &mut R) -> Result<u64> {
    let mut scratch = InfoScratch([0; INFO_SCRATCH_SIZE]);

    match file.query_size(&mut scratch.0) {
        Err(BootError::InfoBufferTooSmall {
            required: Some(required),
        }) if required > INFO_SCRATCH_SIZE => {
            if required > MAX_INFO_SIZE {
                return Err(BootError::InfoBufferTooSmall {
                    required: Some(required),
                });
            }
            debug!("File metadata needs {} bytes, retrying", required);

            // Over-allocate so the aligned window always fits
            let padded = required.checked_add(7).ok_or(BootError::OutOfResources)?;
            let mut retry = Vec::new();
            retry
                .try_reserve_exact(padded)
                .map_err(|_| BootError::OutOfResources)?;
            retry.resize(padded, 0u8);
            let offset = retry.as_ptr().align_offset(8);
            file.query_size(&mut retry[offset..offset + required])
        }
        result => result,
    }
}

fn read_exact<R: ReadOnlyFile>(file: &mut R, buf: &mut [u8]) -> Result<()> {
    let mut filled = 0;
    while filled < buf.len() {
        match file.read_chunk(&mut buf[filled..])? {
            0 => {
                return Err(BootError::ShortRead {
                    expected: buf.len(),
                    read: filled,
                });
            }
            n => filled += n,
        }
    }
    Ok(())
}
