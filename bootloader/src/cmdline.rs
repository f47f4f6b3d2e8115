// Kernel command line as UEFI load options
//
// The kernel's EFI stub reads its command line from the loaded image's load
// options as UCS-2 with a trailing NUL. The encoded copy lives in pool memory
// owned by `CommandLine` and must stay alive until the image has started.

use core::iter;

use crate::config::is_ucs2_text;
use crate::error::{BootError, Result};
use crate::firmware::Firmware;
use crate::memory::PoolBuffer;

pub struct CommandLine<'fw, F: Firmware> {
    buffer: PoolBuffer<'fw, F>,
}

impl<'fw, F: Firmware> CommandLine<'fw, F> {
    /// Copy `text` into pool memory as NUL-terminated UCS-2
    pub fn new(firmware: &'fw F, text: &str) -> Result<Self> {
        if !is_ucs2_text(text) {
            return Err(BootError::InvalidCommandLine);
        }

        let mut buffer = PoolBuffer::allocate(firmware, encoded_len(text))?;
        for (unit, out) in encode_units(text).zip(buffer.as_mut_slice().chunks_exact_mut(2)) {
            out.copy_from_slice(&unit.to_le_bytes());
        }

        Ok(Self { buffer })
    }

    /// Encoded bytes including the terminator
    pub fn as_bytes(&self) -> &[u8] {
        self.buffer.as_slice()
    }

    /// Size in bytes including the terminator
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

/// Byte length of `text` encoded as UCS-2 with one NUL terminator
pub fn encoded_len(text: &str) -> usize {
    (text.chars().count() + 1) * 2
}

fn encode_units(text: &str) -> impl Iterator<Item = u16> + '_ {
    text.chars().map(|c| c as u16).chain(iter::once(0))
}
