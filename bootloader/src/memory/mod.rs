// Firmware pool buffers
//
// Every byte buffer the loader hands between stages is a pool allocation
// wrapped in `PoolBuffer`. Dropping the wrapper is the only way the
// allocation is returned, so each early return releases it exactly once.

use core::fmt;
use core::ptr::{self, NonNull};
use core::slice;

use crate::error::Result;
use crate::firmware::Firmware;

/// Owned, exactly-sized pool allocation
pub struct PoolBuffer<'fw, F: Firmware> {
    firmware: &'fw F,
    ptr: NonNull<u8>,
    len: usize,
}

/// Kernel file contents as read by the locator
pub type FileBuffer<'fw, F> = PoolBuffer<'fw, F>;

impl<'fw, F: Firmware> PoolBuffer<'fw, F> {
    /// Allocate `len` zeroed bytes from the firmware pool
    pub fn allocate(firmware: &'fw F, len: usize) -> Result<Self> {
        let ptr = firmware.allocate_pool(len)?;

        // Pool memory is uninitialized; never expose it as a slice before this.
        unsafe { ptr::write_bytes(ptr.as_ptr(), 0, len) };

        Ok(Self { firmware, ptr, len })
    }

    /// Take ownership of a buffer the firmware allocated on our behalf.
    ///
    /// # Safety
    ///
    /// `ptr` must be a live pool allocation of at least `len` initialized
    /// bytes that nothing else frees.
    pub unsafe fn from_raw(firmware: &'fw F, ptr: NonNull<u8>, len: usize) -> Self {
        Self { firmware, ptr, len }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    pub fn as_slice(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }
}

impl<F: Firmware> Drop for PoolBuffer<'_, F> {
    fn drop(&mut self) {
        unsafe { self.firmware.free_pool(self.ptr) };
    }
}

impl<F: Firmware> fmt::Debug for PoolBuffer<'_, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolBuffer")
            .field("ptr", &self.ptr)
            .field("len", &self.len)
            .finish()
    }
}
