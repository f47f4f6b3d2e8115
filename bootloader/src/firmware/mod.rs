//! Firmware services context
//!
//! Every boot stage receives the firmware as an explicit `Firmware`
//! implementation instead of reaching for a global system table. The UEFI
//! implementation lives in `efi`; tests provide an in-memory one.

use alloc::vec::Vec;
use core::fmt;
use core::ptr::NonNull;
use core::time::Duration;

use uefi_raw::Status;

use crate::error::Result;

#[cfg(target_os = "uefi")]
pub mod efi;

/// Why the Timeout Gate stopped waiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    KeyPress,
    Timeout,
}

/// What a started image handed back when it returned control
#[derive(Debug)]
pub struct ImageExit {
    pub status: Status,
    /// Pool-allocated UCS-2 message and its size in bytes, owned by the caller
    pub exit_data: Option<(NonNull<u8>, usize)>,
}

/// Root directory of one volume's file hierarchy. Closed on drop.
pub trait VolumeRoot {
    type File: ReadOnlyFile;

    /// Open `path` read-only. Directories fail with `NotRegularFile`.
    fn open_read(&mut self, path: &str) -> Result<Self::File>;
}

/// A regular file opened for reading. Closed on drop.
pub trait ReadOnlyFile {
    /// Query the file size through the firmware's metadata call.
    ///
    /// `scratch` is 8-byte aligned. An undersized scratch fails with
    /// `InfoBufferTooSmall` carrying the size the firmware asked for.
    fn query_size(&mut self, scratch: &mut [u8]) -> Result<u64>;

    /// Read from the current position; `Ok(0)` means end of file.
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize>;
}

pub trait Firmware {
    type Volume: Copy + Eq + fmt::Debug;
    type Root: VolumeRoot;
    type Image;
    type Timer;

    /// Handles exposing a file hierarchy, in firmware order
    fn locate_volumes(&self) -> Result<Vec<Self::Volume>>;

    fn open_root(&self, volume: Self::Volume) -> Result<Self::Root>;

    fn allocate_pool(&self, size: usize) -> Result<NonNull<u8>>;

    /// # Safety
    ///
    /// `ptr` must come from `allocate_pool` (or a firmware-allocated buffer
    /// such as exit data) and must not be used or freed again.
    unsafe fn free_pool(&self, ptr: NonNull<u8>);

    fn load_image(&self, source: &[u8]) -> Result<Self::Image>;

    fn unload_image(&self, image: Self::Image);

    /// Set the load options of `image` and record `device` as the volume it
    /// came from. `options` must outlive the start of the image.
    fn attach_load_options(
        &self,
        image: &Self::Image,
        device: Self::Volume,
        options: &[u8],
    ) -> Result<()>;

    /// Transfer control to `image`. Only returns if the image gives control
    /// back.
    fn start_image(&self, image: Self::Image) -> ImageExit;

    /// Create a timer event armed to fire once after `timeout`
    fn create_timer(&self, timeout: Duration) -> Result<Self::Timer>;

    /// Block until a key is pressed or, when given, `timer` fires
    fn wait_for_key(&self, timer: Option<&Self::Timer>) -> Result<Wake>;

    fn close_timer(&self, timer: Self::Timer);
}
