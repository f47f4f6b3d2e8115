//! UEFI boot services backend
//!
//! Implements the firmware services context on top of `uefi::boot`. Only
//! compiled for UEFI targets.

use alloc::vec::Vec;
use core::fmt::Debug;
use core::ptr::{self, NonNull};
use core::time::Duration;

use log::{debug, warn};
use uefi::boot::{
    self, EventType, LoadImageSource, MemoryType, OpenProtocolAttributes, OpenProtocolParams,
    SearchType, TimerTrigger, Tpl,
};
use uefi::proto::loaded_image::LoadedImage;
use uefi::proto::media::file::{Directory, File, FileAttribute, FileInfo, FileMode, RegularFile};
use uefi::proto::media::fs::SimpleFileSystem;
use uefi::{CString16, Event, Handle, Identify, Status};
use uefi_raw::protocol::loaded_image::LoadedImageProtocol;

use super::{Firmware, ImageExit, ReadOnlyFile, VolumeRoot, Wake};
use crate::error::{BootError, Result};
use crate::timeout::relative_ticks;

impl<D: Debug> From<uefi::Error<D>> for BootError {
    fn from(err: uefi::Error<D>) -> Self {
        BootError::from(err.status())
    }
}

/// Boot services as seen from the running loader image
pub struct UefiFirmware {
    image: Handle,
}

impl UefiFirmware {
    /// `image` is the loader's own handle; it parents loaded images and
    /// owns the protocols we open.
    pub fn new(image: Handle) -> Self {
        Self { image }
    }
}

impl Firmware for UefiFirmware {
    type Volume = Handle;
    type Root = Directory;
    type Image = Handle;
    type Timer = Event;

    fn locate_volumes(&self) -> Result<Vec<Handle>> {
        let handles = boot::locate_handle_buffer(SearchType::ByProtocol(&SimpleFileSystem::GUID))?;
        Ok(handles.to_vec())
    }

    fn open_root(&self, volume: Handle) -> Result<Directory> {
        let mut fs = unsafe {
            boot::open_protocol::<SimpleFileSystem>(
                OpenProtocolParams {
                    handle: volume,
                    agent: self.image,
                    controller: None,
                },
                OpenProtocolAttributes::GetProtocol,
            )
        }?;
        Ok(fs.open_volume()?)
    }

    fn allocate_pool(&self, size: usize) -> Result<NonNull<u8>> {
        Ok(boot::allocate_pool(MemoryType::LOADER_DATA, size)?)
    }

    unsafe fn free_pool(&self, ptr: NonNull<u8>) {
        if let Err(err) = unsafe { boot::free_pool(ptr) } {
            warn!("Failed to free pool buffer: {:?}", err.status());
        }
    }

    fn load_image(&self, source: &[u8]) -> Result<Handle> {
        let image = boot::load_image(
            self.image,
            LoadImageSource::FromBuffer {
                buffer: source,
                file_path: None,
            },
        )?;
        Ok(image)
    }

    fn unload_image(&self, image: Handle) {
        if let Err(err) = boot::unload_image(image) {
            warn!("Failed to unload kernel image: {:?}", err.status());
        }
    }

    fn attach_load_options(&self, image: &Handle, device: Handle, options: &[u8]) -> Result<()> {
        let size = u32::try_from(options.len()).map_err(|_| BootError::InvalidCommandLine)?;
        let mut loaded = boot::open_protocol_exclusive::<LoadedImage>(*image)?;

        unsafe { loaded.set_load_options(options.as_ptr(), size) };

        // Images loaded from a buffer have no device; the kernel stub resolves
        // `initrd=` against it.
        let raw = ptr::from_mut::<LoadedImage>(&mut *loaded).cast::<LoadedImageProtocol>();
        unsafe { (*raw).device_handle = device.as_ptr() };

        Ok(())
    }

    fn start_image(&self, image: Handle) -> ImageExit {
        // `boot::start_image` drops exit data, so go through the raw table.
        let Some(system_table) = uefi::table::system_table_raw() else {
            return ImageExit {
                status: Status::NOT_READY,
                exit_data: None,
            };
        };

        let mut exit_data_size = 0usize;
        let mut exit_data: *mut u16 = ptr::null_mut();
        let status = unsafe {
            let boot_services = system_table.as_ref().boot_services;
            ((*boot_services).start_image)(image.as_ptr(), &mut exit_data_size, &mut exit_data)
        };

        ImageExit {
            status,
            exit_data: NonNull::new(exit_data.cast::<u8>()).map(|ptr| (ptr, exit_data_size)),
        }
    }

    fn create_timer(&self, timeout: Duration) -> Result<Event> {
        let event = unsafe { boot::create_event(EventType::TIMER, Tpl::APPLICATION, None, None) }?;

        if let Err(err) = boot::set_timer(&event, TimerTrigger::Relative(relative_ticks(timeout))) {
            self.close_timer(event);
            return Err(err.into());
        }

        Ok(event)
    }

    fn wait_for_key(&self, timer: Option<&Event>) -> Result<Wake> {
        let key = uefi::system::with_stdin(|stdin| stdin.wait_for_key_event())
            .ok_or(BootError::Firmware(Status::UNSUPPORTED))?;

        let mut events = Vec::with_capacity(2);
        events.push(key);
        if let Some(timer) = timer {
            events.push(unsafe { timer.unsafe_clone() });
        }

        let index = boot::wait_for_event(&mut events).map_err(|err| BootError::from(err.status()))?;
        if index != 0 {
            return Ok(Wake::Timeout);
        }

        // Swallow the key so it does not reach the kernel console
        if let Err(err) = uefi::system::with_stdin(|stdin| stdin.read_key()) {
            debug!("Failed to drain key press: {:?}", err.status());
        }
        Ok(Wake::KeyPress)
    }

    fn close_timer(&self, timer: Event) {
        if let Err(err) = boot::close_event(timer) {
            warn!("Failed to close timer event: {:?}", err.status());
        }
    }
}

impl VolumeRoot for Directory {
    type File = RegularFile;

    fn open_read(&mut self, path: &str) -> Result<RegularFile> {
        let path = CString16::try_from(path).map_err(|_| BootError::InvalidPath)?;
        let handle = self.open(&path, FileMode::Read, FileAttribute::empty())?;
        handle.into_regular_file().ok_or(BootError::NotRegularFile)
    }
}

impl ReadOnlyFile for RegularFile {
    fn query_size(&mut self, scratch: &mut [u8]) -> Result<u64> {
        match self.get_info::<FileInfo>(scratch) {
            Ok(info) => Ok(info.file_size()),
            Err(err) if err.status() == Status::BUFFER_TOO_SMALL => {
                Err(BootError::InfoBufferTooSmall {
                    required: *err.data(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        RegularFile::read(self, buf).map_err(|err| BootError::from(err.status()))
    }
}
