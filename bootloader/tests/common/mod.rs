//! Common test utilities
//!
//! `FakeFirmware` is an in-memory firmware services context. It journals
//! every call, tracks live pool allocations (panicking on double free) and
//! counts open file handles and timers so tests can check that every
//! resource is released.

#![allow(dead_code)]

use std::alloc::{self, Layout};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap};
use std::ptr::NonNull;
use std::rc::Rc;
use std::time::Duration;

use eos_bootloader::{BootError, Firmware, ImageExit, ReadOnlyFile, Result, VolumeRoot, Wake};
use uefi_raw::Status;

/// Bytes the fake `FileInfo` needs unless a volume overrides it
pub const DEFAULT_INFO_SIZE: usize = 104;

/// Largest chunk a single fake read returns
const READ_CHUNK: usize = 1000;

/// Firmware call as seen by the fake
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    LocateVolumes,
    OpenRoot(usize),
    Open(usize, String),
    LoadImage(usize),
    UnloadImage,
    AttachOptions { device: usize, options: Vec<u8> },
    StartImage,
    CreateTimer(Duration),
    WaitForKey { with_timer: bool },
    CloseTimer,
}

#[derive(Debug, Clone)]
enum Entry {
    File(Vec<u8>),
    Dir,
}

/// One fake volume and the faults it injects
#[derive(Debug, Clone)]
pub struct FakeVolume {
    entries: BTreeMap<String, Entry>,
    open_root_error: Option<Status>,
    info_size: usize,
    info_unsized: bool,
    read_error: Option<Status>,
    truncate_to: Option<usize>,
}

impl FakeVolume {
    pub fn empty() -> Self {
        Self {
            entries: BTreeMap::new(),
            open_root_error: None,
            info_size: DEFAULT_INFO_SIZE,
            info_unsized: false,
            read_error: None,
            truncate_to: None,
        }
    }

    pub fn with_file(mut self, path: &str, contents: &[u8]) -> Self {
        self.entries
            .insert(path.to_string(), Entry::File(contents.to_vec()));
        self
    }

    pub fn with_dir(mut self, path: &str) -> Self {
        self.entries.insert(path.to_string(), Entry::Dir);
        self
    }

    pub fn failing_open_root(mut self, status: Status) -> Self {
        self.open_root_error = Some(status);
        self
    }

    /// Metadata needs `size` bytes of scratch
    pub fn with_info_size(mut self, size: usize) -> Self {
        self.info_size = size;
        self
    }

    /// Metadata calls fail as too small without reporting the needed size
    pub fn with_unsized_info(mut self) -> Self {
        self.info_unsized = true;
        self
    }

    pub fn failing_reads(mut self, status: Status) -> Self {
        self.read_error = Some(status);
        self
    }

    /// Files end after `len` bytes while still reporting their full size
    pub fn truncated(mut self, len: usize) -> Self {
        self.truncate_to = Some(len);
        self
    }
}

#[derive(Default)]
struct Shared {
    calls: RefCell<Vec<Call>>,
    live: RefCell<HashMap<usize, Layout>>,
    allocations: Cell<usize>,
    open_handles: Cell<usize>,
    live_timers: Cell<usize>,
    loaded: RefCell<Option<Vec<u8>>>,
}

impl Shared {
    fn record(&self, call: Call) {
        self.calls.borrow_mut().push(call);
    }

    fn raw_alloc(&self, size: usize) -> NonNull<u8> {
        let layout = Layout::from_size_align(size.max(1), 8).expect("valid layout");
        let ptr = NonNull::new(unsafe { alloc::alloc(layout) }).expect("host allocation");
        self.live.borrow_mut().insert(ptr.as_ptr() as usize, layout);
        ptr
    }
}

pub struct FakeFirmware {
    volumes: Vec<FakeVolume>,
    locate_error: Option<Status>,
    pool_limit: Option<usize>,
    fail_allocation: Option<usize>,
    timer_error: Option<Status>,
    key_pressed: bool,
    wait_error: Option<Status>,
    load_error: Option<Status>,
    attach_error: Option<Status>,
    exit_status: Status,
    exit_message: Option<String>,
    shared: Rc<Shared>,
}

impl FakeFirmware {
    pub fn new(volumes: Vec<FakeVolume>) -> Self {
        Self {
            volumes,
            locate_error: None,
            pool_limit: None,
            fail_allocation: None,
            timer_error: None,
            key_pressed: false,
            wait_error: None,
            load_error: None,
            attach_error: None,
            exit_status: Status::SUCCESS,
            exit_message: None,
            shared: Rc::new(Shared::default()),
        }
    }

    pub fn with_locate_error(mut self, status: Status) -> Self {
        self.locate_error = Some(status);
        self
    }

    /// Allocations larger than `limit` bytes fail
    pub fn with_pool_limit(mut self, limit: usize) -> Self {
        self.pool_limit = Some(limit);
        self
    }

    /// The `nth` allocation (1-based) fails
    pub fn failing_allocation(mut self, nth: usize) -> Self {
        self.fail_allocation = Some(nth);
        self
    }

    pub fn with_timer_error(mut self, status: Status) -> Self {
        self.timer_error = Some(status);
        self
    }

    pub fn with_key_press(mut self) -> Self {
        self.key_pressed = true;
        self
    }

    pub fn with_wait_error(mut self, status: Status) -> Self {
        self.wait_error = Some(status);
        self
    }

    pub fn with_load_error(mut self, status: Status) -> Self {
        self.load_error = Some(status);
        self
    }

    pub fn with_attach_error(mut self, status: Status) -> Self {
        self.attach_error = Some(status);
        self
    }

    /// What the started image returns with
    pub fn with_exit(mut self, status: Status, message: Option<&str>) -> Self {
        self.exit_status = status;
        self.exit_message = message.map(str::to_string);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.shared.calls.borrow().clone()
    }

    pub fn opens(&self) -> Vec<(usize, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Open(volume, path) => Some((volume, path)),
                _ => None,
            })
            .collect()
    }

    pub fn live_allocations(&self) -> usize {
        self.shared.live.borrow().len()
    }

    pub fn allocation_count(&self) -> usize {
        self.shared.allocations.get()
    }

    pub fn open_handles(&self) -> usize {
        self.shared.open_handles.get()
    }

    pub fn live_timers(&self) -> usize {
        self.shared.live_timers.get()
    }

    /// Bytes passed to the last `load_image` call
    pub fn loaded_image(&self) -> Option<Vec<u8>> {
        self.shared.loaded.borrow().clone()
    }

    pub fn attached_options(&self) -> Option<(usize, Vec<u8>)> {
        self.calls().into_iter().find_map(|call| match call {
            Call::AttachOptions { device, options } => Some((device, options)),
            _ => None,
        })
    }
}

impl Drop for FakeFirmware {
    fn drop(&mut self) {
        // Release anything a failing test leaked so the host heap stays sane
        for (addr, layout) in self.shared.live.borrow_mut().drain() {
            unsafe { alloc::dealloc(addr as *mut u8, layout) };
        }
    }
}

pub struct FakeImage;

pub struct FakeTimer;

pub struct FakeRoot {
    volume: usize,
    data: FakeVolume,
    shared: Rc<Shared>,
}

impl Drop for FakeRoot {
    fn drop(&mut self) {
        self.shared.open_handles.set(self.shared.open_handles.get() - 1);
    }
}

impl VolumeRoot for FakeRoot {
    type File = FakeFile;

    fn open_read(&mut self, path: &str) -> Result<FakeFile> {
        self.shared.record(Call::Open(self.volume, path.to_string()));

        match self.data.entries.get(path) {
            None => Err(BootError::Firmware(Status::NOT_FOUND)),
            Some(Entry::Dir) => Err(BootError::NotRegularFile),
            Some(Entry::File(contents)) => {
                let mut visible = contents.clone();
                if let Some(len) = self.data.truncate_to {
                    visible.truncate(len);
                }

                self.shared.open_handles.set(self.shared.open_handles.get() + 1);
                Ok(FakeFile {
                    reported_size: contents.len() as u64,
                    contents: visible,
                    position: 0,
                    info_size: self.data.info_size,
                    info_unsized: self.data.info_unsized,
                    read_error: self.data.read_error,
                    shared: Rc::clone(&self.shared),
                })
            }
        }
    }
}

pub struct FakeFile {
    reported_size: u64,
    contents: Vec<u8>,
    position: usize,
    info_size: usize,
    info_unsized: bool,
    read_error: Option<Status>,
    shared: Rc<Shared>,
}

impl Drop for FakeFile {
    fn drop(&mut self) {
        self.shared.open_handles.set(self.shared.open_handles.get() - 1);
    }
}

impl ReadOnlyFile for FakeFile {
    fn query_size(&mut self, scratch: &mut [u8]) -> Result<u64> {
        assert_eq!(scratch.as_ptr() as usize % 8, 0, "metadata scratch must be aligned");

        if self.info_unsized {
            return Err(BootError::InfoBufferTooSmall { required: None });
        }
        if scratch.len() < self.info_size {
            return Err(BootError::InfoBufferTooSmall {
                required: Some(self.info_size),
            });
        }
        Ok(self.reported_size)
    }

    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        if let Some(status) = self.read_error {
            return Err(BootError::Firmware(status));
        }

        let remaining = &self.contents[self.position..];
        let n = remaining.len().min(buf.len()).min(READ_CHUNK);
        buf[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        Ok(n)
    }
}

impl Firmware for FakeFirmware {
    type Volume = usize;
    type Root = FakeRoot;
    type Image = FakeImage;
    type Timer = FakeTimer;

    fn locate_volumes(&self) -> Result<Vec<usize>> {
        self.shared.record(Call::LocateVolumes);
        match self.locate_error {
            Some(status) => Err(BootError::Firmware(status)),
            None => Ok((0..self.volumes.len()).collect()),
        }
    }

    fn open_root(&self, volume: usize) -> Result<FakeRoot> {
        self.shared.record(Call::OpenRoot(volume));

        let data = &self.volumes[volume];
        if let Some(status) = data.open_root_error {
            return Err(BootError::Firmware(status));
        }

        self.shared.open_handles.set(self.shared.open_handles.get() + 1);
        Ok(FakeRoot {
            volume,
            data: data.clone(),
            shared: Rc::clone(&self.shared),
        })
    }

    fn allocate_pool(&self, size: usize) -> Result<NonNull<u8>> {
        let nth = self.shared.allocations.get() + 1;
        self.shared.allocations.set(nth);

        if self.fail_allocation == Some(nth) || self.pool_limit.is_some_and(|limit| size > limit) {
            return Err(BootError::OutOfResources);
        }
        Ok(self.shared.raw_alloc(size))
    }

    unsafe fn free_pool(&self, ptr: NonNull<u8>) {
        let layout = self
            .shared
            .live
            .borrow_mut()
            .remove(&(ptr.as_ptr() as usize))
            .expect("free_pool on a pointer that is not live");
        unsafe { alloc::dealloc(ptr.as_ptr(), layout) };
    }

    fn load_image(&self, source: &[u8]) -> Result<FakeImage> {
        self.shared.record(Call::LoadImage(source.len()));
        *self.shared.loaded.borrow_mut() = Some(source.to_vec());

        match self.load_error {
            Some(status) => Err(BootError::Firmware(status)),
            None => Ok(FakeImage),
        }
    }

    fn unload_image(&self, _image: FakeImage) {
        self.shared.record(Call::UnloadImage);
    }

    fn attach_load_options(&self, _image: &FakeImage, device: usize, options: &[u8]) -> Result<()> {
        self.shared.record(Call::AttachOptions {
            device,
            options: options.to_vec(),
        });

        match self.attach_error {
            Some(status) => Err(BootError::Firmware(status)),
            None => Ok(()),
        }
    }

    fn start_image(&self, _image: FakeImage) -> ImageExit {
        self.shared.record(Call::StartImage);

        let exit_data = self.exit_message.as_ref().map(|message| {
            let bytes: Vec<u8> = message
                .encode_utf16()
                .chain(std::iter::once(0))
                .flat_map(u16::to_le_bytes)
                .collect();
            let ptr = self.shared.raw_alloc(bytes.len());
            unsafe { std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.as_ptr(), bytes.len()) };
            (ptr, bytes.len())
        });

        ImageExit {
            status: self.exit_status,
            exit_data,
        }
    }

    fn create_timer(&self, timeout: Duration) -> Result<FakeTimer> {
        self.shared.record(Call::CreateTimer(timeout));

        if let Some(status) = self.timer_error {
            return Err(BootError::Firmware(status));
        }
        self.shared.live_timers.set(self.shared.live_timers.get() + 1);
        Ok(FakeTimer)
    }

    fn wait_for_key(&self, timer: Option<&FakeTimer>) -> Result<Wake> {
        self.shared.record(Call::WaitForKey {
            with_timer: timer.is_some(),
        });

        if let Some(status) = self.wait_error {
            return Err(BootError::Firmware(status));
        }
        // Without a timer the wait only ends on a key, so pretend one came
        if self.key_pressed || timer.is_none() {
            Ok(Wake::KeyPress)
        } else {
            Ok(Wake::Timeout)
        }
    }

    fn close_timer(&self, _timer: FakeTimer) {
        self.shared.record(Call::CloseTimer);
        self.shared.live_timers.set(self.shared.live_timers.get() - 1);
    }
}

/// `text` as UCS-2 little-endian bytes with one NUL terminator
pub fn ucs2_bytes(text: &str) -> Vec<u8> {
    text.encode_utf16()
        .chain(std::iter::once(0))
        .flat_map(u16::to_le_bytes)
        .collect()
}

/// Deterministic kernel-looking payload
pub fn payload(seed: u8, len: usize) -> Vec<u8> {
    (0..len).map(|i| seed.wrapping_add(i as u8)).collect()
}
