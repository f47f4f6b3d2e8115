//! Bootloader error handling
//!
//! This module defines the error types used throughout the bootloader
//! for consistent error reporting and handling.

use core::fmt;

use uefi_raw::Status;

/// Bootloader error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootError {
    /// A firmware service reported an error status
    Firmware(Status),

    /// Volume discovery errors
    NoVolumes,

    /// Per-attempt file errors
    NotRegularFile,
    InvalidPath,
    InfoBufferTooSmall { required: Option<usize> },
    EmptyFile,
    ShortRead { expected: usize, read: usize },

    /// A pool allocation failed
    OutOfResources,

    /// No volume/path combination yielded a readable kernel
    KernelNotFound,

    /// Firmware rejected the in-memory image
    LoadFailed(Status),

    /// Command line cannot be passed as load options
    InvalidCommandLine,

    /// Kernel unexpectedly returned
    KernelReturned { status: Status },
}

impl BootError {
    /// Status handed back to the firmware when this error ends the loader
    pub fn status(&self) -> Status {
        match self {
            BootError::Firmware(status) => *status,
            BootError::NoVolumes => Status::NOT_FOUND,
            BootError::NotRegularFile => Status::NOT_FOUND,
            BootError::InvalidPath => Status::INVALID_PARAMETER,
            BootError::InfoBufferTooSmall { .. } => Status::BUFFER_TOO_SMALL,
            BootError::EmptyFile => Status::LOAD_ERROR,
            BootError::ShortRead { .. } => Status::DEVICE_ERROR,
            BootError::OutOfResources => Status::OUT_OF_RESOURCES,
            BootError::KernelNotFound => Status::NOT_FOUND,
            BootError::LoadFailed(status) => *status,
            BootError::InvalidCommandLine => Status::INVALID_PARAMETER,
            BootError::KernelReturned { status } if status.is_error() => *status,
            BootError::KernelReturned { .. } => Status::ABORTED,
        }
    }

    /// Get a human-readable description of the error
    pub fn description(&self) -> &'static str {
        match self {
            BootError::Firmware(_) => "Firmware service failed",
            BootError::NoVolumes => "No volume exposes a file system",
            BootError::NotRegularFile => "Path is not a regular file",
            BootError::InvalidPath => "Path cannot be encoded as UCS-2",
            BootError::InfoBufferTooSmall { .. } => "File metadata exceeds the scratch buffer",
            BootError::EmptyFile => "File is empty",
            BootError::ShortRead { .. } => "File ended before its reported size",
            BootError::OutOfResources => "Failed to allocate memory",
            BootError::KernelNotFound => "Kernel not found",
            BootError::LoadFailed(_) => "Failed to load kernel",
            BootError::InvalidCommandLine => "Invalid kernel command line",
            BootError::KernelReturned { .. } => "Kernel unexpectedly returned",
        }
    }

    /// Check if this error is absorbed by the kernel search.
    ///
    /// Recoverable errors only end one volume/path attempt; everything else
    /// terminates the loader.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            BootError::Firmware(_)
                | BootError::NoVolumes
                | BootError::NotRegularFile
                | BootError::InvalidPath
                | BootError::InfoBufferTooSmall { .. }
                | BootError::EmptyFile
                | BootError::ShortRead { .. }
                | BootError::OutOfResources
        )
    }
}

impl fmt::Display for BootError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BootError::ShortRead { expected, read } => write!(
                f,
                "{} ({} of {} bytes, status: {:?})",
                self.description(),
                read,
                expected,
                self.status()
            ),
            BootError::InfoBufferTooSmall {
                required: Some(required),
            } => write!(
                f,
                "{} ({} bytes required, status: {:?})",
                self.description(),
                required,
                self.status()
            ),
            _ => write!(f, "{} (status: {:?})", self.description(), self.status()),
        }
    }
}

/// Result type used throughout the bootloader
pub type Result<T = ()> = core::result::Result<T, BootError>;

/// Convert firmware status to bootloader error
impl From<Status> for BootError {
    fn from(status: Status) -> Self {
        match status {
            Status::OUT_OF_RESOURCES => BootError::OutOfResources,
            _ => BootError::Firmware(status),
        }
    }
}
