// Boot configuration, compiled into the image

use core::time::Duration;

use crate::error::{BootError, Result};

/// Searched first on every volume
pub const PRIMARY_KERNEL_PATH: &str = "\\boot\\bzImage";
/// Searched only after the primary path failed on every volume
pub const FALLBACK_KERNEL_PATH: &str = "\\EFI\\Atlas\\vmlinuz.efi";
pub const BOOT_TIMEOUT: Duration = Duration::from_secs(5);
pub const KERNEL_CMDLINE: &str = "root=/dev/vda rw console=tty1 initrd=/boot/initramfs.cpio.gz";
pub const BANNER: &str = "Eos: Awakening Atlas...";

/// Kernel search paths in priority order
pub const KERNEL_PATHS: [&str; 2] = [PRIMARY_KERNEL_PATH, FALLBACK_KERNEL_PATH];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootConfig {
    pub kernel_paths: &'static [&'static str],
    pub timeout: Duration,
    pub cmdline: &'static str,
    pub banner: &'static str,
}

impl BootConfig {
    pub const DEFAULT: BootConfig = BootConfig {
        kernel_paths: &KERNEL_PATHS,
        timeout: BOOT_TIMEOUT,
        cmdline: KERNEL_CMDLINE,
        banner: BANNER,
    };

    /// Reject configurations the firmware could never satisfy.
    ///
    /// Paths must be volume-absolute and every string must survive UCS-2
    /// encoding with a single trailing NUL.
    pub fn validate(&self) -> Result<()> {
        if self.kernel_paths.is_empty() {
            return Err(BootError::KernelNotFound);
        }

        for path in self.kernel_paths {
            if !path.starts_with('\\') || !is_ucs2_text(path) {
                return Err(BootError::InvalidPath);
            }
        }

        if !is_ucs2_text(self.cmdline) {
            return Err(BootError::InvalidCommandLine);
        }

        Ok(())
    }

    pub fn has_timeout(&self) -> bool {
        !self.timeout.is_zero()
    }
}

impl Default for BootConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// True when `text` has no interior NUL and fits the Basic Multilingual Plane
pub fn is_ucs2_text(text: &str) -> bool {
    text.chars().all(|c| c != '\0' && (c as u32) <= 0xFFFF)
}
