//! Eos Bootloader - UEFI entry point
//!
//! Initializes the UEFI console logger and runs the boot flow with the
//! compiled-in configuration. Only does anything useful when built for a
//! UEFI target.

#![cfg_attr(target_os = "uefi", no_std)]
#![cfg_attr(target_os = "uefi", no_main)]

#[cfg(target_os = "uefi")]
mod uefi_app {
    use eos_bootloader::firmware::efi::UefiFirmware;
    use eos_bootloader::{BootConfig, run};
    use log::info;
    use uefi::{Status, boot, entry};

    #[entry]
    fn main() -> Status {
        if let Err(err) = uefi::helpers::init() {
            return err.status();
        }

        info!(
            "Firmware: {} (revision {:#x})",
            uefi::system::firmware_vendor(),
            uefi::system::firmware_revision()
        );

        let firmware = UefiFirmware::new(boot::image_handle());
        run(&firmware, &BootConfig::DEFAULT)
    }
}

#[cfg(not(target_os = "uefi"))]
fn main() {
    eprintln!("eos bootloader is a UEFI application; build it with --target x86_64-unknown-uefi");
    std::process::exit(1);
}
