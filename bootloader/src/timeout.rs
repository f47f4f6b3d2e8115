//! Timeout Gate
//!
//! Gives the operator a short window before the automatic boot. The gate
//! returns on the first keypress or when the timer fires. If the firmware
//! cannot provide a timer the gate degrades to waiting for a keypress alone,
//! which keeps the loader from failing on timer exhaustion at the cost of an
//! unbounded wait.

use core::time::Duration;

use log::{info, warn};

use crate::error::Result;
use crate::firmware::{Firmware, Wake};

/// UEFI timers count in 100 ns units
const TICKS_PER_SECOND: u64 = 10_000_000;

/// Convert `timeout` to a relative UEFI timer trigger, saturating on overflow
pub fn relative_ticks(timeout: Duration) -> u64 {
    let ticks = timeout.as_nanos() / 100;
    u64::try_from(ticks).unwrap_or(u64::MAX)
}

/// Closes the timer event on every path out of the gate
struct ArmedTimer<'fw, F: Firmware> {
    firmware: &'fw F,
    timer: Option<F::Timer>,
}

impl<F: Firmware> Drop for ArmedTimer<'_, F> {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            self.firmware.close_timer(timer);
        }
    }
}

/// Block until a keypress or `timeout`, whichever comes first.
///
/// Returns an error only if the wait itself failed; callers boot anyway.
pub fn wait_for_key_or_timeout<F: Firmware>(firmware: &F, timeout: Duration) -> Result<Wake> {
    let armed = match firmware.create_timer(timeout) {
        Ok(timer) => ArmedTimer {
            firmware,
            timer: Some(timer),
        },
        Err(err) => {
            warn!("Timer unavailable ({}), waiting for a keypress", err);
            ArmedTimer {
                firmware,
                timer: None,
            }
        }
    };

    if armed.timer.is_some() {
        info!(
            "Press any key to boot now, booting automatically in {}s",
            timeout.as_secs()
        );
    } else {
        info!("Press any key to boot");
    }

    let wake = firmware.wait_for_key(armed.timer.as_ref())?;
    match wake {
        Wake::KeyPress => info!("Key pressed, booting"),
        Wake::Timeout => info!("Timeout reached, booting"),
    }

    Ok(wake)
}
