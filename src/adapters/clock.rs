//! Time adapters: monotonic clock, blocking delay, and the battery-
//! backed wall clock.
//!
//! The wall clock is an external RTC collaborator (DS3231 class) that
//! keeps local civil time across power cycles. Its reading is only
//! trusted inside a plausibility window — an unset RTC reports an epoch
//! long before this product existed, and publishing those timestamps
//! would poison the cloud history.

use log::warn;

use crate::app::ports::{ClockPort, DelayPort, WallClockPort};

#[cfg(not(target_os = "espidf"))]
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// 2020-01-01T00:00:00Z. Readings before this are an unset clock.
const MIN_PLAUSIBLE_UNIX_SECS: i64 = 1_577_836_800;

// ───────────────────────────────────────────────────────────────
// Monotonic clock
// ───────────────────────────────────────────────────────────────

/// Milliseconds since boot, from the high-resolution timer.
pub struct MonotonicClock {
    #[cfg(not(target_os = "espidf"))]
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ClockPort for MonotonicClock {
    #[cfg(target_os = "espidf")]
    fn now_ms(&self) -> u64 {
        // SAFETY: esp_timer_get_time is callable from any task context.
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() } / 1000) as u64
    }

    #[cfg(not(target_os = "espidf"))]
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

// ───────────────────────────────────────────────────────────────
// Blocking delay
// ───────────────────────────────────────────────────────────────

/// Task-yielding blocking delay.
pub struct SystemDelay;

impl DelayPort for SystemDelay {
    #[cfg(target_os = "espidf")]
    fn delay_ms(&mut self, ms: u32) {
        esp_idf_hal::delay::FreeRtos::delay_ms(ms);
    }

    #[cfg(not(target_os = "espidf"))]
    fn delay_ms(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }
}

// ───────────────────────────────────────────────────────────────
// Wall clock (external RTC)
// ───────────────────────────────────────────────────────────────

/// Wall-clock source with the plausibility guard applied.
///
/// On target the RTC chip seeds the system clock at boot (I2C read in
/// the board bring-up), so both backends read through the system time.
pub struct RtcClock;

impl RtcClock {
    fn raw_unix_secs(&self) -> Option<i64> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: time() with a null pointer only returns the value.
            let t = unsafe { esp_idf_svc::sys::time(core::ptr::null_mut()) };
            Some(t as i64)
        }

        #[cfg(not(target_os = "espidf"))]
        {
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .ok()
                .map(|d| d.as_secs() as i64)
        }
    }
}

impl WallClockPort for RtcClock {
    fn unix_time_secs(&self) -> Option<i64> {
        let t = self.raw_unix_secs()?;
        if t < MIN_PLAUSIBLE_UNIX_SECS {
            warn!("RtcClock: implausible reading {t}, treating as unset");
            return None;
        }
        Some(t)
    }
}
