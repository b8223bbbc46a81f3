//! ESP32 time adapter.
//!
//! Implements [`ClockPort`] for the controller.
//!
//! - **`target_os = "espidf"`**: monotonic time from `esp_timer_get_time()`;
//!   minute-of-day from the SNTP-synced wall clock via `localtime_r`.
//! - **`not(target_os = "espidf")`**: uses `std::time::Instant` for
//!   host-side testing and simulation; wall-clock time is never known.

use crate::app::ports::ClockPort;
use crate::clock::{Instant, MinuteOfDay};

/// Time adapter for the ESP32 platform.
#[derive(Clone, Copy)]
pub struct Esp32TimeAdapter {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
}

impl Default for Esp32TimeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Esp32TimeAdapter {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
        }
    }

    /// Milliseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn uptime_ms(&self) -> u64 {
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64 / 1_000
    }

    /// Milliseconds since boot (monotonic).
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }

    /// Local minute-of-day from the system clock. `None` if wall clock
    /// not synced (e.g. pre-NTP).
    #[cfg(target_os = "espidf")]
    pub fn current_minute(&self) -> Option<MinuteOfDay> {
        use core::ptr;
        let mut tv = esp_idf_svc::sys::timeval {
            tv_sec: 0,
            tv_usec: 0,
        };
        if unsafe { esp_idf_svc::sys::gettimeofday(&mut tv, ptr::null_mut()) } != 0 {
            return None;
        }
        // Reject obviously unsynced time (e.g. before 2020-01-01)
        const EPOCH_2020: i64 = 1_577_836_800;
        if (tv.tv_sec as i64) < EPOCH_2020 {
            return None;
        }
        let secs = tv.tv_sec as esp_idf_svc::sys::time_t;
        let mut tm: esp_idf_svc::sys::tm = unsafe { core::mem::zeroed() };
        if unsafe { esp_idf_svc::sys::localtime_r(&secs, &mut tm) }.is_null() {
            return None;
        }
        let hour = u8::try_from(tm.tm_hour).ok()?;
        let minute = u8::try_from(tm.tm_min).ok()?;
        MinuteOfDay::from_hm(hour, minute)
    }

    /// On non-ESP targets (simulation) always `None`.
    #[cfg(not(target_os = "espidf"))]
    pub fn current_minute(&self) -> Option<MinuteOfDay> {
        None
    }
}

impl ClockPort for Esp32TimeAdapter {
    fn now(&self) -> Instant {
        Instant::from_millis(self.uptime_ms())
    }

    fn minute_of_day(&self) -> Option<MinuteOfDay> {
        self.current_minute()
    }
}
