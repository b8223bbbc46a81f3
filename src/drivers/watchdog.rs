//! Control-loop supervision on the ESP-IDF task watchdog (TWDT).
//!
//! The TWDT is fed only when the loop reports a tick it has not reported
//! before, so a loop that keeps running without completing ticks still
//! trips it.  Ticks that take longer than the loop period are counted as
//! overruns and logged.
//!
//! On the host there is no TWDT; the bookkeeping is the same.

use core::time::Duration;

use log::{info, warn};

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::{
    ESP_OK, esp_task_wdt_add, esp_task_wdt_config_t, esp_task_wdt_reconfigure, esp_task_wdt_reset,
};

pub struct Watchdog {
    period: Duration,
    last_tick: Option<u64>,
    overruns: u32,
    #[cfg(target_os = "espidf")]
    subscribed: bool,
}

impl Watchdog {
    /// Subscribe the calling task with a `timeout_ms` budget.  `period` is
    /// the control-loop period used for overrun accounting.
    pub fn new(timeout_ms: u32, period: Duration) -> Self {
        #[cfg(target_os = "espidf")]
        let subscribed = {
            let cfg = esp_task_wdt_config_t {
                timeout_ms,
                idle_core_mask: 0,
                trigger_panic: true,
            };
            // SAFETY: plain FFI calls on the current task; no pointers are retained.
            let ret = unsafe { esp_task_wdt_reconfigure(&cfg) };
            if ret != ESP_OK {
                warn!("Watchdog: reconfigure returned {}", ret);
            }
            let ret = unsafe { esp_task_wdt_add(core::ptr::null_mut()) };
            if ret != ESP_OK {
                warn!("Watchdog: subscribe failed ({}), loop unsupervised", ret);
            }
            ret == ESP_OK
        };

        info!("Watchdog: {} ms budget, {} ms loop period", timeout_ms, period.as_millis());
        Self {
            period,
            last_tick: None,
            overruns: 0,
            #[cfg(target_os = "espidf")]
            subscribed,
        }
    }

    /// Report that tick number `tick_count` finished, `elapsed` after it
    /// started.  Returns whether the watchdog was fed.
    pub fn tick_completed(&mut self, tick_count: u64, elapsed: Duration) -> bool {
        if elapsed > self.period {
            self.overruns = self.overruns.saturating_add(1);
            warn!(
                "Watchdog: tick {} overran ({} ms > {} ms, {} total)",
                tick_count,
                elapsed.as_millis(),
                self.period.as_millis(),
                self.overruns
            );
        }
        if self.last_tick.is_some_and(|last| tick_count <= last) {
            return false;
        }
        self.last_tick = Some(tick_count);

        #[cfg(target_os = "espidf")]
        {
            if self.subscribed {
                // SAFETY: resets the TWDT entry of the subscribed current task.
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }
        true
    }

    pub fn overruns(&self) -> u32 {
        self.overruns
    }

    /// Stop feeding for good.  On the device the TWDT then resets the chip.
    pub fn starve(&self) -> ! {
        warn!("Watchdog: feeding stopped, waiting for reset");
        loop {
            std::thread::sleep(Duration::from_secs(1));
        }
    }
}
