//! Monotonic clock adapter.
//!
//! Implements [`Clock`] for the sync engine.
//!
//! - **`target_os = "espidf"`** — wraps `esp_timer_get_time()` from the
//!   ESP-IDF high-resolution timer (microsecond precision, monotonic).
//! - **`not(target_os = "espidf")`** — uses `std::time::Instant` for
//!   host-side testing and simulation.
//!
//! [`Clock::delay_ms`] sleeps in slices and feeds the attached watchdog
//! between them, so a long reconnect backoff never trips the TWDT.

use std::time::Duration;

use crate::app::ports::Clock;
use crate::drivers::watchdog::Watchdog;

/// Longest single sleep between watchdog feeds.
const FEED_SLICE_MS: u32 = 1_000;

pub struct SystemClock {
    #[cfg(not(target_os = "espidf"))]
    start: std::time::Instant,
    watchdog: Option<Watchdog>,
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            #[cfg(not(target_os = "espidf"))]
            start: std::time::Instant::now(),
            watchdog: None,
        }
    }

    /// Feed `watchdog` while blocked in [`Clock::delay_ms`].
    pub fn with_watchdog(mut self, watchdog: Watchdog) -> Self {
        self.watchdog = Some(watchdog);
        self
    }

    pub fn feed_watchdog(&self) {
        if let Some(wd) = &self.watchdog {
            wd.feed();
        }
    }

    /// Microseconds since boot (monotonic).
    #[cfg(target_os = "espidf")]
    pub fn uptime_us(&self) -> u64 {
        // SAFETY: reads the free-running high-resolution timer.
        (unsafe { esp_idf_svc::sys::esp_timer_get_time() }) as u64
    }

    /// Microseconds since boot (monotonic).
    #[cfg(not(target_os = "espidf"))]
    pub fn uptime_us(&self) -> u64 {
        self.start.elapsed().as_micros() as u64
    }

    pub fn watchdog(&self) -> Option<&Watchdog> {
        self.watchdog.as_ref()
    }

    /// Sleep slice: at most half the watchdog timeout.
    fn slice_ms(&self) -> u32 {
        self.watchdog
            .as_ref()
            .map_or(FEED_SLICE_MS, |wd| (wd.timeout_ms() / 2).clamp(1, FEED_SLICE_MS))
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.uptime_us() / 1_000
    }

    fn delay_ms(&mut self, ms: u32) {
        let max_slice = self.slice_ms();
        let mut left = ms;
        while left > 0 {
            let slice = left.min(max_slice);
            std::thread::sleep(Duration::from_millis(u64::from(slice)));
            self.feed_watchdog();
            left -= slice;
        }
    }
}
