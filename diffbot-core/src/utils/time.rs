//! Microsecond time source used by the wheel control loop.
//!
//! Timestamps are `u32` microsecond counters that wrap roughly every 71 minutes,
//! so every comparison goes through [`Clock::diff`] instead of plain subtraction.

/// Monotonic microsecond clock with a wrapping counter.
pub trait Clock {
    /// Current time in microseconds. Wraps at `u32::MAX`.
    fn now_us(&self) -> u32;

    /// Signed difference `later - earlier` in microseconds, correct across one wraparound.
    fn diff(
        &self,
        later: u32,
        earlier: u32,
    ) -> i32 {
        wrapping_diff(later, earlier)
    }

    /// Microseconds elapsed since `earlier`.
    fn elapsed_since(
        &self,
        earlier: u32,
    ) -> i32 {
        self.diff(self.now_us(), earlier)
    }
}

/// Signed `later - earlier` for wrapping microsecond timestamps.
#[inline]
pub fn wrapping_diff(
    later: u32,
    earlier: u32,
) -> i32 {
    later.wrapping_sub(earlier) as i32
}

impl<T: Clock + ?Sized> Clock for &T {
    fn now_us(&self) -> u32 {
        (**self).now_us()
    }
}

/// [`Clock`] backed by the embassy time driver.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbassyClock;

impl Clock for EmbassyClock {
    #[inline]
    fn now_us(&self) -> u32 {
        embassy_time::Instant::now().as_micros() as u32
    }
}
