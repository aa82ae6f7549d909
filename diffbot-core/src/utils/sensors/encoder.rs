//! Tick-based wheel speed estimation.
//!
//! The encoder is a slotted disc read through a plain digital input. It is polled, not
//! interrupt driven, so the caller reports each observed level change through
//! [`SpeedEstimator::on_tick_edge`]. Edges that arrive faster than half the polling rate
//! are lost.
//!
//! Speed is computed over a short window of `(timestamp, cumulative ticks)` samples taken
//! more than one sampling interval apart. The window smooths the quantised tick stream at
//! the cost of a few sampling periods of latency.

use core::f32::consts::PI;

use heapless::Deque;

use crate::utils::{config::EncoderConfig, time::wrapping_diff};

/// Default number of samples kept in the speed window.
pub const WINDOW_CAPACITY: usize = 5;

/// One entry of the speed window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickWindowSample {
    pub timestamp_us: u32,
    /// Tick counter value when the sample was taken.
    pub ticks: u32,
}

/// Sliding-window angular velocity estimator for one wheel.
#[derive(Debug, Clone)]
pub struct SpeedEstimator<const N: usize = WINDOW_CAPACITY> {
    ticks_per_revolution: u16,
    sampling_interval_us: u32,
    tick_counter: u32,
    last_tick_us: Option<u32>,
    window: Deque<TickWindowSample, N>,
}

impl<const N: usize> SpeedEstimator<N> {
    pub fn new(config: EncoderConfig) -> Self {
        Self {
            ticks_per_revolution: config.ticks_per_revolution.max(1),
            sampling_interval_us: config.sampling_interval_us.max(1),
            tick_counter: 0,
            last_tick_us: None,
            window: Deque::new(),
        }
    }

    /// Longest gap between ticks before the window is considered stale.
    pub fn stale_after_us(&self) -> u32 {
        self.sampling_interval_us.saturating_mul(N as u32)
    }

    /// Record one observed level change at `now_us`.
    pub fn on_tick_edge(
        &mut self,
        now_us: u32,
    ) {
        let stale = match self.last_tick_us {
            Some(last) => self.is_stale(now_us, last),
            None => true,
        };
        self.last_tick_us = Some(now_us);

        if stale || self.window.is_empty() {
            self.tick_counter = 1;
            self.window.clear();
            self.push(now_us);
            return;
        }

        self.tick_counter = self.tick_counter.wrapping_add(1);
        let newest = self.window.back().map_or(now_us, |s| s.timestamp_us);
        if wrapping_diff(now_us, newest) > self.sampling_interval_us as i32 {
            self.push(now_us);
        }
    }

    /// Drop the window if no tick has been seen for longer than [`Self::stale_after_us`].
    ///
    /// Returns `true` when a reset happened.
    pub fn expire_stale(
        &mut self,
        now_us: u32,
    ) -> bool {
        match self.last_tick_us {
            Some(last) if self.is_stale(now_us, last) => {
                self.reset();
                true
            }
            _ => false,
        }
    }

    /// Forget all samples.
    pub fn reset(&mut self) {
        self.tick_counter = 0;
        self.last_tick_us = None;
        self.window.clear();
    }

    /// Estimated wheel angular velocity in rad/s (always non-negative).
    pub fn speed_radsec(&self) -> f32 {
        let (Some(oldest), Some(newest)) = (self.window.front(), self.window.back()) else {
            return 0.0;
        };
        let elapsed_us = wrapping_diff(newest.timestamp_us, oldest.timestamp_us).max(1);
        let ticks = newest.ticks.wrapping_sub(oldest.ticks) as f32;
        let revolutions = ticks / self.ticks_per_revolution as f32;
        revolutions * 2.0 * PI * 1_000_000.0 / elapsed_us as f32
    }

    /// Estimated rim speed in m/s for a wheel of the given radius.
    pub fn speed_msec(
        &self,
        wheel_radius: f32,
    ) -> f32 {
        self.speed_radsec() * wheel_radius
    }

    /// Ticks counted since the window was last restarted.
    pub fn tick_count(&self) -> u32 {
        self.tick_counter
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn window(&self) -> impl Iterator<Item = &TickWindowSample> {
        self.window.iter()
    }

    fn is_stale(
        &self,
        now_us: u32,
        last_us: u32,
    ) -> bool {
        let gap = wrapping_diff(now_us, last_us);
        gap < 0 || gap as u32 > self.stale_after_us()
    }

    fn push(
        &mut self,
        now_us: u32,
    ) {
        if self.window.is_full() {
            self.window.pop_front();
        }
        // Cannot fail, a slot was freed above.
        let _ = self.window.push_back(TickWindowSample {
            timestamp_us: now_us,
            ticks: self.tick_counter,
        });
    }
}
