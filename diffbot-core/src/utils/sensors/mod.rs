//! Wheel sensing.
//!
//! - `encoder`: sliding-window speed estimation from polled encoder ticks.

pub mod encoder;

pub use encoder::{SpeedEstimator, TickWindowSample, WINDOW_CAPACITY};
