//! Utility re-exports for the differential-drive robot.
//!
//! - `controllers`: wheel actuators, the wheel pair, and the drive controller
//! - `math`: differential-drive kinematics and PWM calibration
//! - `sensors`: encoder speed estimation
//! - `config`: start-up configuration
//! - `time`: wrapping microsecond clock

pub mod config;
pub mod controllers;
pub mod math;
pub mod sensors;
pub mod time;

pub use config::DriveConfig;
pub use controllers::{DriveChannel, DriveCommand, DriveController};
pub use embassy_time::{Duration, Instant, Ticker, Timer};
pub use time::{Clock, EmbassyClock};
