//! Math utilities for the differential-drive robot.
//!
//! - `kinematics`: body motion ↔ wheel speed mapping for two-wheeled robots.
//! - `calibration`: per-wheel PWM ↔ angular velocity fit.

pub mod calibration;
pub mod kinematics;
