//! Linear PWM calibration for a single wheel.
//!
//! Each motor gets its own fit `pwm = a·ω + b`, taken from steady-state measurements of
//! wheel speed over a sweep of PWM values. The fit itself happens offline; this module
//! only evaluates it in both directions.

use serde::{Deserialize, Serialize};

/// Parameters of the linear PWM ↔ angular velocity fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationParams {
    /// Lowest PWM that still keeps the wheel turning.
    pub pwm_min: u8,
    /// Highest PWM used during the calibration sweep.
    pub pwm_max: u8,
    /// Slope `a` in PWM per rad/s.
    pub multiplier: f32,
    /// Offset `b` in PWM.
    pub shift: f32,
}

impl Default for CalibrationParams {
    fn default() -> Self {
        // Typical fit for the stock yellow TT gear motors.
        Self {
            pwm_min: 50,
            pwm_max: 255,
            multiplier: 12.5,
            shift: 30.0,
        }
    }
}

/// Evaluates a [`CalibrationParams`] fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    params: CalibrationParams,
}

impl Calibration {
    pub fn new(params: CalibrationParams) -> Self {
        Self { params }
    }

    /// PWM estimate for the requested wheel angular velocity.
    ///
    /// Direction is handled by the caller, so only `|ω|` is used. The result is not
    /// clamped into the duty range.
    pub fn angular_velocity_to_pwm(
        &self,
        omega: f32,
    ) -> i32 {
        if omega == 0.0 || omega.is_nan() {
            return 0;
        }
        let pwm = libm::roundf(self.params.multiplier * libm::fabsf(omega) + self.params.shift);
        // Saturating float-to-int cast keeps infinite requests representable.
        pwm as i32
    }

    /// Inverse of [`Self::angular_velocity_to_pwm`].
    pub fn pwm_to_angular_velocity(
        &self,
        pwm: i32,
    ) -> f32 {
        if pwm == 0 || self.params.multiplier == 0.0 {
            return 0.0;
        }
        (pwm as f32 - self.params.shift) / self.params.multiplier
    }

    /// Angular velocities reachable between `pwm_min` and `pwm_max`.
    pub fn speed_range(&self) -> (f32, f32) {
        (
            self.pwm_to_angular_velocity(self.params.pwm_min as i32),
            self.pwm_to_angular_velocity(self.params.pwm_max as i32),
        )
    }
}
