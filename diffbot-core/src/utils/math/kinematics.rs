//! Kinematics utilities for two-wheeled differential-drive robots.
//!
//! `RobotGeometry` maps a body motion (forward speed, yaw rate) onto the two wheels and
//! inverts measured wheel speeds back into body velocities.
//!
//! Conventions:
//! - linear speed in m/s, positive forward;
//! - angular speed in rad/s, positive counter-clockwise (turning left);
//! - the coupling constant `k` is `half_track_width`, so the rim speed of each wheel is
//!   `v ∓ half_track_width·ω`. Rim speeds become wheel angular velocities by dividing by
//!   `wheel_radius`.
//!
//! # Example
//! ```rust
//! use diffbot_core::utils::math::kinematics::RobotGeometry;
//! let geometry = RobotGeometry::new(0.075, 0.0335);
//! let rim = geometry.wheel_speeds(0.2, 1.0);
//! assert!(rim.right > rim.left);
//! ```

use core::f32::consts::PI;

use serde::{Deserialize, Serialize};

/// Wheel-base measurements of the robot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RobotGeometry {
    /// Half the distance between the wheel contact points (m).
    pub half_track_width: f32,
    /// Wheel radius (m).
    pub wheel_radius: f32,
}

impl Default for RobotGeometry {
    fn default() -> Self {
        // 150 mm track, 67 mm wheels.
        Self {
            half_track_width: 0.075,
            wheel_radius: 0.0335,
        }
    }
}

/// Per-wheel values, left and right.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct WheelTargets {
    pub left: f32,
    pub right: f32,
}

impl WheelTargets {
    pub const ZERO: WheelTargets = WheelTargets {
        left: 0.0,
        right: 0.0,
    };

    pub fn map(
        self,
        f: impl Fn(f32) -> f32,
    ) -> Self {
        WheelTargets {
            left: f(self.left),
            right: f(self.right),
        }
    }
}

impl RobotGeometry {
    pub fn new(
        half_track_width: f32,
        wheel_radius: f32,
    ) -> Self {
        Self {
            half_track_width,
            wheel_radius,
        }
    }

    /// Wheel circumference (m).
    pub fn wheel_circumference(&self) -> f32 {
        2.0 * PI * self.wheel_radius
    }

    /// Rim speed of each wheel (m/s) for the requested body motion.
    ///
    /// When driving backwards the yaw rate is mirrored before mixing and both results are
    /// negated afterwards, so a positive `angular` still turns the robot counter-clockwise.
    pub fn wheel_speeds(
        &self,
        linear: f32,
        angular: f32,
    ) -> WheelTargets {
        let reverse = linear < 0.0;
        let angular = if reverse { -angular } else { angular };
        let s = libm::fabsf(linear);
        let k = self.half_track_width;

        let targets = WheelTargets {
            left: s - k * angular,
            right: s + k * angular,
        };
        if reverse {
            targets.map(|v| -v)
        } else {
            targets
        }
    }

    /// Wheel angular velocities (rad/s) for the requested body motion.
    pub fn wheel_angular_velocities(
        &self,
        linear: f32,
        angular: f32,
    ) -> WheelTargets {
        let r = self.wheel_radius;
        self.wheel_speeds(linear, angular).map(|v| v / r)
    }

    /// Recover `(linear, angular)` body velocity from wheel angular velocities (rad/s).
    pub fn body_velocity(
        &self,
        wheels: WheelTargets,
    ) -> (f32, f32) {
        let left = wheels.left * self.wheel_radius;
        let right = wheels.right * self.wheel_radius;
        let angular = (right - left) / (2.0 * self.half_track_width);
        let linear = (left + right) / 2.0;
        (linear, angular)
    }

    /// Distance each wheel travels along its arc when pivoting in place by `angle` (rad).
    pub fn pivot_arc_length(
        &self,
        angle: f32,
    ) -> f32 {
        self.half_track_width * libm::fabsf(angle)
    }

    /// Wheel angular velocity (rad/s) that makes the robot pivot at `angular` rad/s.
    pub fn pivot_wheel_speed(
        &self,
        angular: f32,
    ) -> f32 {
        angular * self.half_track_width / self.wheel_radius
    }

    /// Convert a rim distance (m) into wheel rotation (rad).
    pub fn metres_to_radians(
        &self,
        metres: f32,
    ) -> f32 {
        metres / self.wheel_radius
    }

    /// Convert wheel rotation (rad) into rim distance (m).
    pub fn radians_to_metres(
        &self,
        radians: f32,
    ) -> f32 {
        radians * self.wheel_radius
    }
}
