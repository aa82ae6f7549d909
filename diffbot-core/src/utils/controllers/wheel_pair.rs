//! Both wheels of the differential drive.
//!
//! `WheelPair` turns body motion requests into per-wheel angular velocities, runs pivot
//! turns as tick-bounded moves, and closes the speed loop with a [`SpeedRegulator`] once per
//! regulation period.

use core::f32::consts::FRAC_PI_2;

use embedded_hal::digital::InputPin;

use super::{
    i2c::{MotorBus, WheelError},
    regulator::SpeedRegulator,
    wheel::{Direction, WheelActuator},
};
use crate::utils::{
    config::DriveConfig,
    math::kinematics::{RobotGeometry, WheelTargets},
    time::Clock,
};

pub struct WheelPair<B, L, R, C> {
    pub left: WheelActuator<B, L, C>,
    pub right: WheelActuator<B, R, C>,
    geometry: RobotGeometry,
    ticks_per_revolution: u16,
    regulator: SpeedRegulator,
    clock: C,
    last_regulation_us: u32,
}

impl<B, L, R, C> WheelPair<B, L, R, C>
where
    B: MotorBus,
    L: InputPin,
    R: InputPin,
    C: Clock,
{
    pub fn new(
        left: WheelActuator<B, L, C>,
        right: WheelActuator<B, R, C>,
        clock: C,
        config: &DriveConfig,
    ) -> Self {
        let last_regulation_us = clock.now_us();
        Self {
            left,
            right,
            geometry: config.geometry,
            ticks_per_revolution: config.encoder.ticks_per_revolution.max(1),
            regulator: SpeedRegulator::new(config.regulator),
            clock,
            last_regulation_us,
        }
    }

    /// Zero all motor outputs and latch the encoder reference levels.
    pub fn init(&mut self) -> Result<(), WheelError<B::Error>> {
        let left = self.left.init();
        let right = self.right.init();
        left.and(right)
    }

    /// Drive with `linear` m/s and `angular` rad/s until told otherwise.
    ///
    /// Returns the wheel angular velocities that were requested.
    pub fn move_at(
        &mut self,
        linear: f32,
        angular: f32,
    ) -> Result<WheelTargets, WheelError<B::Error>> {
        if linear == 0.0 && angular == 0.0 {
            self.stop()?;
            return Ok(WheelTargets::ZERO);
        }
        let targets = self.geometry.wheel_angular_velocities(linear, angular);
        tracing::debug!(linear, angular, left = targets.left, right = targets.right, "move");
        self.left.move_at(targets.left)?;
        self.right.move_at(targets.right)?;
        Ok(targets)
    }

    /// Drive with `linear`/`angular` for `duration_us`, then stop.
    pub fn move_for_time(
        &mut self,
        linear: f32,
        angular: f32,
        duration_us: u32,
    ) -> Result<WheelTargets, WheelError<B::Error>> {
        if linear == 0.0 && angular == 0.0 {
            self.stop()?;
            return Ok(WheelTargets::ZERO);
        }
        let targets = self.geometry.wheel_angular_velocities(linear, angular);
        self.left.move_for_time(targets.left, duration_us)?;
        self.right.move_for_time(targets.right, duration_us)?;
        Ok(targets)
    }

    /// Drive straight for `distance` metres at `linear` m/s; the sign of `linear` picks the
    /// direction.
    pub fn move_distance(
        &mut self,
        linear: f32,
        distance: f32,
    ) -> Result<WheelTargets, WheelError<B::Error>> {
        let ticks = self.ticks_for_distance(distance);
        if linear == 0.0 || ticks == 0 {
            self.stop()?;
            return Ok(WheelTargets::ZERO);
        }
        let targets = self.geometry.wheel_angular_velocities(linear, 0.0);
        self.left.move_for_ticks(targets.left, ticks)?;
        self.right.move_for_ticks(targets.right, ticks)?;
        Ok(targets)
    }

    /// Pivot a quarter turn in place at `angular_speed` rad/s.
    ///
    /// Positive speed turns counter-clockwise (left wheel back, right wheel forward).
    pub fn turn(
        &mut self,
        angular_speed: f32,
    ) -> Result<WheelTargets, WheelError<B::Error>> {
        let angle = if angular_speed < 0.0 { -FRAC_PI_2 } else { FRAC_PI_2 };
        self.rotate(angle, angular_speed)
    }

    /// Pivot in place by `angle` radians (positive counter-clockwise) at `angular_speed`
    /// rad/s. Only the magnitude of `angular_speed` is used.
    pub fn rotate(
        &mut self,
        angle: f32,
        angular_speed: f32,
    ) -> Result<WheelTargets, WheelError<B::Error>> {
        let arc = self.geometry.pivot_arc_length(angle);
        let ticks = self.ticks_for_distance(arc);
        if angular_speed == 0.0 || ticks == 0 {
            self.stop()?;
            return Ok(WheelTargets::ZERO);
        }
        let wheel = self.geometry.pivot_wheel_speed(libm::fabsf(angular_speed));
        let wheel = if angle < 0.0 { -wheel } else { wheel };
        let targets = WheelTargets {
            left: -wheel,
            right: wheel,
        };
        tracing::debug!(angle, ticks, wheel, "pivot");
        self.left.move_for_ticks(targets.left, ticks)?;
        self.right.move_for_ticks(targets.right, ticks)?;
        Ok(targets)
    }

    /// Stop both wheels. Skips the bus entirely when both are already stopped.
    pub fn stop(&mut self) -> Result<(), WheelError<B::Error>> {
        if self.is_stopped() {
            return Ok(());
        }
        let left = self.left.stop();
        let right = self.right.stop();
        left.and(right)
    }

    /// Zero both wheels unconditionally, whatever the cached state says.
    ///
    /// Used after a bus fault, when the last written state may not match the driver.
    pub fn force_stop(&mut self) -> Result<(), WheelError<B::Error>> {
        let left = self.left.stop();
        let right = self.right.stop();
        left.and(right)
    }

    pub fn is_stopped(&self) -> bool {
        self.left.is_stopped() && self.right.is_stopped()
    }

    /// Poll both encoders, complete finished moves, and regulate once per period.
    pub fn update(&mut self) -> Result<(), WheelError<B::Error>> {
        let left = self.left.update();
        let right = self.right.update();
        left.and(right)?;

        let now = self.clock.now_us();
        if self.clock.diff(now, self.last_regulation_us) >= self.regulator.period_us() as i32 {
            self.last_regulation_us = now;
            self.regulate()?;
        }
        Ok(())
    }

    /// Apply one proportional correction to every wheel with a non-zero target.
    pub fn regulate(&mut self) -> Result<(), WheelError<B::Error>> {
        let regulator = self.regulator;
        if let Some(pwm) = correct(&regulator, &self.left) {
            self.left.apply_pwm(pwm)?;
        }
        if let Some(pwm) = correct(&regulator, &self.right) {
            self.right.apply_pwm(pwm)?;
        }
        Ok(())
    }

    /// Encoder ticks covering `distance` metres of rim travel.
    pub fn ticks_for_distance(
        &self,
        distance: f32,
    ) -> u32 {
        let revolutions = libm::fabsf(distance) / self.geometry.wheel_circumference();
        libm::roundf(revolutions * self.ticks_per_revolution as f32) as u32
    }

    pub fn geometry(&self) -> &RobotGeometry {
        &self.geometry
    }

    pub fn left_speed_radsec(&self) -> f32 {
        self.left.speed_radsec()
    }

    pub fn right_speed_radsec(&self) -> f32 {
        self.right.speed_radsec()
    }

    /// Measured `(linear, angular)` body velocity, for telemetry.
    pub fn measured_body_velocity(&self) -> (f32, f32) {
        self.geometry.body_velocity(WheelTargets {
            left: self.left.signed_speed_radsec(),
            right: self.right.signed_speed_radsec(),
        })
    }
}

/// New raw PWM for `wheel`, if it has something to regulate.
fn correct<B, P, C>(
    regulator: &SpeedRegulator,
    wheel: &WheelActuator<B, P, C>,
) -> Option<i32>
where
    B: MotorBus,
    P: InputPin,
    C: Clock,
{
    let target = wheel.target().filter(|t| *t != 0.0)?;
    let state = wheel.state();
    if state.direction() == Direction::Undefined {
        return None;
    }
    let measured = wheel.speed_radsec();
    let delta = regulator.correction(target, measured, state.direction());
    tracing::debug!(side = ?wheel.side(), target, measured, delta, "regulate");
    Some(state.pwm() as i32 + delta)
}
