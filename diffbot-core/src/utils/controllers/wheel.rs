//! Single wheel actuator.
//!
//! A wheel is driven by one H-bridge with a separate PWM channel per direction. At most
//! one of the two channels may carry a non-zero duty, so every direction change first
//! zeroes the channel that was active and only then drives the other one.
//!
//! The actuator also owns the wheel's [`SpeedEstimator`] and an optional [`MoveBound`]
//! which stops the wheel by itself after a number of encoder ticks or at a deadline.

use embedded_hal::digital::InputPin;
use serde::{Deserialize, Serialize};

use super::i2c::{MotorBus, WheelError};
use crate::utils::{
    config::EncoderConfig,
    math::calibration::{Calibration, CalibrationParams},
    sensors::encoder::SpeedEstimator,
    time::Clock,
};

/// Which side of the robot a wheel sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WheelSide {
    Left,
    Right,
}

impl WheelSide {
    /// Motor driver channels wired to this side.
    pub fn channels(self) -> MotorChannelPair {
        match self {
            WheelSide::Left => MotorChannelPair {
                forward: 5,
                reverse: 4,
            },
            WheelSide::Right => MotorChannelPair {
                forward: 3,
                reverse: 2,
            },
        }
    }
}

/// Forward and reverse PWM channel of one H-bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorChannelPair {
    pub forward: u8,
    pub reverse: u8,
}

/// Current drive direction of a wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    Forward,
    Reverse,
    /// Not driven; both channels are at zero.
    #[default]
    Undefined,
}

impl Direction {
    fn from_speed(omega: f32) -> Self {
        if omega > 0.0 {
            Direction::Forward
        } else if omega < 0.0 {
            Direction::Reverse
        } else {
            Direction::Undefined
        }
    }

    fn channel(
        self,
        pair: MotorChannelPair,
    ) -> Option<u8> {
        match self {
            Direction::Forward => Some(pair.forward),
            Direction::Reverse => Some(pair.reverse),
            Direction::Undefined => None,
        }
    }
}

/// Last state successfully written to the motor driver.
///
/// `Undefined` direction always comes with zero duty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ActuatorState {
    direction: Direction,
    pwm: u8,
}

impl ActuatorState {
    pub const STOPPED: ActuatorState = ActuatorState {
        direction: Direction::Undefined,
        pwm: 0,
    };

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn pwm(&self) -> u8 {
        self.pwm
    }
}

/// Self-termination condition of the current move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MoveBound {
    #[default]
    Unbounded,
    /// Stop after this many more encoder ticks.
    ByTicks(u32),
    /// Stop once `duration_us` has elapsed since `started_us`.
    ///
    /// Kept relative so durations up to the full `u32` range survive clock wraparound.
    ByTime { started_us: u32, duration_us: u32 },
}

/// Externally visible motion state of a wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MotionState {
    Stopped,
    MovingUnbounded,
    MovingBounded,
}

/// Outcome of a PWM write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Applied {
    /// Duty actually written.
    pub pwm: u8,
    /// The requested duty fell outside 0–255 and was clamped.
    pub clamped: bool,
}

fn clamp_pwm(raw: i32) -> Applied {
    let pwm = raw.clamp(0, u8::MAX as i32) as u8;
    Applied {
        pwm,
        clamped: pwm as i32 != raw,
    }
}

/// One wheel: H-bridge sequencing, speed estimation and bounded moves.
pub struct WheelActuator<B, P, C> {
    side: WheelSide,
    channels: MotorChannelPair,
    bus: B,
    sensor: P,
    clock: C,
    calibration: Calibration,
    encoder: SpeedEstimator,
    last_level: Option<bool>,
    state: ActuatorState,
    bound: MoveBound,
    target: Option<f32>,
    last_applied: Applied,
}

impl<B, P, C> WheelActuator<B, P, C>
where
    B: MotorBus,
    P: InputPin,
    C: Clock,
{
    /// Create the actuator. No bus traffic happens until [`Self::init`] or the first command.
    pub fn new(
        side: WheelSide,
        bus: B,
        sensor: P,
        clock: C,
        calibration: CalibrationParams,
        encoder: EncoderConfig,
    ) -> Self {
        Self {
            side,
            channels: side.channels(),
            bus,
            sensor,
            clock,
            calibration: Calibration::new(calibration),
            encoder: SpeedEstimator::new(encoder),
            last_level: None,
            state: ActuatorState::STOPPED,
            bound: MoveBound::Unbounded,
            target: None,
            last_applied: Applied::default(),
        }
    }

    /// Zero both channels and take the first encoder reading as reference level.
    pub fn init(&mut self) -> Result<(), WheelError<B::Error>> {
        self.last_level = self.sensor.is_high().ok();
        self.stop()
    }

    /// Drive at `omega` rad/s (sign selects direction) without touching the move bound.
    pub fn set_speed(
        &mut self,
        omega: f32,
    ) -> Result<Applied, WheelError<B::Error>> {
        let omega = if omega.is_nan() { 0.0 } else { omega };
        let direction = Direction::from_speed(omega);

        let applied = if direction == Direction::Undefined {
            self.zero_outputs()?;
            Applied::default()
        } else {
            let applied = clamp_pwm(self.calibration.angular_velocity_to_pwm(omega));
            if applied.clamped {
                tracing::debug!(side = ?self.side, omega, pwm = applied.pwm, "speed request clamped");
            }
            self.write_directed(direction, applied.pwm)?;
            applied
        };

        self.target = Some(omega);
        self.last_applied = applied;
        Ok(applied)
    }

    /// Move indefinitely until [`Self::stop`].
    pub fn move_at(
        &mut self,
        omega: f32,
    ) -> Result<Applied, WheelError<B::Error>> {
        let applied = self.set_speed(omega)?;
        self.bound = MoveBound::Unbounded;
        Ok(applied)
    }

    /// Move for `ticks` encoder ticks, adding to a tick bound that is still running.
    pub fn move_for_ticks(
        &mut self,
        omega: f32,
        ticks: u32,
    ) -> Result<Applied, WheelError<B::Error>> {
        let applied = self.set_speed(omega)?;
        let remaining = match self.bound {
            MoveBound::ByTicks(left) => left.saturating_add(ticks),
            _ => ticks,
        };
        if remaining == 0 {
            self.stop()?;
            return Ok(self.last_applied);
        }
        self.bound = MoveBound::ByTicks(remaining);
        Ok(applied)
    }

    /// Move for `duration_us`, extending a deadline that is still running.
    pub fn move_for_time(
        &mut self,
        omega: f32,
        duration_us: u32,
    ) -> Result<Applied, WheelError<B::Error>> {
        let applied = self.set_speed(omega)?;
        self.bound = match self.bound {
            MoveBound::ByTime {
                started_us,
                duration_us: running,
            } => MoveBound::ByTime {
                started_us,
                duration_us: running.saturating_add(duration_us),
            },
            _ => MoveBound::ByTime {
                started_us: self.clock.now_us(),
                duration_us,
            },
        };
        Ok(applied)
    }

    /// Stop immediately and drop any move bound.
    pub fn stop(&mut self) -> Result<(), WheelError<B::Error>> {
        self.bound = MoveBound::Unbounded;
        self.set_speed(0.0).map(|_| ())
    }

    /// Drive a raw signed duty, bypassing calibration. The sign picks the direction.
    ///
    /// The move is open loop: the speed target is cleared so the regulator leaves the
    /// wheel alone. Zero stops the wheel.
    pub fn move_pwm(
        &mut self,
        pwm: i32,
    ) -> Result<Applied, WheelError<B::Error>> {
        self.bound = MoveBound::Unbounded;
        let direction = if pwm > 0 {
            Direction::Forward
        } else if pwm < 0 {
            Direction::Reverse
        } else {
            Direction::Undefined
        };
        if direction == Direction::Undefined {
            return self.set_speed(0.0);
        }

        let applied = clamp_pwm(pwm.saturating_abs());
        if applied.clamped {
            tracing::debug!(side = ?self.side, pwm, "raw duty clamped");
        }
        self.write_directed(direction, applied.pwm)?;
        self.target = None;
        self.last_applied = applied;
        Ok(applied)
    }

    /// Write a raw duty in the current direction, bypassing calibration.
    ///
    /// A stopped wheel has no active channel, so it only accepts zero.
    pub fn apply_pwm(
        &mut self,
        pwm: i32,
    ) -> Result<Applied, WheelError<B::Error>> {
        let direction = self.state.direction;
        if direction == Direction::Undefined {
            return Ok(Applied {
                pwm: 0,
                clamped: pwm != 0,
            });
        }
        let applied = clamp_pwm(pwm);
        self.write_directed(direction, applied.pwm)?;
        self.last_applied = applied;
        Ok(applied)
    }

    /// Poll the encoder and complete the current bounded move if it is done.
    pub fn update(&mut self) -> Result<(), WheelError<B::Error>> {
        let now = self.clock.now_us();

        let edge = match self.sensor.is_high() {
            Ok(level) => matches!(self.last_level.replace(level), Some(prev) if prev != level),
            Err(e) => {
                tracing::warn!(side = ?self.side, error = ?e, "encoder read failed");
                false
            }
        };

        if edge {
            self.on_tick(now)?;
        } else {
            self.encoder.expire_stale(now);
        }

        if let MoveBound::ByTime {
            started_us,
            duration_us,
        } = self.bound
        {
            if now.wrapping_sub(started_us) >= duration_us {
                tracing::debug!(side = ?self.side, "timed move finished");
                self.stop()?;
            }
        }
        Ok(())
    }

    fn on_tick(
        &mut self,
        now: u32,
    ) -> Result<(), WheelError<B::Error>> {
        self.encoder.on_tick_edge(now);
        if let MoveBound::ByTicks(remaining) = self.bound {
            let remaining = remaining.saturating_sub(1);
            self.bound = MoveBound::ByTicks(remaining);
            if remaining == 0 {
                tracing::debug!(side = ?self.side, "tick move finished");
                self.stop()?;
            }
        }
        Ok(())
    }

    /// Drive `direction` at `pwm`, releasing the opposite channel first on a reversal.
    fn write_directed(
        &mut self,
        direction: Direction,
        pwm: u8,
    ) -> Result<(), WheelError<B::Error>> {
        let previous = self.state.direction;
        if previous != direction {
            if let Some(old) = previous.channel(self.channels) {
                tracing::debug!(side = ?self.side, from = ?previous, to = ?direction, "direction change");
                self.bus.write(old, 0).map_err(WheelError::BusError)?;
                self.state = ActuatorState::STOPPED;
            }
        }
        if let Some(channel) = direction.channel(self.channels) {
            self.bus.write(channel, pwm).map_err(WheelError::BusError)?;
            self.state = ActuatorState { direction, pwm };
        }
        Ok(())
    }

    fn zero_outputs(&mut self) -> Result<(), WheelError<B::Error>> {
        self.bus
            .write(self.channels.forward, 0)
            .map_err(WheelError::BusError)?;
        if self.state.direction == Direction::Forward {
            self.state = ActuatorState::STOPPED;
        }
        self.bus
            .write(self.channels.reverse, 0)
            .map_err(WheelError::BusError)?;
        self.state = ActuatorState::STOPPED;
        Ok(())
    }

    pub fn side(&self) -> WheelSide {
        self.side
    }

    pub fn state(&self) -> ActuatorState {
        self.state
    }

    pub fn bound(&self) -> MoveBound {
        self.bound
    }

    /// Last requested angular velocity, `None` until the first command.
    pub fn target(&self) -> Option<f32> {
        self.target
    }

    pub fn last_applied(&self) -> Applied {
        self.last_applied
    }

    pub fn calibration(&self) -> &Calibration {
        &self.calibration
    }

    /// Measured wheel speed magnitude in rad/s.
    pub fn speed_radsec(&self) -> f32 {
        self.encoder.speed_radsec()
    }

    /// Measured wheel speed in rad/s, signed by the driven direction.
    pub fn signed_speed_radsec(&self) -> f32 {
        match self.state.direction {
            Direction::Reverse => -self.encoder.speed_radsec(),
            _ => self.encoder.speed_radsec(),
        }
    }

    pub fn encoder(&self) -> &SpeedEstimator {
        &self.encoder
    }

    pub fn motion(&self) -> MotionState {
        match (self.bound, self.state.direction) {
            (MoveBound::Unbounded, Direction::Undefined) => MotionState::Stopped,
            (MoveBound::Unbounded, _) => MotionState::MovingUnbounded,
            _ => MotionState::MovingBounded,
        }
    }

    /// Both channels at zero, no pending bound and at least one command issued.
    pub fn is_stopped(&self) -> bool {
        self.target.is_some() && self.motion() == MotionState::Stopped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clamp_reports_out_of_range() {
        assert_eq!(clamp_pwm(-5), Applied { pwm: 0, clamped: true });
        assert_eq!(clamp_pwm(0), Applied { pwm: 0, clamped: false });
        assert_eq!(clamp_pwm(255), Applied { pwm: 255, clamped: false });
        assert_eq!(clamp_pwm(256), Applied { pwm: 255, clamped: true });
        assert_eq!(clamp_pwm(i32::MAX), Applied { pwm: 255, clamped: true });
        assert_eq!(clamp_pwm(i32::MIN), Applied { pwm: 0, clamped: true });
    }

    #[test]
    fn direction_follows_sign() {
        assert_eq!(Direction::from_speed(1.0), Direction::Forward);
        assert_eq!(Direction::from_speed(-0.1), Direction::Reverse);
        assert_eq!(Direction::from_speed(0.0), Direction::Undefined);
        assert_eq!(Direction::Undefined.channel(WheelSide::Left.channels()), None);
        assert_eq!(Direction::Reverse.channel(WheelSide::Right.channels()), Some(2));
    }
}
