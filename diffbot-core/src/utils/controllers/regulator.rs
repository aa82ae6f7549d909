//! Proportional wheel speed regulator.
//!
//! The calibration gives a good first PWM guess; the regulator then nudges the duty once per
//! regulation period by `gain × (target − measured)`.

use super::wheel::Direction;
use crate::utils::config::RegulatorConfig;

/// A discrete P controller producing PWM corrections.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedRegulator {
    gain: f32,
    period_us: u32,
}

impl SpeedRegulator {
    pub fn new(config: RegulatorConfig) -> Self {
        Self {
            gain: config.gain,
            period_us: config.period_us,
        }
    }

    pub fn period_us(&self) -> u32 {
        self.period_us
    }

    /// PWM delta for a wheel driven in `direction`.
    ///
    /// `target` is signed (rad/s), `measured` is the encoder magnitude. The measurement takes
    /// the sign of the target, and the correction is mirrored when driving in reverse so it
    /// always acts on the duty of the active channel.
    pub fn correction(
        &self,
        target: f32,
        measured: f32,
        direction: Direction,
    ) -> i32 {
        let measured = if target < 0.0 { -measured } else { measured };
        let error = target - measured;
        let control = libm::roundf(self.gain * error) as i32;
        match direction {
            Direction::Reverse => -control,
            _ => control,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regulator() -> SpeedRegulator {
        SpeedRegulator::new(RegulatorConfig::default())
    }

    #[test]
    fn too_slow_forward_raises_duty() {
        assert_eq!(regulator().correction(10.0, 8.0, Direction::Forward), 12);
    }

    #[test]
    fn too_fast_forward_lowers_duty() {
        assert_eq!(regulator().correction(10.0, 11.5, Direction::Forward), -9);
    }

    #[test]
    fn reverse_correction_acts_on_magnitude() {
        assert_eq!(regulator().correction(-10.0, 8.0, Direction::Reverse), 12);
        assert_eq!(regulator().correction(-10.0, 12.0, Direction::Reverse), -12);
    }

    #[test]
    fn on_target_is_quiet() {
        assert_eq!(regulator().correction(7.25, 7.25, Direction::Forward), 0);
    }
}
