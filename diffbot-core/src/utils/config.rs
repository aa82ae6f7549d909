//! Drive configuration.
//!
//! Everything here is loaded once at start-up and stays immutable afterwards. All sections
//! default independently, so a partial JSON document only overrides what it names.

use serde::{Deserialize, Serialize};

use crate::utils::math::{calibration::CalibrationParams, kinematics::RobotGeometry};

/// Wheel encoder parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncoderConfig {
    /// Level changes per full wheel revolution (20 slots, both edges).
    pub ticks_per_revolution: u16,
    /// Minimum spacing of samples in the speed window (µs).
    pub sampling_interval_us: u32,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            ticks_per_revolution: 40,
            sampling_interval_us: 10_000,
        }
    }
}

/// Proportional speed regulator parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegulatorConfig {
    /// PWM correction per rad/s of speed error.
    pub gain: f32,
    /// Time between regulation passes (µs).
    pub period_us: u32,
}

impl Default for RegulatorConfig {
    fn default() -> Self {
        Self {
            gain: 6.0,
            period_us: 1_000_000,
        }
    }
}

/// Complete configuration of the drive subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DriveConfig {
    #[serde(default)]
    pub geometry: RobotGeometry,
    #[serde(default)]
    pub encoder: EncoderConfig,
    #[serde(default)]
    pub regulator: RegulatorConfig,
    /// Left wheel calibration.
    #[serde(default)]
    pub left: CalibrationParams,
    /// Right wheel calibration.
    #[serde(default)]
    pub right: CalibrationParams,
}
