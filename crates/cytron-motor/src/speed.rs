//! Speed-to-duty computation shared by every signaling mode.
//!
//! Nothing here touches a pin. The driver turns a request into a
//! [`SpeedCommand`] first and only then decides which pins to drive.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Largest speed magnitude accepted by the driver. Requests beyond it are clamped.
pub const MAX_SPEED: i16 = 255;

/// Duty cycle applied at [`MAX_SPEED`].
pub const MAX_DUTY_PERCENT: f32 = 100.0;

/// Rotation direction derived from the sign of a speed.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Zero or positive speed.
    #[default]
    Forward,
    /// Negative speed.
    Reverse,
}

impl Direction {
    /// Direction for a signed speed. Zero counts as forward.
    pub const fn of(speed: i16) -> Self {
        if speed >= 0 { Direction::Forward } else { Direction::Reverse }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Forward => write!(f, "forward"),
            Direction::Reverse => write!(f, "reverse"),
        }
    }
}

/// Clamp a raw speed request into `[-MAX_SPEED, MAX_SPEED]`.
pub fn clamp_speed(speed: i32) -> i16 {
    speed.clamp(-(MAX_SPEED as i32), MAX_SPEED as i32) as i16
}

/// Duty cycle percentage for a speed magnitude in `[0, MAX_SPEED]`.
///
/// Magnitudes above [`MAX_SPEED`] saturate at [`MAX_DUTY_PERCENT`].
pub fn duty_percent(magnitude: u16) -> f32 {
    let magnitude = magnitude.min(MAX_SPEED as u16);
    magnitude as f32 * MAX_DUTY_PERCENT / MAX_SPEED as f32
}

/// Convert a normalized speed into a raw speed.
///
/// The input is clamped to `[-1.0, 1.0]`, scaled by [`MAX_SPEED`] and
/// rounded half away from zero, so `0.5` becomes `128`. `NaN` is treated
/// as a stop request.
pub fn normalized_to_raw(speed: f32) -> i32 {
    if speed.is_nan() {
        return 0;
    }
    (speed.clamp(-1.0, 1.0) * MAX_SPEED as f32).round() as i32
}

/// A fully resolved speed request: clamped speed, direction and duty cycle.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpeedCommand {
    /// Clamped signed speed in `[-255, 255]`.
    pub speed: i16,
    /// Direction selected by the sign of `speed`.
    pub direction: Direction,
    /// Duty cycle in `[0.0, 100.0]`, proportional to `|speed|`.
    pub duty_percent: f32,
}

impl SpeedCommand {
    /// Resolve a raw speed request of any magnitude.
    pub fn from_raw(speed: i32) -> Self {
        let speed = clamp_speed(speed);
        SpeedCommand {
            speed,
            direction: Direction::of(speed),
            duty_percent: duty_percent(speed.unsigned_abs()),
        }
    }

    /// Resolve a normalized speed request. See [`normalized_to_raw`].
    pub fn from_normalized(speed: f32) -> Self {
        Self::from_raw(normalized_to_raw(speed))
    }

    /// Absolute value of the clamped speed.
    pub fn magnitude(&self) -> u16 {
        self.speed.unsigned_abs()
    }

    /// Returns `true` if no torque is requested.
    pub fn is_stop(&self) -> bool {
        self.speed == 0
    }
}

impl fmt::Display for SpeedCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, {:.1}% duty)", self.speed, self.direction, self.duty_percent)
    }
}
