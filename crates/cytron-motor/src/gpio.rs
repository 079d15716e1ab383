//! The GPIO capability the motor driver is built on.
//!
//! The driver never talks to hardware directly. Everything it needs from
//! the outside world goes through [`GpioProvider`] and the [`PwmChannel`]
//! handles it hands out, so the same driver runs against a real GPIO
//! library or against [`crate::sim::SimulatedGpio`].

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A digital output level.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Level {
    /// Pin driven low.
    #[default]
    Low,
    /// Pin driven high.
    High,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Low => write!(f, "LOW"),
            Level::High => write!(f, "HIGH"),
        }
    }
}

/// A PWM signal generator bound to a single pin.
///
/// Duty cycles are percentages in `[0.0, 100.0]`.
pub trait PwmChannel {
    /// Error returned by the channel.
    type Error;

    /// Starts generating the signal at the given duty cycle.
    fn start(&mut self, duty_percent: f32) -> Result<(), Self::Error>;

    /// Changes the duty cycle of a running channel.
    fn set_duty(&mut self, duty_percent: f32) -> Result<(), Self::Error>;

    /// Stops the signal. The handle must not be used afterwards.
    fn stop(&mut self) -> Result<(), Self::Error>;
}

/// Pin configuration, digital writes and PWM channel acquisition.
pub trait GpioProvider {
    /// Identifier of a physical pin.
    type Pin: Copy + Eq + fmt::Debug + fmt::Display;
    /// Error returned by every provider operation.
    type Error: std::error::Error + Send + Sync + 'static;
    /// PWM handle returned by [`GpioProvider::create_pwm`].
    type Channel: PwmChannel<Error = Self::Error>;

    /// Configures `pin` as a digital output.
    fn configure_output(&mut self, pin: Self::Pin) -> Result<(), Self::Error>;

    /// Drives `pin` to `level`.
    fn write_digital(&mut self, pin: Self::Pin, level: Level) -> Result<(), Self::Error>;

    /// Acquires a PWM channel on `pin` running at `frequency_hz`.
    /// The channel is idle until [`PwmChannel::start`] is called.
    fn create_pwm(&mut self, pin: Self::Pin, frequency_hz: u32) -> Result<Self::Channel, Self::Error>;

    /// Releases every pin this provider configured and returns them to their default state.
    fn reset(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
