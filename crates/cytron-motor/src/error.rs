//! Error types returned by the motor driver.

use crate::driver::DriverState;

/// Boxed failure reported by a GPIO provider.
pub type ProviderFailure = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while constructing or driving a motor.
#[derive(Debug, thiserror::Error)]
pub enum MotorError {
    /// Error for an invalid driver configuration.
    /// This variant is returned when both control pins are the same pin
    /// or when the PWM carrier frequency is zero.
    #[error("Invalid motor configuration: {0}")]
    Configuration(&'static str),
    /// Error raised by the GPIO provider.
    /// `operation` names the step that failed. Provider failures are never retried.
    #[error("GPIO provider failed during {operation}")]
    Provider {
        /// The driver step that was being performed.
        operation: &'static str,
        /// The underlying provider error.
        #[source]
        source: ProviderFailure,
    },
    /// Error for an operation attempted in a state that does not allow it.
    /// This variant is returned for any command issued after shutdown.
    #[error("Operation not allowed while driver is {0}")]
    InvalidState(DriverState),
}

impl MotorError {
    /// Returns `true` if this error came from the GPIO provider.
    pub fn is_provider(&self) -> bool {
        matches!(self, MotorError::Provider { .. })
    }
}

/// Tags a provider result with the driver step that produced it.
pub(crate) trait ProviderResultExt<T> {
    fn during(self, operation: &'static str) -> Result<T>;
}

impl<T, E> ProviderResultExt<T> for core::result::Result<T, E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    fn during(self, operation: &'static str) -> Result<T> {
        self.map_err(|err| MotorError::Provider {
            operation,
            source: Box::new(err),
        })
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, MotorError>;
