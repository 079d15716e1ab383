#![doc = "Signal generation for two-pin Cytron-style DC motor drivers."]
#![doc = ""]
#![doc = "A [`MotorDriver`] turns a signed speed in `[-255, 255]` (or a normalized"]
#![doc = "speed in `[-1.0, 1.0]`) into the pin levels and PWM duty cycles the board"]
#![doc = "expects, in either DIR+PWM or PWM+PWM wiring. Hardware access goes through"]
#![doc = "the [`GpioProvider`] trait; [`sim::SimulatedGpio`] implements it in memory."]
#![doc = ""]
#![doc = "```"]
#![doc = "use cytron_motor::{MotorDriver, Mode, sim::SimulatedGpio};"]
#![doc = ""]
#![doc = "let mut motor = MotorDriver::new(SimulatedGpio::new(), 1, 2, Mode::DirectionPwm)?;"]
#![doc = "motor.set_speed(128)?;"]
#![doc = "motor.set_speed_normalized(-0.5)?;"]
#![doc = "motor.shutdown()?;"]
#![doc = "# Ok::<(), cytron_motor::MotorError>(())"]
#![doc = "```"]

pub mod driver;
pub mod error;
pub mod gpio;
pub mod sim;
pub mod speed;

pub use driver::{DEFAULT_PWM_FREQUENCY_HZ, DriverState, Mode, MotorDriver, MotorState};
pub use error::{MotorError, Result};
pub use gpio::{GpioProvider, Level, PwmChannel};
pub use speed::{Direction, MAX_SPEED, SpeedCommand};
