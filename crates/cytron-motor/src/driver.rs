//! The motor driver: mode selection, signal application and lifecycle.
//!
//! A [`MotorDriver`] owns two control pins and, depending on the [`Mode`],
//! one or two PWM channels. Channels are acquired once at construction and
//! only have their duty cycle changed afterwards.
//!
//! Lifecycle: [`DriverState::Constructed`] (stationary, PWM at 0%) →
//! [`DriverState::Running`] (after the first speed command) →
//! [`DriverState::Stopped`] (terminal, after [`MotorDriver::shutdown`]).

use core::fmt;

use tracing::{debug, error, info, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{MotorError, ProviderResultExt, Result};
use crate::gpio::{GpioProvider, Level, PwmChannel};
use crate::speed::{Direction, SpeedCommand};

/// PWM carrier frequency used by [`MotorDriver::new`].
pub const DEFAULT_PWM_FREQUENCY_HZ: u32 = 100;

/// Signaling scheme expected by the driver board.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Pin A carries PWM (speed), pin B a static level (direction).
    #[cfg_attr(feature = "serde", serde(alias = "dir"))]
    DirectionPwm,
    /// Both pins carry PWM. Direction is selected by which pin is active.
    #[cfg_attr(feature = "serde", serde(alias = "pwm"))]
    DualPwm,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::DirectionPwm => write!(f, "DIR+PWM"),
            Mode::DualPwm => write!(f, "PWM+PWM"),
        }
    }
}

/// Lifecycle state of a [`MotorDriver`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    /// Pins configured and PWM running at 0%. No speed applied yet.
    Constructed,
    /// At least one speed command has been issued.
    Running,
    /// Shut down. No further commands are accepted.
    Stopped,
}

impl fmt::Display for DriverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DriverState::Constructed => write!(f, "constructed"),
            DriverState::Running => write!(f, "running"),
            DriverState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Snapshot of what the driver has pushed to its pins.
///
/// Duty cycles and levels reflect completed provider calls only. After a
/// provider failure they show exactly what reached the hardware, which may
/// differ from the requested speed.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorState {
    /// Lifecycle state.
    pub driver_state: DriverState,
    /// Signaling mode.
    pub mode: Mode,
    /// Last speed fully applied, in `[-255, 255]`.
    pub speed: i16,
    /// Direction of `speed`.
    pub direction: Direction,
    /// Duty cycle on pin A in percent.
    pub duty_a: f32,
    /// Duty cycle on pin B in percent.
    /// - `None` in [`Mode::DirectionPwm`], where pin B carries no PWM
    pub duty_b: Option<f32>,
    /// Level of the direction pin.
    /// - `None` in [`Mode::DualPwm`], where pin B is a PWM output
    pub direction_level: Option<Level>,
    /// PWM carrier frequency in Hz.
    pub pwm_frequency: u32,
}

/// PWM channels owned by the driver, shaped by the mode.
enum Outputs<C> {
    DirectionPwm { pwm: C },
    DualPwm { pwm_a: C, pwm_b: C },
}

#[derive(Debug, Clone, Copy, Default)]
struct Applied {
    duty_a: f32,
    duty_b: f32,
    direction_level: Level,
}

/// Driver for a two-pin Cytron-style motor controller.
///
/// Single owner: the driver is not internally synchronized. Callers sharing
/// one across threads must serialize access, otherwise interleaved updates
/// can break the dual-PWM break-before-make ordering.
///
/// Call [`MotorDriver::shutdown`] before dropping the driver. Dropping an
/// active driver leaves the PWM signals as they are.
pub struct MotorDriver<G: GpioProvider> {
    gpio: G,
    pin_a: G::Pin,
    pin_b: G::Pin,
    mode: Mode,
    frequency_hz: u32,
    outputs: Option<Outputs<G::Channel>>,
    state: DriverState,
    current_speed: i16,
    applied: Applied,
}

impl<G: GpioProvider> MotorDriver<G> {
    /// Create a driver with the default 100 Hz PWM carrier.
    ///
    /// See [`MotorDriver::with_frequency`].
    pub fn new(gpio: G, pin_a: G::Pin, pin_b: G::Pin, mode: Mode) -> Result<Self> {
        Self::with_frequency(gpio, pin_a, pin_b, mode, DEFAULT_PWM_FREQUENCY_HZ)
    }

    /// Create a driver and bring the motor to a stationary state.
    ///
    /// Both pins are configured as outputs and pin B is driven low before
    /// any PWM is started. PWM on pin A (and on pin B in [`Mode::DualPwm`])
    /// then starts at 0% duty.
    ///
    /// # Errors
    ///
    /// * [`MotorError::Configuration`] if `pin_a == pin_b` or `frequency_hz == 0`.
    ///   No provider call is made in that case.
    /// * [`MotorError::Provider`] if any provider call fails. A channel that
    ///   was already started is stopped again before returning.
    pub fn with_frequency(
        mut gpio: G,
        pin_a: G::Pin,
        pin_b: G::Pin,
        mode: Mode,
        frequency_hz: u32,
    ) -> Result<Self> {
        if pin_a == pin_b {
            return Err(MotorError::Configuration("pin_a and pin_b must be different pins"));
        }
        if frequency_hz == 0 {
            return Err(MotorError::Configuration("PWM frequency must be positive"));
        }

        gpio.configure_output(pin_a).during("configure pin A")?;
        gpio.configure_output(pin_b).during("configure pin B")?;
        gpio.write_digital(pin_b, Level::Low).during("drive pin B low")?;

        let pwm_a = start_channel(&mut gpio, pin_a, frequency_hz)?;
        let outputs = match mode {
            Mode::DirectionPwm => Outputs::DirectionPwm { pwm: pwm_a },
            Mode::DualPwm => match start_channel(&mut gpio, pin_b, frequency_hz) {
                Ok(pwm_b) => Outputs::DualPwm { pwm_a, pwm_b },
                Err(err) => {
                    let mut pwm_a = pwm_a;
                    if let Err(stop_err) = pwm_a.stop() {
                        warn!(pin = %pin_a, error = %stop_err, "Failed to stop PWM after aborted construction");
                    }
                    return Err(err);
                }
            },
        };

        info!(%mode, pin_a = %pin_a, pin_b = %pin_b, frequency_hz, "Motor driver initialized");

        Ok(Self {
            gpio,
            pin_a,
            pin_b,
            mode,
            frequency_hz,
            outputs: Some(outputs),
            state: DriverState::Constructed,
            current_speed: 0,
            applied: Applied::default(),
        })
    }

    /// Set the motor speed.
    ///
    /// `speed` is clamped to `[-255, 255]`. Positive values drive forward,
    /// negative values reverse, zero removes torque.
    ///
    /// # Errors
    ///
    /// * [`MotorError::InvalidState`] after [`MotorDriver::shutdown`].
    /// * [`MotorError::Provider`] if a pin update fails. Updates already made
    ///   are not rolled back. Call [`MotorDriver::shutdown`] to force a safe state.
    pub fn set_speed(&mut self, speed: i32) -> Result<()> {
        self.apply(SpeedCommand::from_raw(speed))
    }

    /// Set the motor speed from a value in `[-1.0, 1.0]`.
    ///
    /// Equivalent to `set_speed(round(speed * 255))` after clamping. `NaN` stops the motor.
    pub fn set_speed_normalized(&mut self, speed: f32) -> Result<()> {
        self.apply(SpeedCommand::from_normalized(speed))
    }

    fn apply(&mut self, command: SpeedCommand) -> Result<()> {
        let Some(outputs) = self.outputs.as_mut() else {
            return Err(MotorError::InvalidState(self.state));
        };
        self.state = DriverState::Running;
        debug!(mode = %self.mode, %command, "Applying speed");

        let duty = command.duty_percent;
        match outputs {
            Outputs::DirectionPwm { pwm } => {
                // Direction first so the old direction never sees the new duty.
                let level = match command.direction {
                    Direction::Forward => Level::Low,
                    Direction::Reverse => Level::High,
                };
                self.gpio.write_digital(self.pin_b, level).during("write direction pin")?;
                self.applied.direction_level = level;

                pwm.set_duty(duty).during("set duty on pin A")?;
                self.applied.duty_a = duty;
            }
            Outputs::DualPwm { pwm_a, pwm_b } => match command.direction {
                // Break before make: release the idle pin, then drive the active one.
                Direction::Forward => {
                    pwm_b.set_duty(0.0).during("release pin B")?;
                    self.applied.duty_b = 0.0;
                    pwm_a.set_duty(duty).during("set duty on pin A")?;
                    self.applied.duty_a = duty;
                }
                Direction::Reverse => {
                    pwm_a.set_duty(0.0).during("release pin A")?;
                    self.applied.duty_a = 0.0;
                    pwm_b.set_duty(duty).during("set duty on pin B")?;
                    self.applied.duty_b = duty;
                }
            },
        }

        self.current_speed = command.speed;
        Ok(())
    }

    /// Stop all PWM output and release the pins.
    ///
    /// Every owned PWM channel is stopped, both pins are driven low and the
    /// provider is reset. All steps are attempted even if one fails; the
    /// first failure is returned. The driver is [`DriverState::Stopped`]
    /// afterwards either way.
    ///
    /// # Errors
    ///
    /// * [`MotorError::InvalidState`] if the driver was already shut down.
    /// * [`MotorError::Provider`] for the first failing step.
    pub fn shutdown(&mut self) -> Result<()> {
        let Some(outputs) = self.outputs.take() else {
            return Err(MotorError::InvalidState(self.state));
        };
        self.state = DriverState::Stopped;

        let mut first_error: Option<MotorError> = None;
        let mut record = |result: Result<()>| {
            if let Err(err) = result {
                error!(error = %err, "Motor shutdown step failed");
                first_error.get_or_insert(err);
            }
        };

        match outputs {
            Outputs::DirectionPwm { mut pwm } => {
                record(pwm.stop().during("stop PWM on pin A"));
            }
            Outputs::DualPwm { mut pwm_a, mut pwm_b } => {
                record(pwm_a.stop().during("stop PWM on pin A"));
                record(pwm_b.stop().during("stop PWM on pin B"));
            }
        }
        record(
            self.gpio.write_digital(self.pin_a, Level::Low).during("drive pin A low"),
        );
        record(
            self.gpio.write_digital(self.pin_b, Level::Low).during("drive pin B low"),
        );
        record(self.gpio.reset().during("reset GPIO"));

        self.current_speed = 0;
        self.applied = Applied::default();

        match first_error {
            Some(err) => Err(err),
            None => {
                info!(pin_a = %self.pin_a, pin_b = %self.pin_b, "Motor driver shut down");
                Ok(())
            }
        }
    }

    /// Signaling mode, fixed at construction.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// The `(pin_a, pin_b)` pair this driver controls.
    pub fn pins(&self) -> (G::Pin, G::Pin) {
        (self.pin_a, self.pin_b)
    }

    /// PWM carrier frequency in Hz.
    pub fn frequency_hz(&self) -> u32 {
        self.frequency_hz
    }

    /// Last speed fully applied, in `[-255, 255]`.
    pub fn current_speed(&self) -> i16 {
        self.current_speed
    }

    /// Lifecycle state.
    pub fn driver_state(&self) -> DriverState {
        self.state
    }

    /// Returns `true` if any PWM channel currently carries nonzero duty.
    pub fn is_energized(&self) -> bool {
        self.outputs.is_some() && (self.applied.duty_a > 0.0 || self.applied.duty_b > 0.0)
    }

    /// Snapshot of the driver and its outputs.
    pub fn state(&self) -> MotorState {
        MotorState {
            driver_state: self.state,
            mode: self.mode,
            speed: self.current_speed,
            direction: Direction::of(self.current_speed),
            duty_a: self.applied.duty_a,
            duty_b: match self.mode {
                Mode::DirectionPwm => None,
                Mode::DualPwm => Some(self.applied.duty_b),
            },
            direction_level: match self.mode {
                Mode::DirectionPwm => Some(self.applied.direction_level),
                Mode::DualPwm => None,
            },
            pwm_frequency: self.frequency_hz,
        }
    }
}

impl<G: GpioProvider> Drop for MotorDriver<G> {
    fn drop(&mut self) {
        if self.outputs.is_some() {
            warn!(
                pin_a = %self.pin_a,
                pin_b = %self.pin_b,
                "Motor driver dropped without shutdown; PWM output left unchanged"
            );
        }
    }
}

impl<G: GpioProvider> fmt::Debug for MotorDriver<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MotorDriver")
            .field("pin_a", &self.pin_a)
            .field("pin_b", &self.pin_b)
            .field("mode", &self.mode)
            .field("frequency_hz", &self.frequency_hz)
            .field("state", &self.state)
            .field("current_speed", &self.current_speed)
            .finish_non_exhaustive()
    }
}

/// Acquire a PWM channel on `pin` and start it at 0% duty.
fn start_channel<G: GpioProvider>(gpio: &mut G, pin: G::Pin, frequency_hz: u32) -> Result<G::Channel> {
    let mut channel = gpio.create_pwm(pin, frequency_hz).during("create PWM channel")?;
    channel.start(0.0).during("start PWM channel")?;
    Ok(channel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{GpioEvent, SimHandle, SimOperation, SimulatedGpio};
    use crate::speed::duty_percent;

    const PIN_A: u8 = 1;
    const PIN_B: u8 = 2;

    fn driver(mode: Mode) -> (MotorDriver<SimulatedGpio>, SimHandle) {
        let gpio = SimulatedGpio::new();
        let handle = gpio.handle();
        let driver = MotorDriver::new(gpio, PIN_A, PIN_B, mode).unwrap();
        (driver, handle)
    }

    #[test]
    fn test_direction_pwm_construction() {
        let (driver, sim) = driver(Mode::DirectionPwm);
        assert_eq!(
            sim.events(),
            vec![
                GpioEvent::ConfigureOutput { pin: PIN_A },
                GpioEvent::ConfigureOutput { pin: PIN_B },
                GpioEvent::WriteDigital { pin: PIN_B, level: Level::Low },
                GpioEvent::CreatePwm { pin: PIN_A, frequency_hz: 100 },
                GpioEvent::PwmStart { pin: PIN_A, duty_percent: 0.0 },
            ]
        );
        assert!(sim.is_pwm_running(PIN_A));
        assert!(!sim.is_pwm_running(PIN_B));
        assert_eq!(sim.level(PIN_B), Level::Low);
        assert_eq!(driver.driver_state(), DriverState::Constructed);
        assert_eq!(driver.current_speed(), 0);
        assert!(!driver.is_energized());
    }

    #[test]
    fn test_dual_pwm_construction() {
        let (driver, sim) = driver(Mode::DualPwm);
        assert_eq!(
            sim.events(),
            vec![
                GpioEvent::ConfigureOutput { pin: PIN_A },
                GpioEvent::ConfigureOutput { pin: PIN_B },
                GpioEvent::WriteDigital { pin: PIN_B, level: Level::Low },
                GpioEvent::CreatePwm { pin: PIN_A, frequency_hz: 100 },
                GpioEvent::PwmStart { pin: PIN_A, duty_percent: 0.0 },
                GpioEvent::CreatePwm { pin: PIN_B, frequency_hz: 100 },
                GpioEvent::PwmStart { pin: PIN_B, duty_percent: 0.0 },
            ]
        );
        let state = driver.state();
        assert_eq!(state.duty_b, Some(0.0));
        assert_eq!(state.direction_level, None);
    }

    #[test]
    fn test_custom_frequency() {
        let gpio = SimulatedGpio::new();
        let sim = gpio.handle();
        let driver = MotorDriver::with_frequency(gpio, 3, 4, Mode::DualPwm, 20_000).unwrap();
        assert_eq!(driver.frequency_hz(), 20_000);
        assert_eq!(driver.pins(), (3, 4));
        assert_eq!(sim.pin(3).pwm.unwrap().frequency_hz, 20_000);
        assert_eq!(sim.pin(4).pwm.unwrap().frequency_hz, 20_000);
    }

    #[test]
    fn test_same_pin_is_rejected_before_touching_gpio() {
        let gpio = SimulatedGpio::new();
        let sim = gpio.handle();
        let result = MotorDriver::new(gpio, 7, 7, Mode::DirectionPwm);
        assert!(matches!(result, Err(MotorError::Configuration(_))));
        assert!(sim.events().is_empty());
    }

    #[test]
    fn test_zero_frequency_is_rejected() {
        let result = MotorDriver::with_frequency(SimulatedGpio::new(), 1, 2, Mode::DualPwm, 0);
        assert!(matches!(
            result,
            Err(MotorError::Configuration("PWM frequency must be positive"))
        ));
    }

    #[test]
    fn test_construction_provider_failure() {
        let gpio = SimulatedGpio::new();
        let sim = gpio.handle();
        sim.fail_next(SimOperation::ConfigureOutput);
        let err = MotorDriver::new(gpio, PIN_A, PIN_B, Mode::DirectionPwm).unwrap_err();
        assert!(matches!(err, MotorError::Provider { operation: "configure pin A", .. }));
    }

    #[test]
    fn test_failed_second_channel_stops_first() {
        let gpio = SimulatedGpio::new();
        let sim = gpio.handle();
        sim.fail_on(SimOperation::CreatePwm, 2);
        let err = MotorDriver::new(gpio, PIN_A, PIN_B, Mode::DualPwm).unwrap_err();
        assert!(err.is_provider());
        assert!(!sim.is_pwm_running(PIN_A));
        assert_eq!(sim.events().last(), Some(&GpioEvent::PwmStop { pin: PIN_A }));
    }

    #[test]
    fn test_direction_pwm_forward() {
        let (mut driver, sim) = driver(Mode::DirectionPwm);
        sim.clear_events();
        driver.set_speed(128).unwrap();
        assert_eq!(
            sim.events(),
            vec![
                GpioEvent::WriteDigital { pin: PIN_B, level: Level::Low },
                GpioEvent::PwmSetDuty { pin: PIN_A, duty_percent: duty_percent(128) },
            ]
        );
        assert!((sim.duty(PIN_A).unwrap() - 50.196).abs() < 1e-2);
        assert_eq!(driver.current_speed(), 128);
        assert_eq!(driver.driver_state(), DriverState::Running);
    }

    #[test]
    fn test_direction_pwm_reverse_writes_direction_first() {
        let (mut driver, sim) = driver(Mode::DirectionPwm);
        driver.set_speed(200).unwrap();
        sim.clear_events();
        driver.set_speed(-200).unwrap();
        assert_eq!(
            sim.events(),
            vec![
                GpioEvent::WriteDigital { pin: PIN_B, level: Level::High },
                GpioEvent::PwmSetDuty { pin: PIN_A, duty_percent: duty_percent(200) },
            ]
        );
        assert_eq!(driver.state().direction_level, Some(Level::High));
    }

    #[test]
    fn test_direction_level_follows_sign() {
        let (mut driver, sim) = driver(Mode::DirectionPwm);
        for speed in [-300, -255, -128, -1, 0, 1, 128, 255, 300] {
            driver.set_speed(speed).unwrap();
            let expected = if speed >= 0 { Level::Low } else { Level::High };
            assert_eq!(sim.level(PIN_B), expected, "speed {speed}");
            assert!(!sim.is_pwm_running(PIN_B));
        }
    }

    #[test]
    fn test_dual_pwm_full_reverse() {
        let (mut driver, sim) = driver(Mode::DualPwm);
        sim.clear_events();
        driver.set_speed(-255).unwrap();
        assert_eq!(
            sim.events(),
            vec![
                GpioEvent::PwmSetDuty { pin: PIN_A, duty_percent: 0.0 },
                GpioEvent::PwmSetDuty { pin: PIN_B, duty_percent: 100.0 },
            ]
        );
        assert_eq!(sim.duty(PIN_A), Some(0.0));
        assert_eq!(sim.duty(PIN_B), Some(100.0));
    }

    #[test]
    fn test_dual_pwm_break_before_make_on_reversal() {
        let (mut driver, sim) = driver(Mode::DualPwm);
        driver.set_speed(200).unwrap();
        sim.clear_events();
        driver.set_speed(-200).unwrap();
        assert_eq!(
            sim.events(),
            vec![
                GpioEvent::PwmSetDuty { pin: PIN_A, duty_percent: 0.0 },
                GpioEvent::PwmSetDuty { pin: PIN_B, duty_percent: duty_percent(200) },
            ]
        );
        driver.set_speed(200).unwrap();
        assert_eq!(sim.overlap_violations(), 0);
        assert_eq!(sim.energized_pins(), vec![PIN_A]);
    }

    #[test]
    fn test_dual_pwm_exactly_one_pin_energized() {
        let (mut driver, sim) = driver(Mode::DualPwm);
        for speed in (-255..=255).step_by(5).chain([255, -255, 1, -1]) {
            driver.set_speed(speed).unwrap();
            let energized = sim.energized_pins();
            if speed == 0 {
                assert!(energized.is_empty());
            } else {
                let expected = if speed > 0 { PIN_A } else { PIN_B };
                assert_eq!(energized, vec![expected], "speed {speed}");
            }
        }
        assert_eq!(sim.overlap_violations(), 0);
    }

    #[test]
    fn test_normalized_speed_matches_raw() {
        let (mut normalized, sim_n) = driver(Mode::DualPwm);
        let (mut raw, sim_r) = driver(Mode::DualPwm);
        for x in [-1.0f32, -0.75, -0.5, 0.0, 0.25, 0.5, 1.0] {
            normalized.set_speed_normalized(x).unwrap();
            raw.set_speed((x * 255.0).round() as i32).unwrap();
            assert_eq!(normalized.current_speed(), raw.current_speed());
            assert_eq!(sim_n.duty(PIN_A), sim_r.duty(PIN_A));
            assert_eq!(sim_n.duty(PIN_B), sim_r.duty(PIN_B));
        }
        normalized.set_speed_normalized(0.5).unwrap();
        assert_eq!(normalized.current_speed(), 128);
        normalized.set_speed_normalized(42.0).unwrap();
        assert_eq!(normalized.current_speed(), 255);
    }

    #[test]
    fn test_channels_are_never_recreated() {
        let (mut driver, sim) = driver(Mode::DualPwm);
        for speed in [10, -10, 255, -255, 0] {
            driver.set_speed(speed).unwrap();
        }
        assert_eq!(sim.call_count(SimOperation::CreatePwm), 2);
        assert_eq!(sim.call_count(SimOperation::PwmStart), 2);
    }

    #[test]
    fn test_partial_failure_reports_applied_outputs() {
        let (mut driver, sim) = driver(Mode::DualPwm);
        driver.set_speed(100).unwrap();
        sim.fail_on(SimOperation::PwmSetDuty, 2);
        let err = driver.set_speed(-100).unwrap_err();
        assert!(matches!(err, MotorError::Provider { operation: "set duty on pin B", .. }));

        let state = driver.state();
        assert_eq!(state.duty_a, 0.0);
        assert_eq!(state.duty_b, Some(0.0));
        assert_eq!(state.speed, 100);
        assert!(!driver.is_energized());

        driver.shutdown().unwrap();
    }

    #[test]
    fn test_shutdown_direction_pwm() {
        let (mut driver, sim) = driver(Mode::DirectionPwm);
        driver.set_speed(-50).unwrap();
        sim.clear_events();
        driver.shutdown().unwrap();
        assert_eq!(
            sim.events(),
            vec![
                GpioEvent::PwmStop { pin: PIN_A },
                GpioEvent::WriteDigital { pin: PIN_A, level: Level::Low },
                GpioEvent::WriteDigital { pin: PIN_B, level: Level::Low },
                GpioEvent::Reset,
            ]
        );
        assert_eq!(driver.driver_state(), DriverState::Stopped);
        assert_eq!(driver.current_speed(), 0);
    }

    #[test]
    fn test_shutdown_dual_pwm_stops_both_channels() {
        let (mut driver, sim) = driver(Mode::DualPwm);
        driver.set_speed(255).unwrap();
        driver.shutdown().unwrap();
        assert_eq!(sim.call_count(SimOperation::PwmStop), 2);
        assert!(!sim.is_pwm_running(PIN_A));
        assert!(!sim.is_pwm_running(PIN_B));
        assert!(sim.energized_pins().is_empty());
    }

    #[test]
    fn test_commands_after_shutdown_fail() {
        let (mut driver, _sim) = driver(Mode::DirectionPwm);
        driver.shutdown().unwrap();
        assert!(matches!(
            driver.set_speed(100),
            Err(MotorError::InvalidState(DriverState::Stopped))
        ));
        assert!(matches!(
            driver.set_speed_normalized(0.1),
            Err(MotorError::InvalidState(DriverState::Stopped))
        ));
        assert!(matches!(
            driver.shutdown(),
            Err(MotorError::InvalidState(DriverState::Stopped))
        ));
    }

    #[test]
    fn test_shutdown_continues_after_failed_step() {
        let (mut driver, sim) = driver(Mode::DualPwm);
        driver.set_speed(-80).unwrap();
        sim.fail_next(SimOperation::PwmStop);
        let err = driver.shutdown().unwrap_err();
        assert!(matches!(err, MotorError::Provider { operation: "stop PWM on pin A", .. }));
        assert_eq!(sim.call_count(SimOperation::PwmStop), 2);
        assert_eq!(sim.call_count(SimOperation::Reset), 1);
        assert_eq!(driver.driver_state(), DriverState::Stopped);
    }

    #[test]
    fn test_error_messages() {
        let (mut driver, _sim) = driver(Mode::DirectionPwm);
        driver.shutdown().unwrap();
        let err = driver.set_speed(1).unwrap_err();
        assert_eq!(err.to_string(), "Operation not allowed while driver is stopped");
    }
}
