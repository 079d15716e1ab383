//! A software GPIO provider.
//!
//! [`SimulatedGpio`] models just enough of a real GPIO library to exercise
//! the driver without hardware: pins must be configured before use, a pin
//! can host one PWM channel at a time, and channels reject duty updates
//! once stopped. Every call is recorded, and a monitor counts any moment
//! in which more than one PWM channel is energized.
//!
//! The provider and every channel it creates share one state object. Keep a
//! [`SimHandle`] around to inspect that state after the provider has been
//! moved into a driver.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::trace;

use crate::gpio::{GpioProvider, Level, PwmChannel};

/// Pin identifier used by the simulator.
pub type SimPin = u8;

/// A provider call recorded by the simulator.
#[derive(Debug, Clone, PartialEq)]
pub enum GpioEvent {
    /// `configure_output(pin)`
    ConfigureOutput { pin: SimPin },
    /// `write_digital(pin, level)`
    WriteDigital { pin: SimPin, level: Level },
    /// `create_pwm(pin, frequency_hz)`
    CreatePwm { pin: SimPin, frequency_hz: u32 },
    /// `PwmChannel::start(duty)`
    PwmStart { pin: SimPin, duty_percent: f32 },
    /// `PwmChannel::set_duty(duty)`
    PwmSetDuty { pin: SimPin, duty_percent: f32 },
    /// `PwmChannel::stop()`
    PwmStop { pin: SimPin },
    /// `reset()`
    Reset,
}

/// Provider operations that can be targeted by fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimOperation {
    ConfigureOutput,
    WriteDigital,
    CreatePwm,
    PwmStart,
    PwmSetDuty,
    PwmStop,
    Reset,
}

/// State of a PWM channel attached to a pin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PwmView {
    pub frequency_hz: u32,
    pub running: bool,
    pub duty_percent: f32,
}

impl PwmView {
    /// A channel is energized when it is running with nonzero duty.
    pub fn is_energized(&self) -> bool {
        self.running && self.duty_percent > 0.0
    }
}

/// State of a single simulated pin.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PinView {
    pub configured: bool,
    pub level: Level,
    pub pwm: Option<PwmView>,
}

/// Errors produced by the simulator.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    #[error("pin {0} is not configured as an output")]
    NotConfigured(SimPin),
    #[error("pin {0} already hosts a PWM channel")]
    PwmInUse(SimPin),
    #[error("PWM channel on pin {0} is not running")]
    PwmNotRunning(SimPin),
    #[error("duty cycle {duty_percent} is outside 0..=100 on pin {pin}")]
    DutyOutOfRange { pin: SimPin, duty_percent: f32 },
    #[error("PWM frequency must be positive on pin {0}")]
    InvalidFrequency(SimPin),
    #[error("injected fault in {0:?}")]
    Injected(SimOperation),
}

#[derive(Debug, Default)]
struct SimState {
    pins: BTreeMap<SimPin, PinView>,
    events: Vec<GpioEvent>,
    calls: HashMap<SimOperation, usize>,
    faults: HashMap<SimOperation, usize>,
    overlap_violations: usize,
}

impl SimState {
    /// Counts the call and fires an armed fault when its countdown expires.
    fn enter(&mut self, operation: SimOperation) -> Result<(), SimError> {
        *self.calls.entry(operation).or_default() += 1;
        if let Some(remaining) = self.faults.get_mut(&operation) {
            *remaining -= 1;
            if *remaining == 0 {
                self.faults.remove(&operation);
                trace!(?operation, "injecting simulated fault");
                return Err(SimError::Injected(operation));
            }
        }
        Ok(())
    }

    fn configured(&mut self, pin: SimPin) -> Result<&mut PinView, SimError> {
        match self.pins.get_mut(&pin) {
            Some(view) if view.configured => Ok(view),
            _ => Err(SimError::NotConfigured(pin)),
        }
    }

    fn running_pwm(&mut self, pin: SimPin) -> Result<&mut PwmView, SimError> {
        match self.pins.get_mut(&pin).and_then(|view| view.pwm.as_mut()) {
            Some(pwm) if pwm.running => Ok(pwm),
            _ => Err(SimError::PwmNotRunning(pin)),
        }
    }

    fn energized_pins(&self) -> Vec<SimPin> {
        self.pins
            .iter()
            .filter(|(_, view)| view.pwm.is_some_and(|pwm| pwm.is_energized()))
            .map(|(pin, _)| *pin)
            .collect()
    }

    fn check_overlap(&mut self) {
        let energized = self.energized_pins();
        if energized.len() > 1 {
            trace!(?energized, "more than one PWM channel energized");
            self.overlap_violations += 1;
        }
    }
}

fn check_duty(pin: SimPin, duty_percent: f32) -> Result<(), SimError> {
    if (0.0..=100.0).contains(&duty_percent) {
        Ok(())
    } else {
        Err(SimError::DutyOutOfRange { pin, duty_percent })
    }
}

/// Inspection and fault-injection handle shared with a [`SimulatedGpio`].
#[derive(Debug, Clone, Default)]
pub struct SimHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimHandle {
    /// Snapshot of a pin. Unknown pins report the default (unconfigured, low) view.
    pub fn pin(&self, pin: SimPin) -> PinView {
        self.state.lock().pins.get(&pin).copied().unwrap_or_default()
    }

    /// Current digital level of a pin.
    pub fn level(&self, pin: SimPin) -> Level {
        self.pin(pin).level
    }

    /// Duty cycle of the PWM channel on `pin`, if one exists.
    pub fn duty(&self, pin: SimPin) -> Option<f32> {
        self.pin(pin).pwm.map(|pwm| pwm.duty_percent)
    }

    /// Returns `true` if a PWM channel on `pin` is running.
    pub fn is_pwm_running(&self, pin: SimPin) -> bool {
        self.pin(pin).pwm.is_some_and(|pwm| pwm.running)
    }

    /// Pins whose PWM channel is currently running with nonzero duty.
    pub fn energized_pins(&self) -> Vec<SimPin> {
        self.state.lock().energized_pins()
    }

    /// Every successful provider call, in order.
    pub fn events(&self) -> Vec<GpioEvent> {
        self.state.lock().events.clone()
    }

    /// Forget the recorded events. Pin state is kept.
    pub fn clear_events(&self) {
        self.state.lock().events.clear();
    }

    /// Number of times `operation` was invoked, including failed calls.
    pub fn call_count(&self, operation: SimOperation) -> usize {
        self.state.lock().calls.get(&operation).copied().unwrap_or(0)
    }

    /// Number of observed moments with two or more PWM channels energized.
    pub fn overlap_violations(&self) -> usize {
        self.state.lock().overlap_violations
    }

    /// Make the `nth` upcoming call of `operation` fail (1 = the next call).
    pub fn fail_on(&self, operation: SimOperation, nth: usize) {
        let mut state = self.state.lock();
        if nth == 0 {
            state.faults.remove(&operation);
        } else {
            state.faults.insert(operation, nth);
        }
    }

    /// Make the next call of `operation` fail.
    pub fn fail_next(&self, operation: SimOperation) {
        self.fail_on(operation, 1);
    }
}

/// In-memory [`GpioProvider`] with `u8` pin numbers.
#[derive(Debug, Default)]
pub struct SimulatedGpio {
    handle: SimHandle,
}

impl SimulatedGpio {
    /// Create a simulator with every pin unconfigured.
    pub fn new() -> Self {
        Self::default()
    }

    /// A handle sharing this simulator's state.
    pub fn handle(&self) -> SimHandle {
        self.handle.clone()
    }
}

impl GpioProvider for SimulatedGpio {
    type Pin = SimPin;
    type Error = SimError;
    type Channel = SimulatedPwm;

    fn configure_output(&mut self, pin: SimPin) -> Result<(), SimError> {
        let mut state = self.handle.state.lock();
        state.enter(SimOperation::ConfigureOutput)?;
        state.pins.entry(pin).or_default().configured = true;
        state.events.push(GpioEvent::ConfigureOutput { pin });
        trace!(pin, "configured output");
        Ok(())
    }

    fn write_digital(&mut self, pin: SimPin, level: Level) -> Result<(), SimError> {
        let mut state = self.handle.state.lock();
        state.enter(SimOperation::WriteDigital)?;
        state.configured(pin)?.level = level;
        state.events.push(GpioEvent::WriteDigital { pin, level });
        trace!(pin, %level, "digital write");
        Ok(())
    }

    fn create_pwm(&mut self, pin: SimPin, frequency_hz: u32) -> Result<SimulatedPwm, SimError> {
        let mut state = self.handle.state.lock();
        state.enter(SimOperation::CreatePwm)?;
        if frequency_hz == 0 {
            return Err(SimError::InvalidFrequency(pin));
        }
        let view = state.configured(pin)?;
        if view.pwm.is_some() {
            return Err(SimError::PwmInUse(pin));
        }
        view.pwm = Some(PwmView {
            frequency_hz,
            running: false,
            duty_percent: 0.0,
        });
        state.events.push(GpioEvent::CreatePwm { pin, frequency_hz });
        trace!(pin, frequency_hz, "created PWM channel");
        Ok(SimulatedPwm {
            pin,
            state: Arc::clone(&self.handle.state),
        })
    }

    fn reset(&mut self) -> Result<(), SimError> {
        let mut state = self.handle.state.lock();
        state.enter(SimOperation::Reset)?;
        state.pins.clear();
        state.events.push(GpioEvent::Reset);
        trace!("reset all pins");
        Ok(())
    }
}

/// PWM channel handed out by [`SimulatedGpio`].
#[derive(Debug)]
pub struct SimulatedPwm {
    pin: SimPin,
    state: Arc<Mutex<SimState>>,
}

impl SimulatedPwm {
    /// The pin this channel drives.
    pub fn pin(&self) -> SimPin {
        self.pin
    }
}

impl PwmChannel for SimulatedPwm {
    type Error = SimError;

    fn start(&mut self, duty_percent: f32) -> Result<(), SimError> {
        let pin = self.pin;
        let mut state = self.state.lock();
        state.enter(SimOperation::PwmStart)?;
        check_duty(pin, duty_percent)?;
        let pwm = state
            .pins
            .get_mut(&pin)
            .and_then(|view| view.pwm.as_mut())
            .ok_or(SimError::NotConfigured(pin))?;
        pwm.running = true;
        pwm.duty_percent = duty_percent;
        state.events.push(GpioEvent::PwmStart { pin, duty_percent });
        state.check_overlap();
        trace!(pin, duty_percent, "PWM started");
        Ok(())
    }

    fn set_duty(&mut self, duty_percent: f32) -> Result<(), SimError> {
        let pin = self.pin;
        let mut state = self.state.lock();
        state.enter(SimOperation::PwmSetDuty)?;
        check_duty(pin, duty_percent)?;
        state.running_pwm(pin)?.duty_percent = duty_percent;
        state.events.push(GpioEvent::PwmSetDuty { pin, duty_percent });
        state.check_overlap();
        trace!(pin, duty_percent, "PWM duty changed");
        Ok(())
    }

    fn stop(&mut self) -> Result<(), SimError> {
        let pin = self.pin;
        let mut state = self.state.lock();
        state.enter(SimOperation::PwmStop)?;
        state.running_pwm(pin)?;
        if let Some(view) = state.pins.get_mut(&pin) {
            view.pwm = None;
        }
        state.events.push(GpioEvent::PwmStop { pin });
        trace!(pin, "PWM stopped");
        Ok(())
    }
}
