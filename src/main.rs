mod config;  // brings `config.rs` in as `crate::config`
mod profile; // brings `profile.rs` in as `crate::profile`

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use anyhow::Context;
use cytron_motor::sim::SimulatedGpio;
use cytron_motor::{GpioProvider, MotorDriver};
use spin_sleep::SpinSleeper;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{self, EnvFilter};

use crate::config::{AppConfig, ControlSettings};
use crate::profile::Setpoint;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    info!("Cytron drive runner started.");

    let settings = crate::config::load_config().context("failed to load configuration")?;
    settings.validate().context("invalid configuration")?;

    let stop = Arc::new(AtomicBool::new(false));
    let mut control = tokio::task::spawn_blocking({
        let stop = Arc::clone(&stop);
        move || run(settings, &stop)
    });

    tokio::select! {
        result = &mut control => return result.context("control task panicked")?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for Ctrl-C")?;
            warn!("Ctrl-C received. Stopping motor.");
            stop.store(true, Ordering::Relaxed);
        }
    }

    control.await.context("control task panicked")?
}

/// Owns the driver for its whole life: build, play the profile, always shut down.
fn run(settings: AppConfig, stop: &AtomicBool) -> anyhow::Result<()> {
    let gpio = SimulatedGpio::new();
    let sim = gpio.handle();

    let motor_settings = &settings.motor;
    let mut motor = MotorDriver::with_frequency(
        gpio,
        motor_settings.pin_a,
        motor_settings.pin_b,
        motor_settings.mode,
        motor_settings.frequency_hz,
    )
    .context("failed to initialize motor driver")?;

    let result = play_profile(&mut motor, &settings.control, stop);
    if let Err(e) = &result {
        error!("Control loop failed: {:?}. Shutting motor down.", e);
    }

    let shutdown = motor.shutdown().context("failed to shut down motor driver");
    info!(
        gpio_calls = sim.events().len(),
        overlap_violations = sim.overlap_violations(),
        "Simulated GPIO summary"
    );

    result?;
    shutdown
}

fn play_profile<G: GpioProvider>(
    motor: &mut MotorDriver<G>,
    control: &ControlSettings,
    stop: &AtomicBool,
) -> anyhow::Result<()> {
    let sleeper = SpinSleeper::new(1_000);
    let tick = Duration::from_millis(control.tick_ms);
    let started = Instant::now();

    info!(profile = ?control.profile, duration = ?control.profile.duration(), "Playing speed profile");
    while !stop.load(Ordering::Relaxed) {
        let Some(setpoint) = control.profile.setpoint_at(started.elapsed()) else {
            info!("Speed profile complete.");
            break;
        };
        match setpoint {
            Setpoint::Normalized(speed) => motor.set_speed_normalized(speed),
            Setpoint::Raw(speed) => motor.set_speed(speed),
        }
        .with_context(|| format!("failed to apply setpoint {setpoint:?}"))?;

        debug!(state = ?motor.state(), "Applied setpoint");
        sleeper.sleep(tick);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MotorSettings;
    use crate::profile::SpeedProfile;
    use cytron_motor::Mode;
    use cytron_motor::sim::SimOperation;

    fn control(profile: SpeedProfile) -> ControlSettings {
        ControlSettings { tick_ms: 1, profile }
    }

    #[test]
    fn test_play_profile_ends_on_last_step() {
        let gpio = SimulatedGpio::new();
        let sim = gpio.handle();
        let mut motor = MotorDriver::new(gpio, 1, 2, Mode::DualPwm).unwrap();
        let control = control(SpeedProfile::Steps { speeds: vec![200, -200], hold_ms: 5 });

        play_profile(&mut motor, &control, &AtomicBool::new(false)).unwrap();
        assert_eq!(motor.current_speed(), -200);
        assert_eq!(sim.overlap_violations(), 0);
        motor.shutdown().unwrap();
    }

    #[test]
    fn test_play_profile_honours_stop_flag() {
        let mut motor = MotorDriver::new(SimulatedGpio::new(), 1, 2, Mode::DirectionPwm).unwrap();
        let control = control(SpeedProfile::Steps { speeds: vec![255], hold_ms: 60_000 });

        play_profile(&mut motor, &control, &AtomicBool::new(true)).unwrap();
        assert_eq!(motor.current_speed(), 0);
        motor.shutdown().unwrap();
    }

    #[test]
    fn test_run_shuts_down_after_failure() {
        let settings = AppConfig {
            motor: MotorSettings { pin_a: 1, pin_b: 2, mode: Mode::DirectionPwm, frequency_hz: 100 },
            control: control(SpeedProfile::Steps { speeds: vec![10], hold_ms: 5 }),
        };
        assert!(run(settings, &AtomicBool::new(false)).is_ok());

        let gpio = SimulatedGpio::new();
        let sim = gpio.handle();
        let mut motor = MotorDriver::new(gpio, 1, 2, Mode::DirectionPwm).unwrap();
        sim.fail_next(SimOperation::WriteDigital);
        let control = control(SpeedProfile::Steps { speeds: vec![10], hold_ms: 5 });
        assert!(play_profile(&mut motor, &control, &AtomicBool::new(false)).is_err());
        motor.shutdown().unwrap();
        assert!(!sim.is_pwm_running(1));
    }
}
