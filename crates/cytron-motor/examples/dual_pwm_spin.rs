//! Ramps a simulated PWM+PWM motor forward and back, logging the pin state.
//!
//! Run with `RUST_LOG=debug` to also see every speed command.

use cytron_motor::sim::SimulatedGpio;
use cytron_motor::{Mode, MotorDriver};
use tracing::info;
use tracing_subscriber::EnvFilter;

const PIN_A: u8 = 12; // PWM1
const PIN_B: u8 = 13; // PWM2
const PWM_FREQ: u32 = 1_000; // PWM frequency in Hz
const STEP: usize = 51; // Speed increment per step

fn main() -> Result<(), cytron_motor::MotorError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let gpio = SimulatedGpio::new();
    let sim = gpio.handle();
    let mut motor = MotorDriver::with_frequency(gpio, PIN_A, PIN_B, Mode::DualPwm, PWM_FREQ)?;
    info!("Motor initialized in {} mode", motor.mode());

    // Forward with increasing speed, then reverse with increasing speed
    for sign in [1, -1] {
        for speed in (0..=255).step_by(STEP) {
            motor.set_speed(sign * speed)?;
            let state = motor.state();
            info!(
                "speed={} duty_a={:.1}% duty_b={:?} energized={:?}",
                state.speed,
                state.duty_a,
                state.duty_b,
                sim.energized_pins()
            );
        }
    }

    info!("Stopping motor");
    motor.set_speed(0)?;
    motor.shutdown()?;
    info!(
        "Done: {} GPIO calls, {} overlap violations",
        sim.events().len(),
        sim.overlap_violations()
    );
    Ok(())
}
