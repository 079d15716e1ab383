use anyhow::ensure;
use config::{Config, ConfigError, Environment, File, FileFormat};
use cytron_motor::{DEFAULT_PWM_FREQUENCY_HZ, Mode};
use serde::Deserialize;
use tracing::{error, info};

use crate::profile::SpeedProfile;

const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
const LOCAL_CONFIG_PATH: &str = "config/local.toml";
const ENV_PREFIX: &str = "CYTRON";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub motor: MotorSettings,
    pub control: ControlSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MotorSettings {
    pub pin_a: u8,
    pub pin_b: u8,
    pub mode: Mode,
    #[serde(default = "default_frequency")]
    pub frequency_hz: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ControlSettings {
    /// Control loop period in milliseconds.
    pub tick_ms: u64,
    pub profile: SpeedProfile,
}

fn default_frequency() -> u32 {
    DEFAULT_PWM_FREQUENCY_HZ
}

impl AppConfig {
    /// Reject settings the driver would accept but the control loop cannot run.
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.control.tick_ms > 0, "control.tick_ms must be positive");
        self.control.profile.validate()?;
        Ok(())
    }
}

pub fn load_config() -> Result<AppConfig, ConfigError> {
    info!("Attempting to load configuration from {}", DEFAULT_CONFIG_PATH);

    let settings = Config::builder()
        .add_source(File::new(DEFAULT_CONFIG_PATH, FileFormat::Toml).required(true))
        .add_source(File::new(LOCAL_CONFIG_PATH, FileFormat::Toml).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .and_then(|config| config.try_deserialize::<AppConfig>());

    match settings {
        Ok(config) => {
            info!("Successfully loaded configuration: {:?}", config);
            Ok(config)
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            Err(e)
        }
    }
}
