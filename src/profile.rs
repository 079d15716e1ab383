//! Speed setpoint sequences played through the motor by the demo runner.

use std::time::Duration;

use anyhow::ensure;
use serde::Deserialize;

/// A finite sequence of speed setpoints, indexed by elapsed time.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SpeedProfile {
    /// Triangle wave over normalized speed: 0 → +1 → -1 → 0 per cycle.
    Sweep { period_ms: u64, cycles: u32 },
    /// Raw speeds, each held for `hold_ms`.
    Steps { speeds: Vec<i32>, hold_ms: u64 },
}

/// One speed command produced by a profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Setpoint {
    Normalized(f32),
    Raw(i32),
}

impl SpeedProfile {
    pub fn validate(&self) -> anyhow::Result<()> {
        match self {
            SpeedProfile::Sweep { period_ms, cycles } => {
                ensure!(*period_ms > 0, "sweep period_ms must be positive");
                ensure!(*cycles > 0, "sweep cycles must be positive");
            }
            SpeedProfile::Steps { speeds, hold_ms } => {
                ensure!(!speeds.is_empty(), "steps profile needs at least one speed");
                ensure!(*hold_ms > 0, "steps hold_ms must be positive");
            }
        }
        Ok(())
    }

    /// Total running time of the profile.
    pub fn duration(&self) -> Duration {
        match self {
            SpeedProfile::Sweep { period_ms, cycles } => {
                Duration::from_millis(period_ms.saturating_mul(u64::from(*cycles)))
            }
            SpeedProfile::Steps { speeds, hold_ms } => {
                Duration::from_millis(hold_ms.saturating_mul(speeds.len() as u64))
            }
        }
    }

    /// Setpoint to apply after `elapsed`, or `None` once the profile has finished.
    pub fn setpoint_at(&self, elapsed: Duration) -> Option<Setpoint> {
        if elapsed >= self.duration() {
            return None;
        }
        let elapsed_ms = elapsed.as_millis() as u64;
        match self {
            SpeedProfile::Sweep { period_ms, .. } => {
                let phase = (elapsed_ms % period_ms) as f32 / *period_ms as f32;
                let speed = if phase < 0.25 {
                    4.0 * phase
                } else if phase < 0.75 {
                    2.0 - 4.0 * phase
                } else {
                    4.0 * phase - 4.0
                };
                Some(Setpoint::Normalized(speed))
            }
            SpeedProfile::Steps { speeds, hold_ms } => {
                let index = (elapsed_ms / hold_ms) as usize;
                speeds.get(index).copied().map(Setpoint::Raw)
            }
        }
    }
}
