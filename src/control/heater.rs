//! Heater hysteresis controller.
//!
//! Two states, two setpoints and a minimum runtime:
//!
//! ```text
//!            t < low_setpoint
//!   Idle ─────────────────────────▶ Heating   (activated_at = now)
//!     ▲                                │
//!     └────────────────────────────────┘
//!     t ≥ high_setpoint AND now − activated_at ≥ min_runtime
//! ```
//!
//! Anything else leaves the state unchanged, including a fault sample.
//! The arbiter steps the controller on every tick, including ticks where
//! the emergency latch or a manual override shadows it; only the output
//! is discarded then, so the state is current when the shadow lifts.

use core::time::Duration;

use serde::Serialize;

use crate::appliance::RelayState;
use crate::clock::Instant;
use crate::config::SystemConfig;
use crate::sensors::TemperatureSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HeaterMode {
    Idle,
    Heating,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeaterState {
    pub mode: HeaterMode,
    /// Set on Idle→Heating, cleared on Heating→Idle.
    pub activated_at: Option<Instant>,
}

impl HeaterState {
    pub const IDLE: Self = Self {
        mode: HeaterMode::Idle,
        activated_at: None,
    };
}

/// Hysteresis parameters shared by every heater.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HeaterParams {
    pub low_setpoint_c: f32,
    pub high_setpoint_c: f32,
    pub min_runtime: Duration,
}

impl HeaterParams {
    pub fn from_config(config: &SystemConfig) -> Self {
        Self {
            low_setpoint_c: config.heater_low_setpoint_c,
            high_setpoint_c: config.heater_high_setpoint_c,
            min_runtime: Duration::from_secs(u64::from(config.heater_min_runtime_secs)),
        }
    }
}

/// One heater's state machine.
#[derive(Debug, Clone)]
pub struct HeaterController {
    params: HeaterParams,
    state: HeaterState,
}

impl HeaterController {
    pub fn new(params: HeaterParams) -> Self {
        Self {
            params,
            state: HeaterState::IDLE,
        }
    }

    pub fn state(&self) -> HeaterState {
        self.state
    }

    /// Relay output implied by the current mode.
    pub fn output(&self) -> RelayState {
        RelayState::from_bool(self.state.mode == HeaterMode::Heating)
    }

    /// Advance the state machine.  Returns the new mode on a transition.
    pub fn step(&mut self, sample: TemperatureSample, now: Instant) -> Option<HeaterMode> {
        let TemperatureSample::Valid(celsius) = sample else {
            return None;
        };

        match self.state.mode {
            HeaterMode::Idle if celsius < self.params.low_setpoint_c => {
                self.state = HeaterState {
                    mode: HeaterMode::Heating,
                    activated_at: Some(now),
                };
                Some(HeaterMode::Heating)
            }
            HeaterMode::Heating if celsius >= self.params.high_setpoint_c => {
                let ran = self
                    .state
                    .activated_at
                    .map_or(Duration::MAX, |t| now.saturating_duration_since(t));
                if ran >= self.params.min_runtime {
                    self.state = HeaterState::IDLE;
                    Some(HeaterMode::Idle)
                } else {
                    None
                }
            }
            _ => None,
        }
    }
}
