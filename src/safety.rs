//! Emergency monitor.
//!
//! The monitor runs **first in every tick** and owns the only state with
//! authority to force every appliance OFF.  It is a latch:
//!
//! 1. A valid reading above `emergency_high_c` or below `emergency_low_c`
//!    latches it and records the reason.
//! 2. While latched, each safe reading extends a continuous safe streak;
//!    an unsafe reading restarts it.  Once the streak spans the recovery
//!    window the latch clears by itself.
//! 3. A manual reset clears it immediately, but only if the most recent
//!    reading is inside the safe band.
//!
//! A sensor fault is "no new evidence": it neither latches nor clears,
//! and neither breaks nor extends a safe streak.  A deployment can opt in
//! to latching on a fault that persists for `sensor_fault_latch_secs`.

use core::fmt;
use core::time::Duration;

use log::{error, info, warn};
use serde::Serialize;

use crate::clock::Instant;
use crate::config::SystemConfig;
use crate::error::CommandError;
use crate::sensors::TemperatureSample;

/// Why the latch was set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmergencyReason {
    HighTemp,
    LowTemp,
    SensorFault,
}

impl fmt::Display for EmergencyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HighTemp => write!(f, "temperature above high threshold"),
            Self::LowTemp => write!(f, "temperature below low threshold"),
            Self::SensorFault => write!(f, "sustained sensor fault"),
        }
    }
}

/// How the most recent latch was cleared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClearCause {
    AutoRecovered,
    ManualReset,
}

/// Process-wide emergency latch state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EmergencyState {
    pub latched: bool,
    pub reason: Option<EmergencyReason>,
    pub latched_at: Option<Instant>,
    /// Last tick with a reading inside the safe band.
    pub last_safe_at: Option<Instant>,
    /// Start of the current uninterrupted safe streak while latched.
    pub safe_since: Option<Instant>,
    pub last_clear: Option<ClearCause>,
}

/// Successful reset request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetOutcome {
    Cleared,
    /// Nothing to reset.
    NotLatched,
}

/// Latched temperature safety monitor.
#[derive(Debug, Clone)]
pub struct EmergencyMonitor {
    high_c: f32,
    low_c: f32,
    recovery: Duration,
    fault_latch: Option<Duration>,
    state: EmergencyState,
    /// Most recent sample seen by `update`; reset decisions use it.
    last_sample: Option<TemperatureSample>,
    fault_since: Option<Instant>,
}

impl EmergencyMonitor {
    pub fn new(config: &SystemConfig) -> Self {
        Self {
            high_c: config.emergency_high_c,
            low_c: config.emergency_low_c,
            recovery: Duration::from_secs(u64::from(config.emergency_recovery_secs)),
            fault_latch: config
                .sensor_fault_latch_secs
                .map(|s| Duration::from_secs(u64::from(s))),
            state: EmergencyState::default(),
            last_sample: None,
            fault_since: None,
        }
    }

    pub fn state(&self) -> EmergencyState {
        self.state
    }

    pub fn is_latched(&self) -> bool {
        self.state.latched
    }

    pub fn last_sample(&self) -> Option<TemperatureSample> {
        self.last_sample
    }

    /// `None` when `celsius` is inside the safe band.
    fn unsafe_reason(&self, celsius: f32) -> Option<EmergencyReason> {
        if celsius > self.high_c {
            Some(EmergencyReason::HighTemp)
        } else if celsius < self.low_c {
            Some(EmergencyReason::LowTemp)
        } else {
            None
        }
    }

    /// Feed this tick's sample and return the resulting state.
    pub fn update(&mut self, sample: TemperatureSample, now: Instant) -> EmergencyState {
        self.last_sample = Some(sample);

        match sample {
            TemperatureSample::Valid(celsius) => {
                self.fault_since = None;
                match self.unsafe_reason(celsius) {
                    Some(reason) => {
                        self.state.safe_since = None;
                        if !self.state.latched {
                            self.latch(reason, now, celsius);
                        }
                    }
                    None => {
                        self.state.last_safe_at = Some(now);
                        if self.state.latched {
                            let since = *self.state.safe_since.get_or_insert(now);
                            if now.saturating_duration_since(since) >= self.recovery {
                                self.clear(ClearCause::AutoRecovered, now);
                            }
                        }
                    }
                }
            }
            TemperatureSample::Fault => {
                let since = *self.fault_since.get_or_insert(now);
                if let Some(window) = self.fault_latch {
                    if !self.state.latched && now.saturating_duration_since(since) >= window {
                        self.latch(EmergencyReason::SensorFault, now, f32::NAN);
                    }
                }
            }
        }

        self.state
    }

    /// Manual reset.  Clears the latch only if the latest reading is
    /// valid and inside the safe band.
    pub fn reset(&mut self, now: Instant) -> Result<ResetOutcome, CommandError> {
        if !self.state.latched {
            return Ok(ResetOutcome::NotLatched);
        }
        match self.last_sample {
            Some(TemperatureSample::Valid(c)) if self.unsafe_reason(c).is_none() => {
                self.clear(ClearCause::ManualReset, now);
                Ok(ResetOutcome::Cleared)
            }
            other => {
                warn!(
                    "EMERGENCY reset rejected: latest reading {}",
                    other.map_or_else(|| "none".into(), |s| s.to_string())
                );
                Err(CommandError::EmergencyUnsafe)
            }
        }
    }

    fn latch(&mut self, reason: EmergencyReason, now: Instant, celsius: f32) {
        error!("EMERGENCY LATCHED: {reason} ({celsius:.2}\u{00b0}C) at {now}");
        self.state.latched = true;
        self.state.reason = Some(reason);
        self.state.latched_at = Some(now);
        self.state.safe_since = None;
    }

    fn clear(&mut self, cause: ClearCause, now: Instant) {
        info!("EMERGENCY CLEARED: {:?} at {}", cause, now);
        self.state.latched = false;
        self.state.reason = None;
        self.state.latched_at = None;
        self.state.safe_since = None;
        self.state.last_clear = Some(cause);
    }
}
