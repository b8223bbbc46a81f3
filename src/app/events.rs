//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them; log to serial, drive the buzzer,
//! publish over MQTT, etc.  Events fire on edges, never once per tick.

use crate::appliance::{ApplianceId, ApplianceName, RelayState};
use crate::arbiter::ControlMode;
use crate::control::heater::HeaterMode;
use crate::safety::{ClearCause, EmergencyReason};
use crate::sensors::TemperatureSample;

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// The service has started with every relay off.
    Started { appliances: usize },

    /// The emergency latch was set; every appliance is now forced OFF.
    EmergencyLatched {
        reason: EmergencyReason,
        sample: TemperatureSample,
    },

    /// The emergency latch was released.
    EmergencyCleared(ClearCause),

    /// A heater controller switched between Idle and Heating.
    HeaterChanged {
        appliance: ApplianceId,
        name: ApplianceName,
        mode: HeaterMode,
    },

    /// A timed override reached its deadline and was dropped.
    OverrideExpired {
        appliance: ApplianceId,
        name: ApplianceName,
    },

    /// The probe stopped delivering valid readings.
    SensorFault,

    /// The probe is delivering valid readings again.
    SensorRecovered { celsius: f32 },

    /// An appliance's decision (state or mode) differs from last tick.
    DecisionChanged {
        appliance: ApplianceId,
        name: ApplianceName,
        state: RelayState,
        mode: ControlMode,
    },

    /// Periodic telemetry snapshot.
    Telemetry(TelemetryData),
}

/// A point-in-time telemetry snapshot suitable for logging or transmission.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryData {
    pub tick_count: u64,
    pub sample: TemperatureSample,
    pub emergency_latched: bool,
    /// Bit `n` set = appliance `n` commanded ON.
    pub relays_on: u8,
    pub active_overrides: usize,
}
