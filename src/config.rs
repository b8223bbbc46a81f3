//! System configuration parameters
//!
//! All tunable parameters for the aquarium controller: the appliance
//! table, safety thresholds, heater hysteresis, timing and API limits.
//! Values can be overridden via NVS (see [`crate::adapters::nvs`]).

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::appliance::{ApplianceName, ApplianceSet, MAX_APPLIANCES, RelayState};
use crate::scheduler::{IntervalList, ScheduleInterval, validate_intervals};

/// One relay-driven appliance as configured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplianceSpec {
    pub name: ApplianceName,
    /// Driven by the heater hysteresis controller instead of the schedule.
    pub temperature_controlled: bool,
    /// Schedule output when no interval matches.
    pub default_state: RelayState,
    /// Default schedule, used until (or unless) a stored one is restored.
    pub intervals: IntervalList,
}

impl ApplianceSpec {
    fn new(name: &str, default_state: RelayState, intervals: &[ScheduleInterval]) -> Self {
        let spec_name = ApplianceName::try_from(name);
        let list = IntervalList::from_slice(intervals);
        debug_assert!(spec_name.is_ok(), "built-in name '{name}' too long");
        debug_assert!(list.is_ok(), "built-in schedule for '{name}' too long");
        Self {
            name: spec_name.unwrap_or_default(),
            temperature_controlled: false,
            default_state,
            intervals: list.unwrap_or_default(),
        }
    }

    fn temperature_controlled(mut self) -> Self {
        self.temperature_controlled = true;
        self
    }
}

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    // --- Appliances ---
    /// Relay channels in configuration order.
    pub appliances: heapless::Vec<ApplianceSpec, MAX_APPLIANCES>,

    // --- Emergency ---
    /// Latch when a reading exceeds this (°C).
    pub emergency_high_c: f32,
    /// Latch when a reading falls below this (°C).
    pub emergency_low_c: f32,
    /// Continuous safe time required before the latch auto-clears.
    pub emergency_recovery_secs: u32,
    /// Latch with reason SensorFault after this long without a valid
    /// reading.  `None` = sensor faults never latch.
    pub sensor_fault_latch_secs: Option<u32>,

    // --- Heater ---
    /// Start heating below this (°C).
    pub heater_low_setpoint_c: f32,
    /// Stop heating at or above this (°C), once min runtime is met.
    pub heater_high_setpoint_c: f32,
    /// Minimum time the heater stays on once activated.
    pub heater_min_runtime_secs: u32,

    // --- Sensor ---
    /// Readings below this are classified as sensor faults (°C).
    pub sensor_min_c: f32,
    /// Readings above this are classified as sensor faults (°C).
    pub sensor_max_c: f32,

    // --- Timing ---
    /// Control loop interval (milliseconds)
    pub control_loop_interval_ms: u32,
    /// Telemetry report interval (seconds)
    pub telemetry_interval_secs: u32,
    /// Task watchdog timeout (milliseconds)
    pub watchdog_timeout_ms: u32,

    // --- Control API ---
    /// Largest accepted request body (bytes).
    pub max_body_bytes: u32,
    /// Longest accepted override timeout (minutes).
    pub max_override_minutes: u32,
    /// Sustained request rate (requests per second).
    pub api_rate_per_sec: u32,
    /// Burst capacity of the request rate limiter.
    pub api_burst: u32,
}

impl Default for SystemConfig {
    fn default() -> Self {
        let mut appliances = heapless::Vec::new();
        for spec in [
            ApplianceSpec::new("Filter", RelayState::On, &[]),
            ApplianceSpec::new("CO2", RelayState::Off, &[ScheduleInterval::on(510, 810)]), // 08:30-13:30
            ApplianceSpec::new("Light", RelayState::Off, &[ScheduleInterval::on(600, 1080)]), // 10:00-18:00
            ApplianceSpec::new("Heater", RelayState::Off, &[]).temperature_controlled(),
            ApplianceSpec::new("HangOnFilter", RelayState::On, &[]),
            ApplianceSpec::new("WaveMaker", RelayState::Off, &[ScheduleInterval::on(480, 1320)]), // 08:00-22:00
        ] {
            let pushed = appliances.push(spec);
            debug_assert!(pushed.is_ok(), "built-in table fits MAX_APPLIANCES");
        }

        Self {
            appliances,

            // Emergency
            emergency_high_c: 32.0,
            emergency_low_c: 18.0,
            emergency_recovery_secs: 30 * 60,
            sensor_fault_latch_secs: None,

            // Heater
            heater_low_setpoint_c: 25.0,
            heater_high_setpoint_c: 29.0,
            heater_min_runtime_secs: 30 * 60,

            // Sensor (DS18B20 / NTC usable range)
            sensor_min_c: -55.0,
            sensor_max_c: 125.0,

            // Timing
            control_loop_interval_ms: 1000, // 1 Hz
            telemetry_interval_secs: 60,    // 1/min
            watchdog_timeout_ms: 10_000,

            // Control API
            max_body_bytes: 2048,
            max_override_minutes: 7 * 24 * 60,
            api_rate_per_sec: 10,
            api_burst: 10,
        }
    }
}

impl SystemConfig {
    /// Reject configurations that would make the controller unsafe or
    /// inconsistent.  Values are never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.appliances.is_empty() {
            return Err(ConfigError::ValidationFailed("at least one appliance required"));
        }
        ApplianceSet::from_specs(&self.appliances)?;
        for spec in &self.appliances {
            validate_intervals(&spec.intervals)
                .map_err(|_| ConfigError::ValidationFailed("invalid default schedule interval"))?;
        }

        let finite = [
            self.emergency_high_c,
            self.emergency_low_c,
            self.heater_low_setpoint_c,
            self.heater_high_setpoint_c,
            self.sensor_min_c,
            self.sensor_max_c,
        ];
        if finite.iter().any(|t| !t.is_finite()) {
            return Err(ConfigError::ValidationFailed("temperatures must be finite"));
        }
        if !(self.sensor_min_c < self.emergency_low_c
            && self.emergency_low_c < self.heater_low_setpoint_c
            && self.heater_low_setpoint_c < self.heater_high_setpoint_c
            && self.heater_high_setpoint_c < self.emergency_high_c
            && self.emergency_high_c < self.sensor_max_c)
        {
            return Err(ConfigError::ValidationFailed(
                "require sensor_min < emergency_low < heater_low < heater_high < emergency_high < sensor_max",
            ));
        }

        if self.emergency_recovery_secs == 0 {
            return Err(ConfigError::ValidationFailed("emergency_recovery_secs must be > 0"));
        }
        if self.sensor_fault_latch_secs == Some(0) {
            return Err(ConfigError::ValidationFailed("sensor_fault_latch_secs must be > 0"));
        }
        if !(100..=5000).contains(&self.control_loop_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "control_loop_interval_ms must be 100–5000",
            ));
        }
        if !(5..=3600).contains(&self.telemetry_interval_secs) {
            return Err(ConfigError::ValidationFailed(
                "telemetry_interval_secs must be 5–3600",
            ));
        }
        if self.watchdog_timeout_ms <= self.control_loop_interval_ms * 2 {
            return Err(ConfigError::ValidationFailed(
                "watchdog_timeout_ms must exceed two control periods",
            ));
        }
        if !(64..=16_384).contains(&self.max_body_bytes) {
            return Err(ConfigError::ValidationFailed("max_body_bytes must be 64–16384"));
        }
        if self.max_override_minutes == 0 {
            return Err(ConfigError::ValidationFailed("max_override_minutes must be > 0"));
        }
        if self.api_rate_per_sec == 0 || self.api_burst == 0 {
            return Err(ConfigError::ValidationFailed("API rate limit must be > 0"));
        }
        Ok(())
    }
}
