//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the priority arbiter (and with it the heater
//! controllers) and shares the control stores with any number of
//! [`ControlHandle`]s.  All I/O flows through port traits injected at
//! call sites, making the entire service testable with mock adapters.
//!
//! ```text
//!   ClockPort ──┐ ┌────────────────────────────┐ ──▶ RelayPort
//!               ├▶│         AppService          │
//! Temperature ──┘ │ Emergency · Overrides ·     │ ──▶ EventSink
//!                 │ Heater · Schedule → Arbiter │
//!                 └──────────────▲──────────────┘
//!                                │ ControlStores (shared)
//!                         ControlHandle ◀── REST API
//! ```

use std::sync::Arc;

use log::{info, warn};

use crate::appliance::{ApplianceName, RelayState};
use crate::arbiter::{Decision, Decisions, EmergencyTransition, PriorityArbiter, TickOutcome};
use crate::config::SystemConfig;
use crate::scheduler::RestoreOutcome;
use crate::sensors::TemperatureSample;
use crate::stores::{ControlStores, StatusSnapshot};

use super::events::{AppEvent, TelemetryData};
use super::handle::ControlHandle;
use super::ports::{
    ClockPort, ConfigError, EventSink, RelayPort, ScheduleRepository, StorageError,
    TemperaturePort,
};

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    stores: Arc<ControlStores>,
    arbiter: PriorityArbiter,
    /// Decisions applied on the previous tick (`None` before the first).
    last_decisions: Option<Decisions>,
    sensor_faulted: bool,
    /// Emit telemetry every this many ticks.
    telemetry_every: u64,
    tick_count: u64,
}

impl AppService {
    /// Construct the service from configuration.
    ///
    /// Does **not** touch the relays; call [`start`](Self::start) next.
    pub fn new(config: &SystemConfig) -> Result<Self, ConfigError> {
        let stores = Arc::new(ControlStores::new(config)?);
        let arbiter = PriorityArbiter::new(config, stores.appliances());
        let telemetry_every = (u64::from(config.telemetry_interval_secs) * 1000
            / u64::from(config.control_loop_interval_ms))
        .max(1);
        Ok(Self {
            stores,
            arbiter,
            last_decisions: None,
            sensor_faulted: false,
            telemetry_every,
            tick_count: 0,
        })
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Restore persisted schedules; anything unusable falls back to the
    /// configured defaults.
    pub fn restore_schedules(&self, repo: &impl ScheduleRepository) -> RestoreOutcome {
        let record = match repo.load_schedules() {
            Ok(record) => record,
            Err(StorageError::NotFound) => None,
            Err(e) => {
                warn!("Stored schedules unreadable ({}), using defaults", e);
                None
            }
        };
        let appliances = self.stores.appliances();
        self.stores
            .with_schedules(|store| store.restore(appliances, record.as_ref()))
    }

    /// Drive every relay OFF and announce the start.
    pub fn start(&mut self, relays: &mut impl RelayPort, sink: &mut impl EventSink) {
        relays.all_off();
        let appliances = self.stores.appliances().len();
        sink.emit(&AppEvent::Started { appliances });
        info!("AppService started with {} appliance(s), all relays OFF", appliances);
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle: read clock + probe → arbitrate →
    /// drive relays → publish status → emit edge events.
    pub fn tick(
        &mut self,
        clock: &impl ClockPort,
        hw: &mut (impl TemperaturePort + RelayPort),
        sink: &mut impl EventSink,
    ) -> Decisions {
        self.tick_count += 1;
        let now = clock.now();
        let minute = clock.minute_of_day();
        let sample = hw.read_temperature();

        self.track_sensor(sample, sink);

        let outcome = self.arbiter.tick(&self.stores, now, minute, sample);

        for d in &outcome.decisions {
            hw.set_relay(d.appliance, d.state);
        }

        self.stores.publish_status(StatusSnapshot {
            decisions: outcome.decisions.clone(),
            sample: Some(sample),
            emergency: outcome.emergency,
            tick_count: self.tick_count,
            tick_at: Some(now),
        });

        self.emit_edges(&outcome, sample, sink);

        if self.tick_count % self.telemetry_every == 0 {
            sink.emit(&AppEvent::Telemetry(self.build_telemetry(&outcome, sample)));
        }

        self.last_decisions = Some(outcome.decisions.clone());
        outcome.decisions
    }

    // ── Queries ───────────────────────────────────────────────

    /// A handle for request-side access to the same stores.
    pub fn handle(&self) -> ControlHandle {
        ControlHandle::new(Arc::clone(&self.stores))
    }

    pub fn stores(&self) -> &ControlStores {
        &self.stores
    }

    pub fn arbiter(&self) -> &PriorityArbiter {
        &self.arbiter
    }

    /// Latest published tick outcome.
    pub fn status(&self) -> StatusSnapshot {
        self.stores.status()
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn sensor_faulted(&self) -> bool {
        self.sensor_faulted
    }

    // ── Internal ──────────────────────────────────────────────

    fn name(&self, d: &Decision) -> ApplianceName {
        self.stores.appliances().name_owned(d.appliance)
    }

    /// Log and report probe fault onset / recovery once per transition.
    fn track_sensor(&mut self, sample: TemperatureSample, sink: &mut impl EventSink) {
        match (self.sensor_faulted, sample) {
            (false, TemperatureSample::Fault) => {
                warn!("Temperature sensor fault: holding heater state");
                self.sensor_faulted = true;
                sink.emit(&AppEvent::SensorFault);
            }
            (true, TemperatureSample::Valid(celsius)) => {
                info!("Temperature sensor recovered: {:.2}\u{00b0}C", celsius);
                self.sensor_faulted = false;
                sink.emit(&AppEvent::SensorRecovered { celsius });
            }
            _ => {}
        }
    }

    fn emit_edges(&self, outcome: &TickOutcome, sample: TemperatureSample, sink: &mut impl EventSink) {
        match outcome.emergency_transition {
            Some(EmergencyTransition::Latched(reason)) => {
                sink.emit(&AppEvent::EmergencyLatched { reason, sample });
            }
            Some(EmergencyTransition::Cleared(cause)) => {
                sink.emit(&AppEvent::EmergencyCleared(cause));
            }
            None => {}
        }

        for o in &outcome.expired {
            let name = self.stores.appliances().name_owned(o.appliance);
            sink.emit(&AppEvent::OverrideExpired {
                appliance: o.appliance,
                name,
            });
        }

        for &(appliance, mode) in &outcome.heater_changes {
            let name = self.stores.appliances().name_owned(appliance);
            info!("Heater {} -> {:?} at {}", name, mode, sample);
            sink.emit(&AppEvent::HeaterChanged {
                appliance,
                name,
                mode,
            });
        }

        for d in &outcome.decisions {
            let changed = self.last_decisions.as_ref().is_none_or(|prev| {
                prev.get(d.appliance.index())
                    .is_none_or(|p| p.state != d.state || p.mode != d.mode)
            });
            if changed {
                sink.emit(&AppEvent::DecisionChanged {
                    appliance: d.appliance,
                    name: self.name(d),
                    state: d.state,
                    mode: d.mode,
                });
            }
        }
    }

    fn build_telemetry(&self, outcome: &TickOutcome, sample: TemperatureSample) -> TelemetryData {
        let relays_on = outcome
            .decisions
            .iter()
            .filter(|d| d.state == RelayState::On)
            .fold(0u8, |acc, d| acc | (1 << d.appliance.index()));
        TelemetryData {
            tick_count: self.tick_count,
            sample,
            emergency_latched: outcome.emergency.latched,
            relays_on,
            active_overrides: self.stores.with_overrides(|l| l.len()),
        }
    }
}
