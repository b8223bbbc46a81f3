//! Priority arbiter: one ON/OFF decision per appliance per tick.
//!
//! Precedence, first applicable wins:
//!
//! | Tier        | Applies when                           | Output            |
//! |-------------|----------------------------------------|-------------------|
//! | Emergency   | latch set                              | OFF, every device |
//! | Manual      | live override for this appliance       | desired state     |
//! | Temperature | appliance is temperature-controlled    | heater mode       |
//! | Schedule    | always                                 | schedule / default|
//!
//! Manual sits above Temperature: an explicit maintenance command is never
//! overridden by automatic heating.
//!
//! Each tick takes the stores one at a time, in pipeline order:
//! emergency → overrides → (heater, arbiter-owned) → schedules.

use serde::Serialize;

use crate::appliance::{ApplianceId, ApplianceSet, MAX_APPLIANCES, RelayState};
use crate::clock::{Instant, MinuteOfDay};
use crate::config::SystemConfig;
use crate::control::heater::{HeaterController, HeaterMode, HeaterParams, HeaterState};
use crate::overrides::Override;
use crate::safety::{ClearCause, EmergencyReason, EmergencyState};
use crate::sensors::TemperatureSample;
use crate::stores::ControlStores;

/// The priority tier that produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMode {
    Emergency,
    Manual,
    #[serde(rename = "TEMP_CONTROLLED")]
    Temperature,
    Schedule,
}

/// Output of one tick for one appliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub appliance: ApplianceId,
    pub state: RelayState,
    pub mode: ControlMode,
}

pub type Decisions = heapless::Vec<Decision, MAX_APPLIANCES>;

/// Everything the tiers say about one appliance this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierInputs {
    pub emergency_latched: bool,
    pub manual: Option<RelayState>,
    /// `Some` only for temperature-controlled appliances.
    pub temperature: Option<RelayState>,
    pub schedule: RelayState,
}

/// Apply the precedence table.
pub fn resolve(inputs: TierInputs) -> (RelayState, ControlMode) {
    if inputs.emergency_latched {
        return (RelayState::Off, ControlMode::Emergency);
    }
    if let Some(state) = inputs.manual {
        return (state, ControlMode::Manual);
    }
    if let Some(state) = inputs.temperature {
        return (state, ControlMode::Temperature);
    }
    (inputs.schedule, ControlMode::Schedule)
}

pub(crate) fn initial_decisions(appliances: &ApplianceSet) -> Decisions {
    appliances
        .ids()
        .map(|appliance| Decision {
            appliance,
            state: RelayState::Off,
            mode: ControlMode::Schedule,
        })
        .collect()
}

/// Latch edge observed by a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmergencyTransition {
    Latched(EmergencyReason),
    Cleared(ClearCause),
}

/// Everything one tick produced.
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutcome {
    pub decisions: Decisions,
    pub emergency: EmergencyState,
    pub emergency_transition: Option<EmergencyTransition>,
    pub heater_changes: heapless::Vec<(ApplianceId, HeaterMode), MAX_APPLIANCES>,
    pub expired: heapless::Vec<Override, MAX_APPLIANCES>,
}

/// Runs the per-tick pipeline and owns the heater state machines, which
/// only the control loop ever touches.
pub struct PriorityArbiter {
    heaters: heapless::Vec<(ApplianceId, HeaterController), MAX_APPLIANCES>,
    last_latched: bool,
}

impl PriorityArbiter {
    pub fn new(config: &SystemConfig, appliances: &ApplianceSet) -> Self {
        let params = HeaterParams::from_config(config);
        let heaters = appliances
            .ids()
            .filter(|&id| appliances.is_temperature_controlled(id))
            .map(|id| (id, HeaterController::new(params)))
            .collect();
        Self {
            heaters,
            last_latched: false,
        }
    }

    pub fn heater_state(&self, appliance: ApplianceId) -> Option<HeaterState> {
        self.heaters
            .iter()
            .find(|(id, _)| *id == appliance)
            .map(|(_, h)| h.state())
    }

    /// One control cycle.  `minute` is `None` while wall-clock time is
    /// unknown; the schedule tier then yields each default state.
    pub fn tick(
        &mut self,
        stores: &ControlStores,
        now: Instant,
        minute: Option<MinuteOfDay>,
        sample: TemperatureSample,
    ) -> TickOutcome {
        let appliances = stores.appliances();

        // 1. Emergency latch
        let emergency = stores.with_emergency(|m| m.update(sample, now));
        let emergency_transition = match (self.last_latched, emergency.latched) {
            (false, true) => emergency.reason.map(EmergencyTransition::Latched),
            (true, false) => emergency.last_clear.map(EmergencyTransition::Cleared),
            _ => None,
        };
        self.last_latched = emergency.latched;

        // 2. Overrides: drop the due ones, snapshot the live ones
        let (expired, manual) = stores.with_overrides(|ledger| {
            let expired = ledger.expire_due(now);
            let mut manual = [None; MAX_APPLIANCES];
            for id in appliances.ids() {
                manual[id.index()] = ledger.get(id, now).map(|o| o.desired_state);
            }
            (expired, manual)
        });

        // 3. Heaters, stepped every tick; shadowing only discards output
        let mut heater_changes = heapless::Vec::new();
        for (id, heater) in &mut self.heaters {
            if let Some(mode) = heater.step(sample, now) {
                let pushed = heater_changes.push((*id, mode));
                debug_assert!(pushed.is_ok(), "one change per heater fits");
            }
        }

        // 4. Schedules
        let mut schedule = [RelayState::Off; MAX_APPLIANCES];
        stores.with_schedules(|store| {
            for id in appliances.ids() {
                schedule[id.index()] = match minute {
                    Some(m) => store.evaluate(id, m),
                    None => store.default_state(id),
                };
            }
        });

        // 5. Arbitrate
        let decisions = appliances
            .ids()
            .map(|appliance| {
                let temperature = self
                    .heaters
                    .iter()
                    .find(|(id, _)| *id == appliance)
                    .map(|(_, h)| h.output());
                let (state, mode) = resolve(TierInputs {
                    emergency_latched: emergency.latched,
                    manual: manual[appliance.index()],
                    temperature,
                    schedule: schedule[appliance.index()],
                });
                Decision {
                    appliance,
                    state,
                    mode,
                }
            })
            .collect();

        TickOutcome {
            decisions,
            emergency,
            emergency_transition,
            heater_changes,
            expired,
        }
    }
}
