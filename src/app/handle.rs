//! Request-side access to the control stores.
//!
//! [`ControlHandle`] is cheap to clone and `Send + Sync`; the HTTP server
//! task owns one while the control loop owns the
//! [`AppService`](super::service::AppService).  Every command is checked
//! in full before anything is written, then written under a single store
//! lock, so the next tick sees either the whole request or none of it.

use std::sync::Arc;

use log::{info, warn};

use crate::appliance::{ApplianceId, MAX_APPLIANCES};
use crate::clock::Instant;
use crate::error::CommandError;
use crate::safety::ResetOutcome;
use crate::scheduler::{IntervalList, ScheduleRecord, validate_intervals};
use crate::stores::{ControlStores, StatusSnapshot};

use super::commands::{AppCommand, CommandOutcome, OverrideAction, OverrideRequest};

#[derive(Clone)]
pub struct ControlHandle {
    stores: Arc<ControlStores>,
}

impl ControlHandle {
    pub fn new(stores: Arc<ControlStores>) -> Self {
        Self { stores }
    }

    pub fn stores(&self) -> &ControlStores {
        &self.stores
    }

    /// Validate and apply `cmd` as of `now`.
    pub fn execute(&self, cmd: AppCommand, now: Instant) -> Result<CommandOutcome, CommandError> {
        match cmd {
            AppCommand::ApplyOverrides(requests) => self.apply_overrides(&requests, now),
            AppCommand::ReplaceSchedules(updates) => self.replace_schedules(&updates),
            AppCommand::ResetEmergency => {
                match self.stores.with_emergency(|m| m.reset(now))? {
                    ResetOutcome::Cleared => {
                        info!("Emergency reset accepted at {}", now);
                        Ok(CommandOutcome::EmergencyCleared)
                    }
                    ResetOutcome::NotLatched => Ok(CommandOutcome::EmergencyNotLatched),
                }
            }
        }
    }

    fn apply_overrides(
        &self,
        requests: &[OverrideRequest],
        now: Instant,
    ) -> Result<CommandOutcome, CommandError> {
        let max = self.stores.max_override_minutes();
        for req in requests {
            if let OverrideAction::Force {
                timeout_minutes: Some(minutes),
                ..
            } = req.action
            {
                if minutes == 0 || minutes > max {
                    warn!("Override rejected: timeout {} min outside 1-{}", minutes, max);
                    return Err(CommandError::InvalidTimeout { minutes, max });
                }
            }
        }

        let appliances = self.stores.appliances();
        self.stores.with_overrides(|ledger| {
            for req in requests {
                let name = appliances.name(req.appliance);
                match req.action {
                    OverrideAction::Force {
                        state,
                        timeout_minutes,
                    } => {
                        ledger.set(req.appliance, state, timeout_minutes, now);
                        match timeout_minutes {
                            Some(m) => info!("Override: {} -> {} for {} min", name, state, m),
                            None => info!("Override: {} -> {} until cleared", name, state),
                        }
                    }
                    OverrideAction::Release => {
                        if ledger.clear(req.appliance).is_some() {
                            info!("Override: {} released", name);
                        }
                    }
                }
            }
        });
        Ok(CommandOutcome::OverridesApplied {
            count: requests.len(),
        })
    }

    fn replace_schedules(
        &self,
        updates: &[(ApplianceId, Vec<crate::scheduler::ScheduleInterval>)],
    ) -> Result<CommandOutcome, CommandError> {
        let mut validated: heapless::Vec<(ApplianceId, IntervalList), MAX_APPLIANCES> =
            heapless::Vec::new();
        for (appliance, intervals) in updates {
            let list = validate_intervals(intervals).inspect_err(|e| {
                warn!(
                    "Schedule for {} rejected: {}",
                    self.stores.appliances().name(*appliance),
                    e
                );
            })?;
            // A repeated appliance replaces its earlier entry.
            if let Some(slot) = validated.iter_mut().find(|(id, _)| id == appliance) {
                slot.1 = list;
            } else if validated.push((*appliance, list)).is_err() {
                return Err(CommandError::Schedule(crate::error::ScheduleError::TooManyIntervals));
            }
        }

        self.stores.with_schedules(|store| store.replace_all(&validated))?;
        info!("Schedules replaced for {} appliance(s)", validated.len());
        Ok(CommandOutcome::SchedulesReplaced {
            count: validated.len(),
        })
    }

    /// Latest published tick outcome.
    pub fn status(&self) -> StatusSnapshot {
        self.stores.status()
    }

    /// Current schedules in persisted / wire form.
    pub fn schedule_record(&self) -> ScheduleRecord {
        let appliances = self.stores.appliances();
        self.stores.with_schedules(|store| store.to_record(appliances))
    }
}
