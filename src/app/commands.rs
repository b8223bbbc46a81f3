//! Inbound commands to the control core.
//!
//! These represent actions requested by the outside world (REST API,
//! serial console) that the [`ControlHandle`](super::handle::ControlHandle)
//! validates and applies.  Names have already been resolved to
//! [`ApplianceId`]s by the boundary.

use crate::appliance::{ApplianceId, RelayState};
use crate::scheduler::ScheduleInterval;

/// What to do with one appliance's override.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideAction {
    /// Pin the appliance to `state`, optionally for `timeout_minutes`.
    Force {
        state: RelayState,
        timeout_minutes: Option<u32>,
    },
    /// Drop any override and return the appliance to automatic control.
    Release,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OverrideRequest {
    pub appliance: ApplianceId,
    pub action: OverrideAction,
}

/// Commands that external adapters can send into the control core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    /// Apply a batch of override changes: all of them, or none.
    ApplyOverrides(Vec<OverrideRequest>),

    /// Replace the interval lists of the listed appliances: all, or none.
    ReplaceSchedules(Vec<(ApplianceId, Vec<ScheduleInterval>)>),

    /// Manual emergency reset; refused unless the latest reading is safe.
    ResetEmergency,
}

/// Result of a successfully applied command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    OverridesApplied { count: usize },
    SchedulesReplaced { count: usize },
    EmergencyCleared,
    EmergencyNotLatched,
}
