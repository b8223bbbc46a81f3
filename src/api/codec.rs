//! JSON wire format of the control API.
//!
//! ```text
//! POST /control     {"appliances":[{"name":"Light","action":"OFF","timeout_minutes":30}]}
//!                   {"appliance":"Light","action":"AUTO"}
//! GET  /status      {"appliances":{"Light":{"state":"ON","mode":"SCHEDULE"}},
//!                    "temperature_celsius":26.1,"sensor_fault":false,
//!                    "emergency":{"latched":false,"reason":null},"tick_count":42}
//! PUT  /schedules   {"Light":[{"type":"on_interval","start_min":600,"end_min":1080}]}
//! ```
//!
//! Parsing only checks shape.  Names are resolved and values validated by
//! the engine and the control core.

use std::collections::BTreeMap;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::appliance::{ApplianceSet, RelayState};
use crate::arbiter::ControlMode;
use crate::safety::EmergencyReason;
use crate::scheduler::ScheduleRecord;
use crate::stores::StatusSnapshot;

/// Body failed to parse as the expected document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    Malformed,
    Empty,
    /// Two keys name the same appliance (names match ignoring case).
    DuplicateAppliance,
}

impl core::fmt::Display for CodecError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Malformed => write!(f, "malformed request body"),
            Self::Empty => write!(f, "request names no appliances"),
            Self::DuplicateAppliance => write!(f, "appliance named more than once"),
        }
    }
}

// ── Control ──────────────────────────────────────────────────

/// Requested action for one appliance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ControlAction {
    On,
    Off,
    /// Drop the override; the automatic tiers take over again.
    Auto,
}

impl ControlAction {
    /// Forced relay state, `None` for [`ControlAction::Auto`].
    pub const fn forced_state(self) -> Option<RelayState> {
        match self {
            Self::On => Some(RelayState::On),
            Self::Off => Some(RelayState::Off),
            Self::Auto => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ControlEntry {
    #[serde(alias = "appliance")]
    pub name: String,
    pub action: ControlAction,
    #[serde(default)]
    pub timeout_minutes: Option<u32>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ControlBody {
    Batch { appliances: Vec<ControlEntry> },
    Single(ControlEntry),
}

/// Parse a control body, batch or single form.
pub fn parse_control(body: &[u8]) -> Result<Vec<ControlEntry>, CodecError> {
    let entries = match serde_json::from_slice::<ControlBody>(body) {
        Ok(ControlBody::Batch { appliances }) => appliances,
        Ok(ControlBody::Single(entry)) => vec![entry],
        Err(e) => {
            warn!("api: control body rejected: {}", e);
            return Err(CodecError::Malformed);
        }
    };
    if entries.is_empty() {
        return Err(CodecError::Empty);
    }
    Ok(entries)
}

// ── Schedules ────────────────────────────────────────────────

/// Parse a bulk schedule document (appliance name → intervals).
pub fn parse_schedules(body: &[u8]) -> Result<ScheduleRecord, CodecError> {
    let record: ScheduleRecord = serde_json::from_slice(body).map_err(|e| {
        warn!("api: schedule document rejected: {}", e);
        CodecError::Malformed
    })?;
    if record.is_empty() {
        return Err(CodecError::Empty);
    }
    Ok(record)
}

// ── Status ───────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApplianceStatus {
    pub state: RelayState,
    pub mode: ControlMode,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmergencyStatus {
    pub latched: bool,
    pub reason: Option<EmergencyReason>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusResponse {
    pub appliances: BTreeMap<String, ApplianceStatus>,
    pub temperature_celsius: Option<f32>,
    pub sensor_fault: bool,
    pub emergency: EmergencyStatus,
    pub tick_count: u64,
}

impl StatusResponse {
    pub fn from_snapshot(snapshot: &StatusSnapshot, appliances: &ApplianceSet) -> Self {
        let appliances = snapshot
            .decisions
            .iter()
            .map(|d| {
                (
                    String::from(appliances.name(d.appliance)),
                    ApplianceStatus {
                        state: d.state,
                        mode: d.mode,
                    },
                )
            })
            .collect();
        Self {
            appliances,
            temperature_celsius: snapshot.sample.and_then(|s| s.celsius()),
            sensor_fault: snapshot.sample.is_some_and(|s| s.is_fault()),
            emergency: EmergencyStatus {
                latched: snapshot.emergency.latched,
                reason: snapshot.emergency.reason,
            },
            tick_count: snapshot.tick_count,
        }
    }
}

// ── Acknowledgements ─────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct Ack<'a> {
    pub ok: bool,
    pub detail: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub error: &'a str,
    pub code: u16,
}
