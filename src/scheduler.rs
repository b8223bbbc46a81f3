//! Time-of-day schedule store.
//!
//! Each appliance owns an ordered list of minute-based intervals plus a
//! default state.  Evaluation walks the list in stored order and the
//! first interval containing the minute wins; if none matches the
//! appliance's default state applies.
//!
//! ```text
//!  minute 600 ──▶ [ on 510..810 ] [ off 540..560 ] ──▶ ON  (first match)
//!  minute 900 ──▶ [ on 510..810 ] [ off 540..560 ] ──▶ default_state
//! ```
//!
//! Overlapping intervals are allowed; first-match-wins is the tie-break.
//! Updates validate the complete list before anything is replaced, so a
//! reader never sees half of a submitted schedule.

use std::collections::BTreeMap;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::appliance::{ApplianceId, ApplianceSet, MAX_APPLIANCES, RelayState};
use crate::clock::{MINUTES_PER_DAY, MinuteOfDay};
use crate::config::ApplianceSpec;
use crate::error::ScheduleError;

/// Intervals one appliance can hold.
pub const MAX_INTERVALS: usize = 8;

/// Largest minute accepted as an interval bound.
pub const MAX_MINUTE: u16 = MINUTES_PER_DAY - 1;

pub type IntervalList = heapless::Vec<ScheduleInterval, MAX_INTERVALS>;

/// Persisted / wire form of every schedule: appliance name → interval list.
pub type ScheduleRecord = BTreeMap<String, Vec<ScheduleInterval>>;

// ═══════════════════════════════════════════════════════════════
//  Schedule types
// ═══════════════════════════════════════════════════════════════

/// What an interval does while it is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalKind {
    OnInterval,
    OffInterval,
}

impl IntervalKind {
    pub const fn state(self) -> RelayState {
        match self {
            Self::OnInterval => RelayState::On,
            Self::OffInterval => RelayState::Off,
        }
    }
}

/// Half-open minute range `[start_min, end_min)` within one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleInterval {
    #[serde(rename = "type")]
    pub kind: IntervalKind,
    pub start_min: u16,
    pub end_min: u16,
}

impl ScheduleInterval {
    pub const fn on(start_min: u16, end_min: u16) -> Self {
        Self { kind: IntervalKind::OnInterval, start_min, end_min }
    }

    pub const fn off(start_min: u16, end_min: u16) -> Self {
        Self { kind: IntervalKind::OffInterval, start_min, end_min }
    }

    pub fn contains(&self, minute: MinuteOfDay) -> bool {
        (self.start_min..self.end_min).contains(&minute.get())
    }
}

/// One appliance's schedule.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplianceSchedule {
    pub intervals: IntervalList,
    pub default_state: RelayState,
}

impl ApplianceSchedule {
    pub fn evaluate(&self, minute: MinuteOfDay) -> RelayState {
        self.intervals
            .iter()
            .find(|iv| iv.contains(minute))
            .map_or(self.default_state, |iv| iv.kind.state())
    }
}

/// Check every interval and copy the list into bounded storage.
///
/// Rejects on the first violation; nothing is returned for a partially
/// valid list.
pub fn validate_intervals(intervals: &[ScheduleInterval]) -> Result<IntervalList, ScheduleError> {
    if intervals.len() > MAX_INTERVALS {
        return Err(ScheduleError::TooManyIntervals);
    }
    let mut list = IntervalList::new();
    for (index, iv) in intervals.iter().enumerate() {
        if iv.start_min > MAX_MINUTE || iv.end_min > MAX_MINUTE {
            return Err(ScheduleError::OutOfRange { index });
        }
        if iv.start_min >= iv.end_min {
            return Err(ScheduleError::NotIncreasing { index });
        }
        list.push(*iv).map_err(|_| ScheduleError::TooManyIntervals)?;
    }
    Ok(list)
}

/// Result of restoring schedules from the persisted record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    /// Record applied; `applied` appliances restored, `skipped` unknown
    /// names ignored.
    Restored { applied: usize, skipped: usize },
    /// Record missing, empty or invalid; configuration defaults in force.
    Defaults,
}

// ═══════════════════════════════════════════════════════════════
//  Schedule store
// ═══════════════════════════════════════════════════════════════

/// Schedules for every configured appliance, indexed by [`ApplianceId`].
#[derive(Debug, Clone)]
pub struct ScheduleStore {
    schedules: heapless::Vec<ApplianceSchedule, MAX_APPLIANCES>,
    defaults: heapless::Vec<ApplianceSchedule, MAX_APPLIANCES>,
}

impl ScheduleStore {
    /// Build the store from the appliance table.  Specs are expected to
    /// have passed [`SystemConfig::validate`](crate::config::SystemConfig::validate);
    /// an invalid default list here degrades to "no intervals".
    pub fn from_specs(specs: &[ApplianceSpec]) -> Self {
        let mut defaults = heapless::Vec::new();
        for spec in specs.iter().take(MAX_APPLIANCES) {
            let intervals = validate_intervals(&spec.intervals).unwrap_or_else(|e| {
                warn!("Schedule: default for '{}' invalid ({}), ignoring", spec.name, e);
                IntervalList::new()
            });
            let pushed = defaults.push(ApplianceSchedule {
                intervals,
                default_state: spec.default_state,
            });
            debug_assert!(pushed.is_ok(), "bounded by take(MAX_APPLIANCES)");
        }
        Self { schedules: defaults.clone(), defaults }
    }

    /// Decide the schedule tier's output for `appliance` at `minute`.
    pub fn evaluate(&self, appliance: ApplianceId, minute: MinuteOfDay) -> RelayState {
        self.schedules
            .get(appliance.index())
            .map_or(RelayState::Off, |s| s.evaluate(minute))
    }

    pub fn default_state(&self, appliance: ApplianceId) -> RelayState {
        self.schedules
            .get(appliance.index())
            .map_or(RelayState::Off, |s| s.default_state)
    }

    pub fn intervals(&self, appliance: ApplianceId) -> &[ScheduleInterval] {
        self.schedules
            .get(appliance.index())
            .map_or(&[] as &[ScheduleInterval], |s| s.intervals.as_slice())
    }

    /// Replace one appliance's interval list, or reject it unchanged.
    pub fn update(
        &mut self,
        appliance: ApplianceId,
        intervals: &[ScheduleInterval],
    ) -> Result<(), ScheduleError> {
        let list = validate_intervals(intervals)?;
        if let Some(slot) = self.schedules.get_mut(appliance.index()) {
            slot.intervals = list;
        }
        Ok(())
    }

    /// Replace several lists at once.  Every list is validated before the
    /// first one is written.
    pub fn replace_all(
        &mut self,
        updates: &[(ApplianceId, IntervalList)],
    ) -> Result<(), ScheduleError> {
        for (_, intervals) in updates {
            validate_intervals(intervals)?;
        }
        for (appliance, intervals) in updates {
            if let Some(slot) = self.schedules.get_mut(appliance.index()) {
                slot.intervals = intervals.clone();
            }
        }
        Ok(())
    }

    /// Put every appliance back on its configured schedule.
    pub fn restore_defaults(&mut self) {
        self.schedules = self.defaults.clone();
    }

    /// Snapshot every appliance's intervals, keyed by canonical name.
    pub fn to_record(&self, appliances: &ApplianceSet) -> ScheduleRecord {
        appliances
            .ids()
            .map(|id| (String::from(appliances.name(id)), self.intervals(id).to_vec()))
            .collect()
    }

    /// Apply a persisted record.
    ///
    /// A missing or empty record, or one with any invalid interval list,
    /// leaves the configured defaults in force.  Names that don't match a
    /// configured appliance are skipped; appliances absent from the record
    /// keep their defaults.
    pub fn restore(
        &mut self,
        appliances: &ApplianceSet,
        record: Option<&ScheduleRecord>,
    ) -> RestoreOutcome {
        self.restore_defaults();

        let Some(record) = record.filter(|r| !r.is_empty()) else {
            info!("Schedule: no stored schedules, using configuration defaults");
            return RestoreOutcome::Defaults;
        };

        let mut updates: heapless::Vec<(ApplianceId, IntervalList), MAX_APPLIANCES> =
            heapless::Vec::new();
        let mut skipped = 0;
        for (name, intervals) in record {
            let Some(id) = appliances.lookup(name) else {
                warn!("Schedule: stored entry for unknown appliance '{}' skipped", name);
                skipped += 1;
                continue;
            };
            if updates.iter().any(|(u, _)| *u == id) {
                warn!("Schedule: stored record names '{}' twice, using defaults", appliances.name(id));
                return RestoreOutcome::Defaults;
            }
            match validate_intervals(intervals) {
                Ok(list) => {
                    if updates.push((id, list)).is_err() {
                        warn!("Schedule: stored record has too many entries, using defaults");
                        return RestoreOutcome::Defaults;
                    }
                }
                Err(e) => {
                    warn!("Schedule: stored entry for '{}' invalid ({}), using defaults", name, e);
                    return RestoreOutcome::Defaults;
                }
            }
        }

        if self.replace_all(&updates).is_err() {
            return RestoreOutcome::Defaults;
        }
        info!(
            "Schedule: restored {} appliance schedule(s), {} skipped",
            updates.len(),
            skipped
        );
        RestoreOutcome::Restored { applied: updates.len(), skipped }
    }
}

// ═══════════════════════════════════════════════════════════════
//  Tests
// ═══════════════════════════════════════════════════════════════
