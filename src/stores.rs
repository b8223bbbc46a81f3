//! Shared control stores.
//!
//! The emergency monitor, override ledger and schedule store are written
//! by two contexts: the control loop (every tick) and the request handler
//! (HTTP server task).  Each store sits behind its own critical-section
//! mutex, and a request is applied inside a single lock so the next tick
//! sees all of it or none of it.
//!
//! ```text
//!   control loop ──┐                         ┌── request handler
//!                  ▼                         ▼
//!   ┌───────────┐ ┌───────────┐ ┌───────────┐ ┌───────────┐
//!   │ emergency │ │ overrides │ │ schedules │ │  status   │
//!   └───────────┘ └───────────┘ └───────────┘ └───────────┘
//! ```
//!
//! Locks are never nested: every accessor takes exactly one store, runs a
//! closure and releases it.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use crate::app::ports::ConfigError;
use crate::appliance::ApplianceSet;
use crate::arbiter::Decisions;
use crate::clock::Instant;
use crate::config::SystemConfig;
use crate::overrides::OverrideLedger;
use crate::safety::{EmergencyMonitor, EmergencyState};
use crate::scheduler::ScheduleStore;
use crate::sensors::TemperatureSample;

/// One store behind a critical-section mutex.
pub type Shared<T> = Mutex<CriticalSectionRawMutex, RefCell<T>>;

fn shared<T>(value: T) -> Shared<T> {
    Mutex::new(RefCell::new(value))
}

/// What status queries report: the outcome of the most recent tick.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub decisions: Decisions,
    /// `None` before the first tick.
    pub sample: Option<TemperatureSample>,
    pub emergency: EmergencyState,
    pub tick_count: u64,
    pub tick_at: Option<Instant>,
}

impl StatusSnapshot {
    /// Every appliance OFF in Schedule mode, as reported before the
    /// first tick has run.
    pub fn initial(appliances: &ApplianceSet) -> Self {
        Self {
            decisions: crate::arbiter::initial_decisions(appliances),
            sample: None,
            emergency: EmergencyState::default(),
            tick_count: 0,
            tick_at: None,
        }
    }
}

/// The shared mutable state of the controller plus its immutable context.
pub struct ControlStores {
    appliances: ApplianceSet,
    max_override_minutes: u32,
    emergency: Shared<EmergencyMonitor>,
    overrides: Shared<OverrideLedger>,
    schedules: Shared<ScheduleStore>,
    status: Shared<StatusSnapshot>,
}

impl ControlStores {
    pub fn new(config: &SystemConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let appliances = ApplianceSet::from_specs(&config.appliances)?;
        let status = StatusSnapshot::initial(&appliances);
        Ok(Self {
            max_override_minutes: config.max_override_minutes,
            emergency: shared(EmergencyMonitor::new(config)),
            overrides: shared(OverrideLedger::new()),
            schedules: shared(ScheduleStore::from_specs(&config.appliances)),
            status: shared(status),
            appliances,
        })
    }

    pub fn appliances(&self) -> &ApplianceSet {
        &self.appliances
    }

    pub fn max_override_minutes(&self) -> u32 {
        self.max_override_minutes
    }

    pub fn with_emergency<R>(&self, f: impl FnOnce(&mut EmergencyMonitor) -> R) -> R {
        self.emergency.lock(|cell| f(&mut *cell.borrow_mut()))
    }

    pub fn with_overrides<R>(&self, f: impl FnOnce(&mut OverrideLedger) -> R) -> R {
        self.overrides.lock(|cell| f(&mut *cell.borrow_mut()))
    }

    pub fn with_schedules<R>(&self, f: impl FnOnce(&mut ScheduleStore) -> R) -> R {
        self.schedules.lock(|cell| f(&mut *cell.borrow_mut()))
    }

    pub fn publish_status(&self, snapshot: StatusSnapshot) {
        self.status.lock(|cell| *cell.borrow_mut() = snapshot);
    }

    pub fn status(&self) -> StatusSnapshot {
        self.status.lock(|cell| cell.borrow().clone())
    }
}
