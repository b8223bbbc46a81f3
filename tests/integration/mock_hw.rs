//! Mock adapters for integration tests.
//!
//! Records every relay write so tests can assert on the full command
//! history without touching real GPIO registers, and lets each test
//! script the clock and the probe tick by tick.

use std::cell::{Cell, RefCell};
use std::time::Duration;

use aquacontrol::app::events::AppEvent;
use aquacontrol::app::ports::{
    ClockPort, EventSink, RelayPort, ScheduleRepository, StorageError, TemperaturePort,
};
use aquacontrol::appliance::{ApplianceId, RelayState};
use aquacontrol::clock::{Instant, MINUTES_PER_DAY, MinuteOfDay};
use aquacontrol::scheduler::ScheduleRecord;
use aquacontrol::sensors::TemperatureSample;

// ── Relay call record ─────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayCall {
    Set(ApplianceId, RelayState),
    AllOff,
}

// ── MockHardware ──────────────────────────────────────────────

pub struct MockHardware {
    pub sample: TemperatureSample,
    pub calls: Vec<RelayCall>,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new(celsius: f32) -> Self {
        Self {
            sample: TemperatureSample::Valid(celsius),
            calls: Vec::new(),
        }
    }

    pub fn set_temp(&mut self, celsius: f32) {
        self.sample = TemperatureSample::Valid(celsius);
    }

    pub fn set_fault(&mut self) {
        self.sample = TemperatureSample::Fault;
    }

    /// Last commanded state of `appliance`; OFF after an `all_off`.
    pub fn relay(&self, appliance: ApplianceId) -> RelayState {
        self.calls
            .iter()
            .rev()
            .find_map(|c| match *c {
                RelayCall::Set(id, state) if id == appliance => Some(state),
                RelayCall::AllOff => Some(RelayState::Off),
                _ => None,
            })
            .unwrap_or(RelayState::Off)
    }
}

impl TemperaturePort for MockHardware {
    fn read_temperature(&mut self) -> TemperatureSample {
        self.sample
    }
}

impl RelayPort for MockHardware {
    fn set_relay(&mut self, appliance: ApplianceId, state: RelayState) {
        self.calls.push(RelayCall::Set(appliance, state));
    }

    fn all_off(&mut self) {
        self.calls.push(RelayCall::AllOff);
    }
}

// ── SimClock ──────────────────────────────────────────────────

/// Monotonic time plus wall-clock minute, advanced together by hand.
pub struct SimClock {
    now: Cell<Instant>,
    /// Minute-of-day at `Instant::ZERO`; `None` = wall clock unsynced.
    base_minute: Option<u16>,
}

#[allow(dead_code)]
impl SimClock {
    pub fn at_minute(minute: u16) -> Self {
        Self {
            now: Cell::new(Instant::ZERO),
            base_minute: Some(minute),
        }
    }

    pub fn unsynced() -> Self {
        Self {
            now: Cell::new(Instant::ZERO),
            base_minute: None,
        }
    }

    pub fn advance(&self, d: Duration) {
        self.now.set(self.now.get().saturating_add(d));
    }

    pub fn advance_minutes(&self, minutes: u64) {
        self.advance(Duration::from_secs(minutes * 60));
    }
}

impl ClockPort for SimClock {
    fn now(&self) -> Instant {
        self.now.get()
    }

    fn minute_of_day(&self) -> Option<MinuteOfDay> {
        let base = u64::from(self.base_minute?);
        let elapsed = self.now.get().as_millis() / 60_000;
        MinuteOfDay::new(((base + elapsed) % u64::from(MINUTES_PER_DAY)) as u16)
    }
}

// ── MemRepo ───────────────────────────────────────────────────

/// In-memory schedule repository with a switchable write failure.
#[derive(Default)]
pub struct MemRepo {
    pub saved: RefCell<Option<ScheduleRecord>>,
    pub fail_writes: Cell<bool>,
    pub corrupt: Cell<bool>,
}

#[allow(dead_code)]
impl MemRepo {
    pub fn with_record(record: ScheduleRecord) -> Self {
        Self {
            saved: RefCell::new(Some(record)),
            ..Self::default()
        }
    }
}

impl ScheduleRepository for MemRepo {
    fn load_schedules(&self) -> Result<Option<ScheduleRecord>, StorageError> {
        if self.corrupt.get() {
            return Err(StorageError::Corrupted);
        }
        Ok(self.saved.borrow().clone())
    }

    fn save_schedules(&self, record: &ScheduleRecord) -> Result<(), StorageError> {
        if self.fail_writes.get() {
            return Err(StorageError::IoError);
        }
        *self.saved.borrow_mut() = Some(record.clone());
        Ok(())
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn count(&self, pred: impl Fn(&AppEvent) -> bool) -> usize {
        self.events.iter().filter(|e| pred(e)).count()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}
