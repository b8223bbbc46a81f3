//! Fuzz target: `POST /control` through the full API engine
//!
//! Feeds arbitrary bodies to an authenticated control request and then
//! runs one control tick, checking that the engine never panics and that
//! a rejected request leaves the override ledger untouched.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - Non-200 responses change no override
//! - Responses are always valid JSON
//!
//! cargo fuzz run fuzz_control_payload

#![no_main]

use critical_section as _;
use libfuzzer_sys::fuzz_target;

use aquacontrol::api::{ApiKey, ApiRequest, ControlApi};
use aquacontrol::app::events::AppEvent;
use aquacontrol::app::ports::{
    ClockPort, EventSink, RelayPort, ScheduleRepository, StorageError, TemperaturePort,
};
use aquacontrol::app::service::AppService;
use aquacontrol::appliance::{ApplianceId, RelayState};
use aquacontrol::clock::{Instant, MinuteOfDay};
use aquacontrol::config::SystemConfig;
use aquacontrol::scheduler::ScheduleRecord;
use aquacontrol::sensors::TemperatureSample;

struct Fixed;

impl ClockPort for Fixed {
    fn now(&self) -> Instant {
        Instant::from_secs(60)
    }
    fn minute_of_day(&self) -> Option<MinuteOfDay> {
        MinuteOfDay::new(600)
    }
}

struct Hw;

impl TemperaturePort for Hw {
    fn read_temperature(&mut self) -> TemperatureSample {
        TemperatureSample::Valid(26.0)
    }
}

impl RelayPort for Hw {
    fn set_relay(&mut self, _: ApplianceId, _: RelayState) {}
    fn all_off(&mut self) {}
}

struct Quiet;

impl EventSink for Quiet {
    fn emit(&mut self, _: &AppEvent) {}
}

struct NoRepo;

impl ScheduleRepository for NoRepo {
    fn load_schedules(&self) -> Result<Option<ScheduleRecord>, StorageError> {
        Ok(None)
    }
    fn save_schedules(&self, _: &ScheduleRecord) -> Result<(), StorageError> {
        Ok(())
    }
}

fuzz_target!(|data: &[u8]| {
    let cfg = SystemConfig {
        api_burst: 1000,
        ..Default::default()
    };
    let Ok(mut app) = AppService::new(&cfg) else {
        return;
    };
    let mut api = ControlApi::new(app.handle(), ApiKey::new(b"fuzz"), &cfg);

    let resp = api.respond(Some(b"fuzz"), ApiRequest::Control(data), Fixed.now(), &NoRepo);
    assert!(serde_json::from_str::<serde_json::Value>(&resp.body).is_ok());
    if resp.status != 200 {
        assert!(app.stores().with_overrides(|l| l.is_empty()));
    }

    let _ = app.tick(&Fixed, &mut Hw, &mut Quiet);
});
