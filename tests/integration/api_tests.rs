//! Integration tests for the control API boundary.
//!
//! Requests go through [`ControlApi`] exactly as the HTTP task sends
//! them; the control loop runs in between so the effect of each request
//! is checked on the relays, not just on the response.

use aquacontrol::api::{ApiKey, ApiRequest, ApiResponse, ControlApi};
use aquacontrol::app::ports::ClockPort;
use aquacontrol::app::service::AppService;
use aquacontrol::appliance::RelayState;
use aquacontrol::config::SystemConfig;
use aquacontrol::scheduler::ScheduleInterval;
use serde_json::Value;

use crate::mock_hw::{MemRepo, MockHardware, RecordingSink, SimClock};

const KEY: &[u8] = b"reef-key";

struct Bench {
    app: AppService,
    api: ControlApi,
    hw: MockHardware,
    sink: RecordingSink,
    clock: SimClock,
    repo: MemRepo,
}

impl Bench {
    fn new(config: &SystemConfig, celsius: f32) -> Self {
        let mut app = AppService::new(config).unwrap();
        let mut hw = MockHardware::new(celsius);
        let mut sink = RecordingSink::default();
        app.start(&mut hw, &mut sink);
        let api = ControlApi::new(app.handle(), ApiKey::new(KEY), config);
        Self {
            app,
            api,
            hw,
            sink,
            clock: SimClock::at_minute(600),
            repo: MemRepo::default(),
        }
    }

    fn tick(&mut self) {
        self.app.tick(&self.clock, &mut self.hw, &mut self.sink);
    }

    fn send(&mut self, request: ApiRequest<'_>) -> ApiResponse {
        self.api.respond(Some(KEY), request, self.clock.now(), &self.repo)
    }

    fn relay(&self, name: &str) -> RelayState {
        self.hw.relay(self.app.stores().appliances().lookup(name).unwrap())
    }
}

fn json(resp: &ApiResponse) -> Value {
    serde_json::from_str(&resp.body).unwrap()
}

#[test]
fn status_reflects_latest_tick() {
    let mut b = Bench::new(&SystemConfig::default(), 24.5);
    b.tick();

    let resp = b.send(ApiRequest::Status);
    assert_eq!(resp.status, 200);
    let body = json(&resp);
    assert_eq!(body["appliances"]["Heater"]["state"], "ON");
    assert_eq!(body["appliances"]["Heater"]["mode"], "TEMP_CONTROLLED");
    assert_eq!(body["appliances"]["CO2"]["mode"], "SCHEDULE");
    assert_eq!(body["temperature_celsius"], 24.5);
    assert_eq!(body["sensor_fault"], false);
    assert_eq!(body["emergency"]["latched"], false);
    assert_eq!(body["tick_count"], 1);
}

#[test]
fn control_request_drives_relay_on_next_tick() {
    let mut b = Bench::new(&SystemConfig::default(), 26.0);
    b.tick();
    assert_eq!(b.relay("Light"), RelayState::On);

    let resp = b.send(ApiRequest::Control(
        br#"{"appliance":"light","action":"OFF","timeout_minutes":30}"#,
    ));
    assert_eq!(resp.status, 200, "{}", resp.body);
    assert_eq!(b.relay("Light"), RelayState::On, "nothing changes until the tick");

    b.tick();
    assert_eq!(b.relay("Light"), RelayState::Off);
    assert_eq!(json(&b.send(ApiRequest::Status))["appliances"]["Light"]["mode"], "MANUAL");

    b.send(ApiRequest::Control(br#"{"name":"Light","action":"AUTO"}"#));
    b.tick();
    assert_eq!(b.relay("Light"), RelayState::On);
}

#[test]
fn batch_with_unknown_name_changes_nothing() {
    let mut b = Bench::new(&SystemConfig::default(), 26.0);
    let resp = b.send(ApiRequest::Control(
        br#"{"appliances":[{"name":"Light","action":"OFF"},{"name":"Skimmer","action":"ON"}]}"#,
    ));
    assert_eq!(resp.status, 404);
    assert_eq!(json(&resp)["code"], 404);

    b.tick();
    assert_eq!(b.relay("Light"), RelayState::On);
}

#[test]
fn rejects_bad_credential_before_anything_else() {
    let mut b = Bench::new(&SystemConfig::default(), 26.0);
    let oversized = vec![b'x'; 10_000];
    for credential in [None, Some(&b"wrong"[..]), Some(&b""[..])] {
        let resp = b.api.respond(
            credential,
            ApiRequest::Control(&oversized),
            b.clock.now(),
            &b.repo,
        );
        assert_eq!(resp.status, 401);
    }
}

#[test]
fn oversized_body_is_413() {
    let mut b = Bench::new(&SystemConfig::default(), 26.0);
    let body = vec![b' '; b.api.max_body_bytes() + 1];
    assert_eq!(b.send(ApiRequest::Control(&body)).status, 413);
}

#[test]
fn malformed_body_is_400() {
    let mut b = Bench::new(&SystemConfig::default(), 26.0);
    assert_eq!(b.send(ApiRequest::Control(b"{")).status, 400);
    assert_eq!(
        b.send(ApiRequest::Control(br#"{"name":"Light","action":"ON","timeout_minutes":0}"#))
            .status,
        400
    );
    assert_eq!(b.send(ApiRequest::ReplaceSchedules(b"[]")).status, 400);
}

#[test]
fn burst_beyond_limit_is_429() {
    let cfg = SystemConfig {
        api_rate_per_sec: 1,
        api_burst: 3,
        ..Default::default()
    };
    let mut b = Bench::new(&cfg, 26.0);
    let statuses: Vec<u16> = (0..4).map(|_| b.send(ApiRequest::Status).status).collect();
    assert_eq!(statuses, vec![200, 200, 200, 429]);
}

#[test]
fn schedule_replacement_applies_and_persists() {
    let mut b = Bench::new(&SystemConfig::default(), 26.0);
    let resp = b.send(ApiRequest::ReplaceSchedules(
        br#"{"Light":[{"type":"on_interval","start_min":0,"end_min":300}]}"#,
    ));
    assert_eq!(resp.status, 200, "{}", resp.body);
    assert_eq!(json(&resp)["count"], 1);

    b.tick();
    assert_eq!(b.relay("Light"), RelayState::Off, "minute 600 now outside the interval");

    let saved = b.repo.saved.borrow().clone().unwrap();
    assert_eq!(saved["Light"], vec![ScheduleInterval::on(0, 300)]);
    assert_eq!(saved["CO2"], vec![ScheduleInterval::on(510, 810)]);

    let listed = json(&b.send(ApiRequest::GetSchedules));
    assert_eq!(listed["Light"][0]["type"], "on_interval");
    assert_eq!(listed["Light"][0]["end_min"], 300);
}

#[test]
fn invalid_interval_rejects_whole_document() {
    let mut b = Bench::new(&SystemConfig::default(), 26.0);
    let resp = b.send(ApiRequest::ReplaceSchedules(
        br#"{"Light":[{"type":"on_interval","start_min":0,"end_min":300}],
             "CO2":[{"type":"on_interval","start_min":900,"end_min":800}]}"#,
    ));
    assert_eq!(resp.status, 400);
    assert!(b.repo.saved.borrow().is_none());

    b.tick();
    assert_eq!(b.relay("Light"), RelayState::On);
}

#[test]
fn schedule_document_with_unknown_name_changes_nothing() {
    let mut b = Bench::new(&SystemConfig::default(), 26.0);
    let before = b.app.handle().schedule_record();
    let resp = b.send(ApiRequest::ReplaceSchedules(
        br#"{"Light":[{"type":"on_interval","start_min":0,"end_min":300}],
             "Skimmer":[{"type":"on_interval","start_min":0,"end_min":60}]}"#,
    ));
    assert_eq!(resp.status, 404);
    assert!(b.repo.saved.borrow().is_none());
    assert_eq!(b.app.handle().schedule_record(), before);

    b.tick();
    assert_eq!(b.relay("Light"), RelayState::On);
}

#[test]
fn schedule_keys_differing_only_in_case_are_400() {
    let mut b = Bench::new(&SystemConfig::default(), 26.0);
    let before = b.app.handle().schedule_record();
    let resp = b.send(ApiRequest::ReplaceSchedules(
        br#"{"Light":[{"type":"on_interval","start_min":0,"end_min":300}],
             "light":[{"type":"off_interval","start_min":0,"end_min":1439}]}"#,
    ));
    assert_eq!(resp.status, 400);
    assert!(b.repo.saved.borrow().is_none());
    assert_eq!(b.app.handle().schedule_record(), before);
}

#[test]
fn timed_heater_override_hands_back_to_temperature_at_deadline() {
    let mut b = Bench::new(&SystemConfig::default(), 24.0);
    b.tick();
    assert_eq!(b.relay("Heater"), RelayState::On);

    let resp = b.send(ApiRequest::Control(
        br#"{"name":"Heater","action":"OFF","timeout_minutes":30}"#,
    ));
    assert_eq!(resp.status, 200, "{}", resp.body);
    b.tick();
    let heater = &json(&b.send(ApiRequest::Status))["appliances"]["Heater"];
    assert_eq!((heater["state"].as_str(), heater["mode"].as_str()), (Some("OFF"), Some("MANUAL")));

    b.clock.advance_minutes(29);
    b.tick();
    assert_eq!(json(&b.send(ApiRequest::Status))["appliances"]["Heater"]["mode"], "MANUAL");

    b.clock.advance_minutes(1);
    b.tick();
    let heater = &json(&b.send(ApiRequest::Status))["appliances"]["Heater"];
    assert_eq!(heater["mode"], "TEMP_CONTROLLED");
    assert_eq!(heater["state"], "ON");
    assert_eq!(b.relay("Heater"), RelayState::On);
}

#[test]
fn persistence_failure_is_500_but_change_stays_live() {
    let mut b = Bench::new(&SystemConfig::default(), 26.0);
    b.repo.fail_writes.set(true);
    let resp = b.send(ApiRequest::ReplaceSchedules(
        br#"{"Light":[{"type":"on_interval","start_min":0,"end_min":300}]}"#,
    ));
    assert_eq!(resp.status, 500);

    b.tick();
    assert_eq!(b.relay("Light"), RelayState::Off);
}

#[test]
fn emergency_reset_through_api() {
    let mut b = Bench::new(&SystemConfig::default(), 33.0);
    b.tick();
    let status = json(&b.send(ApiRequest::Status));
    assert_eq!(status["emergency"]["latched"], true);
    assert_eq!(status["emergency"]["reason"], "HIGH_TEMP");

    assert_eq!(b.send(ApiRequest::EmergencyReset).status, 409);

    b.hw.set_temp(28.0);
    b.tick();
    assert_eq!(b.send(ApiRequest::EmergencyReset).status, 200);
    b.tick();
    assert_eq!(json(&b.send(ApiRequest::Status))["emergency"]["latched"], false);
}
