//! Integration tests for schedule persistence across restarts.
//!
//! A "restart" is a fresh [`AppService`] built from the same
//! configuration and restored from the same repository.

use std::collections::BTreeMap;

use aquacontrol::adapters::nvs::NvsAdapter;
use aquacontrol::api::{ApiKey, ApiRequest, ControlApi};
use aquacontrol::app::ports::{ClockPort, ConfigError, ConfigPort, ScheduleRepository};
use aquacontrol::app::service::AppService;
use aquacontrol::appliance::RelayState;
use aquacontrol::arbiter::ControlMode;
use aquacontrol::config::SystemConfig;
use aquacontrol::scheduler::{RestoreOutcome, ScheduleInterval, ScheduleRecord};

use crate::mock_hw::{MemRepo, MockHardware, RecordingSink, SimClock};

fn boot(repo: &impl ScheduleRepository) -> (AppService, RestoreOutcome) {
    let app = AppService::new(&SystemConfig::default()).unwrap();
    let outcome = app.restore_schedules(repo);
    (app, outcome)
}

fn light_at(app: &mut AppService, minute: u16) -> (RelayState, ControlMode) {
    let clock = SimClock::at_minute(minute);
    let mut hw = MockHardware::new(26.0);
    let decisions = app.tick(&clock, &mut hw, &mut RecordingSink::default());
    let light = app.stores().appliances().lookup("Light").unwrap();
    let d = decisions.iter().find(|d| d.appliance == light).unwrap();
    (d.state, d.mode)
}

fn record(entries: &[(&str, Vec<ScheduleInterval>)]) -> ScheduleRecord {
    entries
        .iter()
        .map(|(name, ivs)| ((*name).to_string(), ivs.clone()))
        .collect::<BTreeMap<_, _>>()
}

#[test]
fn empty_repository_boots_with_defaults() {
    let (mut app, outcome) = boot(&MemRepo::default());
    assert_eq!(outcome, RestoreOutcome::Defaults);
    assert_eq!(light_at(&mut app, 700), (RelayState::On, ControlMode::Schedule));
}

#[test]
fn stored_record_survives_restart() {
    let repo = MemRepo::with_record(record(&[("Light", vec![ScheduleInterval::on(1200, 1400)])]));
    let (mut app, outcome) = boot(&repo);
    assert_eq!(outcome, RestoreOutcome::Restored { applied: 1, skipped: 0 });
    assert_eq!(light_at(&mut app, 700), (RelayState::Off, ControlMode::Schedule));
    assert_eq!(light_at(&mut app, 1300), (RelayState::On, ControlMode::Schedule));
}

#[test]
fn unknown_appliance_entries_are_skipped() {
    let repo = MemRepo::with_record(record(&[
        ("Light", vec![ScheduleInterval::on(0, 60)]),
        ("Skimmer", vec![ScheduleInterval::on(0, 60)]),
    ]));
    let (app, outcome) = boot(&repo);
    assert_eq!(outcome, RestoreOutcome::Restored { applied: 1, skipped: 1 });
    let listed = app.handle().schedule_record();
    assert!(!listed.contains_key("Skimmer"));
    assert_eq!(listed["Light"], vec![ScheduleInterval::on(0, 60)]);
}

#[test]
fn invalid_stored_interval_falls_back_to_defaults_everywhere() {
    let repo = MemRepo::with_record(record(&[
        ("CO2", vec![ScheduleInterval::on(0, 60)]),
        ("Light", vec![ScheduleInterval::on(900, 100)]),
    ]));
    let (app, outcome) = boot(&repo);
    assert_eq!(outcome, RestoreOutcome::Defaults);
    let listed = app.handle().schedule_record();
    assert_eq!(listed["CO2"], vec![ScheduleInterval::on(510, 810)]);
    assert_eq!(listed["Light"], vec![ScheduleInterval::on(600, 1080)]);
}

#[test]
fn case_variant_keys_fall_back_to_defaults() {
    let repo = MemRepo::with_record(record(&[
        ("Light", vec![ScheduleInterval::on(0, 60)]),
        ("LIGHT", vec![ScheduleInterval::off(0, 1439)]),
    ]));
    let (mut app, outcome) = boot(&repo);
    assert_eq!(outcome, RestoreOutcome::Defaults);
    assert_eq!(app.handle().schedule_record()["Light"], vec![ScheduleInterval::on(600, 1080)]);
    assert_eq!(light_at(&mut app, 700), (RelayState::On, ControlMode::Schedule));
}

#[test]
fn corrupt_repository_falls_back_to_defaults() {
    let repo = MemRepo::default();
    repo.corrupt.set(true);
    let (_, outcome) = boot(&repo);
    assert_eq!(outcome, RestoreOutcome::Defaults);
}

#[test]
fn api_replacement_round_trips_through_nvs() {
    let nvs = NvsAdapter::default();
    let config = SystemConfig::default();
    let clock = SimClock::at_minute(600);

    {
        let (app, _) = boot(&nvs);
        let mut api = ControlApi::new(app.handle(), ApiKey::new(b"k"), &config);
        let resp = api.respond(
            Some(b"k"),
            ApiRequest::ReplaceSchedules(
                br#"{"Light":[{"type":"on_interval","start_min":60,"end_min":120},
                              {"type":"off_interval","start_min":700,"end_min":800}]}"#,
            ),
            clock.now(),
            &nvs,
        );
        assert_eq!(resp.status, 200, "{}", resp.body);
    }

    let (app, outcome) = boot(&nvs);
    assert!(matches!(outcome, RestoreOutcome::Restored { .. }));
    assert_eq!(
        app.handle().schedule_record()["Light"],
        vec![ScheduleInterval::on(60, 120), ScheduleInterval::off(700, 800)]
    );
}

#[test]
fn config_round_trips_through_nvs() {
    let nvs = NvsAdapter::default();
    assert_eq!(nvs.load().unwrap(), SystemConfig::default());

    let cfg = SystemConfig {
        heater_low_setpoint_c: 24.0,
        heater_high_setpoint_c: 27.5,
        sensor_fault_latch_secs: Some(300),
        ..Default::default()
    };
    nvs.save(&cfg).unwrap();
    assert_eq!(nvs.load().unwrap(), cfg);
}

#[test]
fn invalid_config_is_never_persisted() {
    let nvs = NvsAdapter::default();
    let bad = SystemConfig {
        emergency_high_c: 200.0,
        ..Default::default()
    };
    assert!(matches!(nvs.save(&bad), Err(ConfigError::ValidationFailed(_))));
    assert_eq!(nvs.load().unwrap(), SystemConfig::default());
}
