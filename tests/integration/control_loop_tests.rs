//! Integration tests for the clock → probe → arbiter → relays pipeline.
//!
//! Each test drives [`AppService`] tick by tick against the mock
//! adapters and checks the decisions and relay writes that come out,
//! including requests made through the [`ControlHandle`] in between.

use aquacontrol::app::commands::{AppCommand, CommandOutcome, OverrideAction, OverrideRequest};
use aquacontrol::app::events::AppEvent;
use aquacontrol::app::handle::ControlHandle;
use aquacontrol::app::service::AppService;
use aquacontrol::appliance::{ApplianceId, RelayState};
use aquacontrol::arbiter::{ControlMode, Decisions};
use aquacontrol::clock::Instant;
use aquacontrol::config::SystemConfig;
use aquacontrol::control::heater::HeaterMode;
use aquacontrol::error::CommandError;
use aquacontrol::safety::{ClearCause, EmergencyReason};
use aquacontrol::scheduler::ScheduleInterval;

use crate::mock_hw::{MockHardware, RecordingSink, SimClock};

struct Rig {
    app: AppService,
    hw: MockHardware,
    sink: RecordingSink,
    clock: SimClock,
}

impl Rig {
    fn new(clock: SimClock, celsius: f32) -> Self {
        Self::with_config(&SystemConfig::default(), clock, celsius)
    }

    fn with_config(config: &SystemConfig, clock: SimClock, celsius: f32) -> Self {
        let mut app = AppService::new(config).unwrap();
        let mut hw = MockHardware::new(celsius);
        let mut sink = RecordingSink::default();
        app.start(&mut hw, &mut sink);
        Self {
            app,
            hw,
            sink,
            clock,
        }
    }

    fn tick(&mut self) -> Decisions {
        self.app.tick(&self.clock, &mut self.hw, &mut self.sink)
    }

    fn id(&self, name: &str) -> ApplianceId {
        self.app.stores().appliances().lookup(name).unwrap()
    }

    fn handle(&self) -> ControlHandle {
        self.app.handle()
    }

    fn now(&self) -> Instant {
        aquacontrol::app::ports::ClockPort::now(&self.clock)
    }

    fn force(&self, name: &str, state: RelayState, timeout_minutes: Option<u32>) {
        let req = OverrideRequest {
            appliance: self.id(name),
            action: OverrideAction::Force {
                state,
                timeout_minutes,
            },
        };
        self.handle()
            .execute(AppCommand::ApplyOverrides(vec![req]), self.now())
            .unwrap();
    }
}

fn decision(decisions: &Decisions, id: ApplianceId) -> (RelayState, ControlMode) {
    let d = decisions.iter().find(|d| d.appliance == id).unwrap();
    (d.state, d.mode)
}

// ── Start-up ──────────────────────────────────────────────────

#[test]
fn start_drives_every_relay_off_before_first_tick() {
    let rig = Rig::new(SimClock::at_minute(600), 26.0);
    assert_eq!(rig.hw.calls, vec![crate::mock_hw::RelayCall::AllOff]);
    assert_eq!(rig.sink.events, vec![AppEvent::Started { appliances: 6 }]);

    let status = rig.handle().status();
    assert_eq!(status.tick_count, 0);
    assert!(
        status
            .decisions
            .iter()
            .all(|d| d.state == RelayState::Off && d.mode == ControlMode::Schedule)
    );
}

// ── Schedule tier ─────────────────────────────────────────────

#[test]
fn co2_follows_its_on_interval() {
    let mut rig = Rig::new(SimClock::at_minute(600), 26.0);
    let co2 = rig.id("CO2");
    let d = rig.tick();
    assert_eq!(decision(&d, co2), (RelayState::On, ControlMode::Schedule));
    assert_eq!(rig.hw.relay(co2), RelayState::On);
}

#[test]
fn unmatched_minute_falls_back_to_default_state() {
    let mut rig = Rig::new(SimClock::at_minute(300), 26.0);
    let d = rig.tick();
    assert_eq!(decision(&d, rig.id("Filter")), (RelayState::On, ControlMode::Schedule));
    assert_eq!(decision(&d, rig.id("Light")), (RelayState::Off, ControlMode::Schedule));
    assert_eq!(decision(&d, rig.id("HangOnFilter")), (RelayState::On, ControlMode::Schedule));
}

#[test]
fn unsynced_clock_uses_default_states() {
    let mut rig = Rig::new(SimClock::unsynced(), 26.0);
    let d = rig.tick();
    assert_eq!(decision(&d, rig.id("CO2")), (RelayState::Off, ControlMode::Schedule));
    assert_eq!(decision(&d, rig.id("Filter")), (RelayState::On, ControlMode::Schedule));
}

#[test]
fn off_interval_carves_a_gap_into_an_on_interval() {
    let mut rig = Rig::new(SimClock::at_minute(700), 26.0);
    let light = rig.id("Light");
    rig.handle()
        .execute(
            AppCommand::ReplaceSchedules(vec![(
                light,
                vec![ScheduleInterval::off(690, 720), ScheduleInterval::on(600, 1080)],
            )]),
            rig.now(),
        )
        .unwrap();

    let d = rig.tick();
    assert_eq!(decision(&d, light), (RelayState::Off, ControlMode::Schedule));

    rig.clock.advance_minutes(20);
    let d = rig.tick();
    assert_eq!(decision(&d, light), (RelayState::On, ControlMode::Schedule));
}

// ── Heater tier ───────────────────────────────────────────────

#[test]
fn cold_tank_turns_heater_on_next_tick() {
    let mut rig = Rig::new(SimClock::at_minute(600), 24.5);
    let heater = rig.id("Heater");
    let d = rig.tick();
    assert_eq!(decision(&d, heater), (RelayState::On, ControlMode::Temperature));
    assert_eq!(rig.hw.relay(heater), RelayState::On);
    assert!(rig.sink.events.iter().any(|e| matches!(
        e,
        AppEvent::HeaterChanged {
            mode: HeaterMode::Heating,
            ..
        }
    )));
}

#[test]
fn heater_honours_min_runtime_before_switching_off() {
    let mut rig = Rig::new(SimClock::at_minute(600), 24.0);
    let heater = rig.id("Heater");
    assert_eq!(decision(&rig.tick(), heater).0, RelayState::On);

    rig.clock.advance_minutes(10);
    rig.hw.set_temp(29.5);
    assert_eq!(decision(&rig.tick(), heater), (RelayState::On, ControlMode::Temperature));

    rig.clock.advance_minutes(21);
    assert_eq!(decision(&rig.tick(), heater), (RelayState::Off, ControlMode::Temperature));
}

#[test]
fn heater_in_band_stays_idle() {
    let mut rig = Rig::new(SimClock::at_minute(600), 27.0);
    let d = rig.tick();
    assert_eq!(decision(&d, rig.id("Heater")), (RelayState::Off, ControlMode::Temperature));
}

#[test]
fn sensor_fault_holds_last_heater_state() {
    let mut rig = Rig::new(SimClock::at_minute(600), 24.0);
    let heater = rig.id("Heater");
    rig.tick();

    rig.hw.set_fault();
    for _ in 0..5 {
        rig.clock.advance_minutes(10);
        assert_eq!(decision(&rig.tick(), heater), (RelayState::On, ControlMode::Temperature));
    }
    assert_eq!(rig.sink.count(|e| *e == AppEvent::SensorFault), 1);
    assert!(!rig.handle().status().emergency.latched);
}

// ── Manual tier ───────────────────────────────────────────────

#[test]
fn timed_override_expires_back_to_schedule() {
    let mut rig = Rig::new(SimClock::at_minute(600), 26.0);
    let light = rig.id("Light");
    rig.force("Light", RelayState::Off, Some(30));

    assert_eq!(decision(&rig.tick(), light), (RelayState::Off, ControlMode::Manual));

    rig.clock.advance_minutes(29);
    assert_eq!(decision(&rig.tick(), light), (RelayState::Off, ControlMode::Manual));

    rig.clock.advance_minutes(1);
    assert_eq!(decision(&rig.tick(), light), (RelayState::On, ControlMode::Schedule));
    assert_eq!(
        rig.sink
            .count(|e| matches!(e, AppEvent::OverrideExpired { appliance, .. } if *appliance == light)),
        1
    );
}

#[test]
fn heater_keeps_its_hysteresis_while_overridden() {
    let mut rig = Rig::new(SimClock::at_minute(600), 24.0);
    let heater = rig.id("Heater");
    rig.force("Heater", RelayState::Off, None);

    assert_eq!(decision(&rig.tick(), heater), (RelayState::Off, ControlMode::Manual));
    assert_eq!(rig.hw.relay(heater), RelayState::Off);
    assert_eq!(
        rig.app.arbiter().heater_state(heater).map(|s| s.mode),
        Some(HeaterMode::Heating)
    );

    // Inside the band: only the state entered at 24 °C keeps it ON.
    rig.hw.set_temp(27.0);
    rig.clock.advance_minutes(5);
    let release = OverrideRequest {
        appliance: heater,
        action: OverrideAction::Release,
    };
    rig.handle()
        .execute(AppCommand::ApplyOverrides(vec![release]), rig.now())
        .unwrap();
    assert_eq!(decision(&rig.tick(), heater), (RelayState::On, ControlMode::Temperature));
}

#[test]
fn heater_min_runtime_counts_through_emergency() {
    let mut rig = Rig::new(SimClock::at_minute(600), 24.0);
    let heater = rig.id("Heater");
    rig.tick();

    rig.hw.set_temp(33.0);
    rig.clock.advance_minutes(1);
    assert_eq!(decision(&rig.tick(), heater), (RelayState::Off, ControlMode::Emergency));

    // Hot enough to stop, and the runtime has elapsed while latched.
    rig.hw.set_temp(29.5);
    rig.clock.advance_minutes(30);
    rig.tick();
    assert_eq!(
        rig.app.arbiter().heater_state(heater).map(|s| s.mode),
        Some(HeaterMode::Idle)
    );
    rig.handle()
        .execute(AppCommand::ResetEmergency, rig.now())
        .unwrap();
    assert_eq!(decision(&rig.tick(), heater), (RelayState::Off, ControlMode::Temperature));
}

#[test]
fn invalid_timeout_rejects_whole_batch() {
    let rig = Rig::new(SimClock::at_minute(600), 26.0);
    let batch = vec![
        OverrideRequest {
            appliance: rig.id("Light"),
            action: OverrideAction::Force {
                state: RelayState::On,
                timeout_minutes: Some(10),
            },
        },
        OverrideRequest {
            appliance: rig.id("CO2"),
            action: OverrideAction::Force {
                state: RelayState::On,
                timeout_minutes: Some(0),
            },
        },
    ];
    let err = rig
        .handle()
        .execute(AppCommand::ApplyOverrides(batch), rig.now())
        .unwrap_err();
    assert!(matches!(err, CommandError::InvalidTimeout { minutes: 0, .. }));
    assert!(rig.app.stores().with_overrides(|l| l.is_empty()));
}

// ── Emergency tier ────────────────────────────────────────────

#[test]
fn emergency_forces_everything_off_and_needs_safe_reset() {
    let mut rig = Rig::new(SimClock::at_minute(600), 26.0);
    rig.force("Filter", RelayState::On, None);
    rig.tick();

    rig.hw.set_temp(33.0);
    let d = rig.tick();
    assert!(
        d.iter()
            .all(|d| d.state == RelayState::Off && d.mode == ControlMode::Emergency)
    );
    assert!(rig.sink.events.contains(&AppEvent::EmergencyLatched {
        reason: EmergencyReason::HighTemp,
        sample: aquacontrol::sensors::TemperatureSample::Valid(33.0),
    }));

    let handle = rig.handle();
    assert_eq!(
        handle.execute(AppCommand::ResetEmergency, rig.now()),
        Err(CommandError::EmergencyUnsafe)
    );

    rig.hw.set_temp(28.0);
    rig.clock.advance_minutes(1);
    let d = rig.tick();
    assert!(d.iter().all(|d| d.mode == ControlMode::Emergency), "no auto-clear yet");

    assert_eq!(
        handle.execute(AppCommand::ResetEmergency, rig.now()),
        Ok(CommandOutcome::EmergencyCleared)
    );
    let d = rig.tick();
    assert_eq!(decision(&d, rig.id("Filter")), (RelayState::On, ControlMode::Manual));
    assert!(
        rig.sink
            .events
            .contains(&AppEvent::EmergencyCleared(ClearCause::ManualReset))
    );
}

#[test]
fn emergency_auto_clears_after_recovery_window() {
    let cfg = SystemConfig {
        emergency_recovery_secs: 600,
        ..Default::default()
    };
    let mut rig = Rig::with_config(&cfg, SimClock::at_minute(600), 16.0);
    rig.tick();
    assert_eq!(rig.handle().status().emergency.reason, Some(EmergencyReason::LowTemp));

    rig.hw.set_temp(26.0);
    rig.tick(); // safe streak starts
    rig.clock.advance_minutes(9);
    rig.tick();
    assert!(rig.handle().status().emergency.latched);

    rig.clock.advance_minutes(1);
    rig.tick();
    assert!(!rig.handle().status().emergency.latched);
    assert!(
        rig.sink
            .events
            .contains(&AppEvent::EmergencyCleared(ClearCause::AutoRecovered))
    );
}

#[test]
fn reset_when_not_latched_is_a_no_op() {
    let mut rig = Rig::new(SimClock::at_minute(600), 26.0);
    rig.tick();
    assert_eq!(
        rig.handle().execute(AppCommand::ResetEmergency, rig.now()),
        Ok(CommandOutcome::EmergencyNotLatched)
    );
}

#[test]
fn sustained_fault_latches_when_configured() {
    let cfg = SystemConfig {
        sensor_fault_latch_secs: Some(120),
        ..Default::default()
    };
    let mut rig = Rig::with_config(&cfg, SimClock::at_minute(600), 26.0);
    rig.hw.set_fault();
    rig.tick();
    rig.clock.advance_minutes(1);
    rig.tick();
    assert!(!rig.handle().status().emergency.latched);

    rig.clock.advance_minutes(1);
    rig.tick();
    let status = rig.handle().status();
    assert!(status.emergency.latched);
    assert_eq!(status.emergency.reason, Some(EmergencyReason::SensorFault));
    assert_eq!(
        rig.handle().execute(AppCommand::ResetEmergency, rig.now()),
        Err(CommandError::EmergencyUnsafe)
    );
}
