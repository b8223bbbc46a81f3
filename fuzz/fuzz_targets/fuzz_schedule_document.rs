//! Fuzz target: schedule document parsing and replacement
//!
//! Parses arbitrary bytes as a bulk schedule document.  Whatever parses
//! is pushed through validation and, when accepted, must read back as
//! the same interval lists.
//!
//! Invariants checked:
//! - No panics under any byte sequence
//! - A rejected document leaves every schedule at its default
//! - An accepted document round-trips through the schedule store
//!
//! cargo fuzz run fuzz_schedule_document

#![no_main]

use critical_section as _;
use libfuzzer_sys::fuzz_target;

use aquacontrol::api::codec::parse_schedules;
use aquacontrol::app::commands::AppCommand;
use aquacontrol::app::service::AppService;
use aquacontrol::clock::Instant;
use aquacontrol::config::SystemConfig;

fuzz_target!(|data: &[u8]| {
    let Ok(record) = parse_schedules(data) else {
        return;
    };
    let Ok(app) = AppService::new(&SystemConfig::default()) else {
        return;
    };
    let handle = app.handle();
    let defaults = handle.schedule_record();
    let appliances = app.stores().appliances();

    let mut updates = Vec::new();
    for (name, intervals) in &record {
        match appliances.lookup(name) {
            Some(id) => updates.push((id, intervals.clone())),
            None => return,
        }
    }

    match handle.execute(AppCommand::ReplaceSchedules(updates), Instant::ZERO) {
        Ok(_) => {
            let stored = handle.schedule_record();
            for (name, intervals) in &record {
                let canonical = appliances.name(appliances.lookup(name).unwrap());
                // Later duplicates (case-insensitive) win; only check the last one.
                let last = record
                    .iter()
                    .filter(|(n, _)| n.eq_ignore_ascii_case(name))
                    .last()
                    .map(|(_, ivs)| ivs);
                if last == Some(intervals) {
                    assert_eq!(&stored[canonical], intervals);
                }
            }
        }
        Err(_) => assert_eq!(handle.schedule_record(), defaults),
    }
});
