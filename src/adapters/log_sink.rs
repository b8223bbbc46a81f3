//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).
//! Every line starts with a fixed tag so a serial capture can be grepped.

use log::{error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                info!(
                    "TELEM | tick={} | T={} | emergency={} | relays=0b{:08b} | overrides={}",
                    t.tick_count,
                    t.sample,
                    if t.emergency_latched { "LATCHED" } else { "clear" },
                    t.relays_on,
                    t.active_overrides,
                );
            }
            AppEvent::EmergencyLatched { reason, sample } => {
                error!("EMERG | latched reason={} sample={}", reason, sample);
            }
            AppEvent::EmergencyCleared(cause) => {
                warn!("EMERG | cleared ({:?})", cause);
            }
            AppEvent::HeaterChanged { name, mode, .. } => {
                info!("HEATER | {} -> {:?}", name, mode);
            }
            AppEvent::OverrideExpired { name, .. } => {
                info!("RELAY | {} override expired", name);
            }
            AppEvent::DecisionChanged {
                name, state, mode, ..
            } => {
                info!("RELAY | {} = {} ({:?})", name, state, mode);
            }
            AppEvent::SensorFault => {
                warn!("SENSOR | temperature probe fault");
            }
            AppEvent::SensorRecovered { celsius } => {
                info!("SENSOR | recovered at {:.2}\u{00b0}C", celsius);
            }
            AppEvent::Started { appliances } => {
                info!("START | appliances={} relays=all OFF", appliances);
            }
        }
    }
}
