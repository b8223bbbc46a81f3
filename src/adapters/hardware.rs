//! Hardware adapter: bridges real peripherals to domain port traits.
//!
//! Owns the temperature probe and the relay bank, exposing them through
//! [`TemperaturePort`] and [`RelayPort`].  This is the only module in the
//! system that touches actual hardware.  On non-espidf targets, the
//! underlying drivers use cfg-gated simulation stubs.

use embedded_hal::digital::OutputPin;

use crate::app::ports::{RelayPort, TemperaturePort};
use crate::appliance::{ApplianceId, RelayState};
use crate::drivers::relay::RelayBank;
use crate::sensors::TemperatureSample;
use crate::sensors::temperature::NtcThermometer;

/// Concrete adapter that combines all hardware behind port traits.
pub struct HardwareAdapter<P: OutputPin> {
    thermometer: NtcThermometer,
    relays: RelayBank<P>,
}

impl<P: OutputPin> HardwareAdapter<P> {
    pub fn new(thermometer: NtcThermometer, relays: RelayBank<P>) -> Self {
        Self {
            thermometer,
            relays,
        }
    }

    pub fn relays(&self) -> &RelayBank<P> {
        &self.relays
    }

    pub fn thermometer(&self) -> &NtcThermometer {
        &self.thermometer
    }
}

// ── TemperaturePort implementation ────────────────────────────

impl<P: OutputPin> TemperaturePort for HardwareAdapter<P> {
    fn read_temperature(&mut self) -> TemperatureSample {
        self.thermometer.read()
    }
}

// ── RelayPort implementation ──────────────────────────────────

impl<P: OutputPin> RelayPort for HardwareAdapter<P> {
    fn set_relay(&mut self, appliance: ApplianceId, state: RelayState) {
        self.relays.set(appliance.index(), state);
    }

    fn all_off(&mut self) {
        self.relays.all_off();
    }
}
