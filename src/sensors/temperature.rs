//! NTC thermistor water-temperature probe (10 kOhm @ 25 C, B = 3950).
//!
//! Wired in a voltage divider with a fixed 10 kOhm resistor to 3.3 V,
//! the thermistor on the low side, read via ADC1.  The simplified Beta
//! (Steinhart-Hart) equation converts resistance to temperature.
//!
//! An open or shorted probe pins the divider to a rail; those readings,
//! and anything outside the configured plausibility range, come back as
//! [`TemperatureSample::Fault`] rather than a made-up temperature.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: reads the oneshot ADC channel configured by `hw_init`.
//! On host/test: reads from a static AtomicU16 for injection.

use core::sync::atomic::{AtomicU16, Ordering};

use super::{TemperatureSample, classify_celsius};

#[cfg(target_os = "espidf")]
use crate::drivers::hw_init;

static SIM_TEMP_ADC: AtomicU16 = AtomicU16::new(2048);

/// Inject the raw ADC value returned by the simulated probe.
pub fn sim_set_temp_adc(raw: u16) {
    SIM_TEMP_ADC.store(raw, Ordering::Relaxed);
}

const R25: f32 = 10_000.0;
const BETA: f32 = 3950.0;
const T25_K: f32 = 298.15;
const R_DIVIDER: f32 = 10_000.0;
const ADC_MAX: f32 = 4095.0;
const V_REF: f32 = 3.3;
/// Readings this close to either rail mean an open or shorted probe.
const RAIL_MARGIN_V: f32 = 0.01;

pub struct NtcThermometer {
    min_c: f32,
    max_c: f32,
    last_raw: u16,
}

impl NtcThermometer {
    /// `min_c`/`max_c` bound the plausible range; outside it is a fault.
    pub fn new(min_c: f32, max_c: f32) -> Self {
        Self {
            min_c,
            max_c,
            last_raw: 0,
        }
    }

    pub fn read(&mut self) -> TemperatureSample {
        let raw = self.read_adc();
        self.last_raw = raw;
        self.classify_raw(raw)
    }

    /// Most recent raw ADC count, for diagnostics.
    pub fn last_raw(&self) -> u16 {
        self.last_raw
    }

    pub fn classify_raw(&self, raw: u16) -> TemperatureSample {
        match adc_to_celsius(raw) {
            Some(c) => classify_celsius(c, self.min_c, self.max_c),
            None => TemperatureSample::Fault,
        }
    }

    #[cfg(target_os = "espidf")]
    fn read_adc(&self) -> u16 {
        hw_init::adc1_read(hw_init::ADC1_CH_TEMP)
    }

    #[cfg(not(target_os = "espidf"))]
    fn read_adc(&self) -> u16 {
        SIM_TEMP_ADC.load(Ordering::Relaxed)
    }
}

/// Convert a 12-bit ADC count to °C.  `None` when the divider sits on a rail.
fn adc_to_celsius(raw: u16) -> Option<f32> {
    let voltage = (f32::from(raw) / ADC_MAX) * V_REF;
    if voltage <= RAIL_MARGIN_V || voltage >= (V_REF - RAIL_MARGIN_V) {
        return None;
    }
    let r_ntc = R_DIVIDER * voltage / (V_REF - voltage);
    let inv_t = (1.0 / T25_K) + (1.0 / BETA) * (r_ntc / R25).ln();
    if inv_t <= 0.0 {
        return None;
    }
    Some((1.0 / inv_t) - 273.15)
}
