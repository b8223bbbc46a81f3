//! Temperature sensing.
//!
//! The control core never sees raw sensor values: adapters turn each
//! reading into a [`TemperatureSample`], which is either a plausible
//! temperature or an explicit fault.  Retry and filtering belong to the
//! driver; the core only degrades ("hold last state") on `Fault`.

pub mod temperature;

use core::fmt;

use serde::Serialize;

/// Disconnected-probe value reported by DS18B20-style sensors.
pub const DISCONNECTED_SENTINEL_C: f32 = -127.0;

/// One temperature reading as seen by the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum TemperatureSample {
    /// Plausible reading in °C.
    Valid(f32),
    /// No usable reading this tick.
    Fault,
}

impl TemperatureSample {
    pub fn celsius(self) -> Option<f32> {
        match self {
            Self::Valid(c) => Some(c),
            Self::Fault => None,
        }
    }

    pub fn is_fault(self) -> bool {
        matches!(self, Self::Fault)
    }
}

impl fmt::Display for TemperatureSample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Valid(c) => write!(f, "{c:.2}\u{00b0}C"),
            Self::Fault => write!(f, "FAULT"),
        }
    }
}

/// Classify a converted reading against the plausibility range.
///
/// NaN/inf, the disconnected sentinel and anything outside
/// `[min_c, max_c]` are faults.
pub fn classify_celsius(celsius: f32, min_c: f32, max_c: f32) -> TemperatureSample {
    if !celsius.is_finite() || celsius <= DISCONNECTED_SENTINEL_C {
        return TemperatureSample::Fault;
    }
    if celsius < min_c || celsius > max_c {
        return TemperatureSample::Fault;
    }
    TemperatureSample::Valid(celsius)
}
