//! GPIO / peripheral pin assignments for the controller main board.
//!
//! Single source of truth; every driver references this module rather than
//! hard-coding pin numbers.  Change a pin here and it propagates everywhere.

use crate::appliance::MAX_APPLIANCES;

// ---------------------------------------------------------------------------
// Relay board (8-channel, opto-isolated, active LOW inputs)
// ---------------------------------------------------------------------------

/// Relay input GPIOs, in appliance order: channel `n` drives the
/// appliance at position `n` of the configured appliance table.
pub const RELAY_GPIOS: [i32; MAX_APPLIANCES] = [16, 17, 18, 19, 21, 22, 23, 25];

/// The common relay boards energise the coil when the input is pulled LOW.
pub const RELAY_ACTIVE_LOW: bool = true;

// ---------------------------------------------------------------------------
// Water temperature probe (ADC1)
// ---------------------------------------------------------------------------

/// NTC thermistor; 10 kΩ @ 25 °C, voltage-divider to ADC.
/// ADC1 channel 6 (GPIO 34, input-only).
pub const TEMP_ADC_GPIO: i32 = 34;

