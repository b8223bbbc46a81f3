//! Relay bank driver.
//!
//! One output channel per appliance, generic over
//! [`embedded_hal::digital::OutputPin`] so the polarity handling and
//! failure logging are testable with a mock pin.
//!
//! ## Dual-target design
//!
//! On ESP-IDF: [`RelayPin`] writes the GPIO configured by `hw_init`.
//! On host/test: [`RelayPin`] writes nothing and always succeeds.

use embedded_hal::digital::{Error, ErrorKind, ErrorType, OutputPin};
use log::warn;

use crate::appliance::{MAX_APPLIANCES, RelayState};
use crate::drivers::hw_init;

/// ESP-IDF error code from a failed GPIO write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioError(pub i32);

impl Error for GpioError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// A relay input line on a raw GPIO number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayPin {
    gpio: i32,
}

impl RelayPin {
    pub const fn new(gpio: i32) -> Self {
        Self { gpio }
    }

    pub const fn gpio(&self) -> i32 {
        self.gpio
    }
}

impl ErrorType for RelayPin {
    type Error = GpioError;
}

impl OutputPin for RelayPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        hw_init::gpio_write(self.gpio, false).map_err(GpioError)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        hw_init::gpio_write(self.gpio, true).map_err(GpioError)
    }
}

/// Channel `n` drives the appliance at position `n`.
pub struct RelayBank<P: OutputPin> {
    channels: heapless::Vec<P, MAX_APPLIANCES>,
    active_low: bool,
    /// Last state successfully written per channel.
    states: [RelayState; MAX_APPLIANCES],
    write_failures: u32,
}

impl<P: OutputPin> RelayBank<P> {
    /// Takes at most [`MAX_APPLIANCES`] pins; extras are ignored.
    pub fn new(pins: impl IntoIterator<Item = P>, active_low: bool) -> Self {
        let channels = pins.into_iter().take(MAX_APPLIANCES).collect();
        Self {
            channels,
            active_low,
            states: [RelayState::Off; MAX_APPLIANCES],
            write_failures: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Drive one channel.  Failures are logged and counted; the caller
    /// re-asserts on the next tick.
    pub fn set(&mut self, channel: usize, state: RelayState) {
        let active_low = self.active_low;
        let Some(pin) = self.channels.get_mut(channel) else {
            warn!("Relay: no channel {}", channel);
            return;
        };
        let drive_high = state.is_on() != active_low;
        let result = if drive_high {
            pin.set_high()
        } else {
            pin.set_low()
        };
        match result {
            Ok(()) => self.states[channel] = state,
            Err(e) => {
                self.write_failures = self.write_failures.saturating_add(1);
                warn!("Relay: channel {} write {} failed ({:?})", channel, state, e.kind());
            }
        }
    }

    /// De-energise every channel.
    pub fn all_off(&mut self) {
        for channel in 0..self.channels.len() {
            self.set(channel, RelayState::Off);
        }
    }

    pub fn state(&self, channel: usize) -> Option<RelayState> {
        (channel < self.channels.len()).then(|| self.states[channel])
    }

    pub fn write_failures(&self) -> u32 {
        self.write_failures
    }
}
