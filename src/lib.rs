//! AquaControl firmware library.
//!
//! Exposes the control core (stores, arbiter, safety, heater) and the
//! transport-agnostic control API for integration testing.  All
//! ESP-IDF-specific code is guarded by `#[cfg(target_os = "espidf")]`
//! within each module.

#![deny(unused_must_use)]

pub mod api;
pub mod app;
pub mod appliance;
pub mod arbiter;
pub mod clock;
pub mod config;
pub mod control;
pub mod error;
pub mod overrides;
pub mod safety;
pub mod scheduler;
pub mod sensors;
pub mod stores;

// Hardware-facing modules; simulation stubs on host targets.
pub mod adapters;
pub mod drivers;
pub mod pins;
