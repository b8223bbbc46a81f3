//! Application core: pure domain logic, zero I/O.
//!
//! This module wires the control stores, the priority arbiter and the
//! heater controllers into a service driven once per tick.  All
//! interaction with hardware happens through **port traits** defined in
//! [`ports`], keeping this layer fully testable without real peripherals.
//! Remote requests reach the same stores through a cloneable
//! [`handle::ControlHandle`].

pub mod commands;
pub mod events;
pub mod handle;
pub mod ports;
pub mod service;
