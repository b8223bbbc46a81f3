//! Closed-loop control for temperature-driven appliances.

pub mod heater;
