//! Error types for the control core.
//!
//! Every variant is `Copy` so errors can be returned from inside a store
//! lock and carried out to the API layer without allocation.  Port-level
//! errors (`ConfigError`, `StorageError`) live next to the port traits in
//! [`crate::app::ports`].

use core::fmt;

// ---------------------------------------------------------------------------
// Schedule validation
// ---------------------------------------------------------------------------

/// A schedule interval list was rejected.  `index` is the position of the
/// first offending interval in the submitted list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleError {
    /// `start_min` or `end_min` is outside 0–1439.
    OutOfRange { index: usize },
    /// `start_min` is not strictly before `end_min` (intervals never wrap).
    NotIncreasing { index: usize },
    /// More intervals than one appliance can hold.
    TooManyIntervals,
}

impl fmt::Display for ScheduleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfRange { index } => {
                write!(f, "interval {index}: minutes must be within 0-1439")
            }
            Self::NotIncreasing { index } => {
                write!(f, "interval {index}: start_min must be before end_min")
            }
            Self::TooManyIntervals => write!(f, "too many intervals for one appliance"),
        }
    }
}

// ---------------------------------------------------------------------------
// Command errors
// ---------------------------------------------------------------------------

/// Why a control command was not applied.  Core state is unchanged in
/// every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandError {
    /// Override timeout is zero or longer than the configured maximum.
    InvalidTimeout { minutes: u32, max: u32 },
    /// A submitted schedule failed validation.
    Schedule(ScheduleError),
    /// Emergency reset refused: the latest reading is not in the safe band.
    EmergencyUnsafe,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidTimeout { minutes, max } => {
                write!(f, "timeout_minutes {minutes} outside 1-{max}")
            }
            Self::Schedule(e) => write!(f, "schedule: {e}"),
            Self::EmergencyUnsafe => write!(f, "conditions unsafe, emergency not reset"),
        }
    }
}

impl From<ScheduleError> for CommandError {
    fn from(e: ScheduleError) -> Self {
        Self::Schedule(e)
    }
}
