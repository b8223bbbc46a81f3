//! The fixed appliance table.
//!
//! Appliance names only exist at the boundary (REST bodies, the persisted
//! schedule record, log lines).  Everything inside the core addresses an
//! appliance by [`ApplianceId`], an index issued by the [`ApplianceSet`]
//! built once from configuration, so an unknown name can never reach the
//! arbiter.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::app::ports::ConfigError;
use crate::config::ApplianceSpec;

/// Upper bound on configured appliances (one per relay channel).
pub const MAX_APPLIANCES: usize = 8;

/// Longest accepted appliance name, in bytes.
pub const MAX_NAME_LEN: usize = 16;

pub type ApplianceName = heapless::String<MAX_NAME_LEN>;

// ───────────────────────────────────────────────────────────────
// Relay state
// ───────────────────────────────────────────────────────────────

/// Commanded output of one relay channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelayState {
    #[serde(rename = "ON")]
    On,
    #[serde(rename = "OFF")]
    Off,
}

impl RelayState {
    pub const fn is_on(self) -> bool {
        matches!(self, Self::On)
    }

    pub const fn from_bool(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }
}

impl fmt::Display for RelayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => write!(f, "ON"),
            Self::Off => write!(f, "OFF"),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Appliance identity
// ───────────────────────────────────────────────────────────────

/// Index of an appliance in the configured [`ApplianceSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ApplianceId(u8);

impl ApplianceId {
    /// `None` for indices no appliance table can hold.
    pub(crate) fn new(index: usize) -> Option<Self> {
        if index >= MAX_APPLIANCES {
            return None;
        }
        u8::try_from(index).ok().map(Self)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ApplianceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    name: ApplianceName,
    temperature_controlled: bool,
}

/// Closed set of appliances, fixed for the process lifetime.
#[derive(Debug, Clone)]
pub struct ApplianceSet {
    entries: heapless::Vec<Entry, MAX_APPLIANCES>,
}

impl ApplianceSet {
    /// Build the set from the configured appliance table.
    ///
    /// Names must be non-empty and unique (ignoring ASCII case).
    pub fn from_specs(specs: &[ApplianceSpec]) -> Result<Self, ConfigError> {
        if specs.len() > MAX_APPLIANCES {
            return Err(ConfigError::ValidationFailed("too many appliances"));
        }
        let mut entries = heapless::Vec::new();
        for (i, spec) in specs.iter().enumerate() {
            if spec.name.is_empty() {
                return Err(ConfigError::ValidationFailed("appliance name must not be empty"));
            }
            if specs[..i]
                .iter()
                .any(|other| other.name.eq_ignore_ascii_case(&spec.name))
            {
                return Err(ConfigError::ValidationFailed("appliance names must be unique"));
            }
            entries
                .push(Entry {
                    name: spec.name.clone(),
                    temperature_controlled: spec.temperature_controlled,
                })
                .map_err(|_| ConfigError::ValidationFailed("too many appliances"))?;
        }
        Ok(Self { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Every appliance, in configuration order.
    pub fn ids(&self) -> impl Iterator<Item = ApplianceId> + '_ {
        (0..self.entries.len()).filter_map(ApplianceId::new)
    }

    /// Resolve a boundary name (ASCII case-insensitive).
    pub fn lookup(&self, name: &str) -> Option<ApplianceId> {
        self.entries
            .iter()
            .position(|e| e.name.eq_ignore_ascii_case(name))
            .and_then(ApplianceId::new)
    }

    /// Canonical (configured) name of `id`.
    pub fn name(&self, id: ApplianceId) -> &str {
        self.entries.get(id.index()).map_or("?", |e| e.name.as_str())
    }

    /// Owned copy of the configured name, for events.
    pub fn name_owned(&self, id: ApplianceId) -> ApplianceName {
        self.entries
            .get(id.index())
            .map(|e| e.name.clone())
            .unwrap_or_default()
    }

    pub fn is_temperature_controlled(&self, id: ApplianceId) -> bool {
        self.entries
            .get(id.index())
            .is_some_and(|e| e.temperature_controlled)
    }

    pub fn contains(&self, id: ApplianceId) -> bool {
        id.index() < self.entries.len()
    }
}
