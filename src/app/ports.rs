//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (clock, thermometer, relays, event sinks, storage)
//! implement these traits.  The [`AppService`](super::service::AppService)
//! consumes them via generics, so the domain core never touches hardware
//! directly.
//!
//! Every port returns immediately: a value, or an explicit
//! "unavailable / fault" signal.  None of them may block on I/O retries.
//!
//! [`ConfigPort`] implementations validate before persisting.  Storage
//! errors are typed and never reach the tick loop.

use crate::appliance::{ApplianceId, RelayState};
use crate::clock::{Instant, MinuteOfDay};
use crate::config::SystemConfig;
use crate::scheduler::ScheduleRecord;
use crate::sensors::TemperatureSample;

// ───────────────────────────────────────────────────────────────
// Clock port (driven adapter: timer / RTC → domain)
// ───────────────────────────────────────────────────────────────

/// Time source for the control loop.
pub trait ClockPort {
    /// Monotonic time since boot.
    fn now(&self) -> Instant;

    /// Local minute-of-day, or `None` while wall-clock time is not yet
    /// trustworthy (RTC unset, NTP not synced).
    fn minute_of_day(&self) -> Option<MinuteOfDay>;
}

// ───────────────────────────────────────────────────────────────
// Temperature port (driven adapter: probe → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port for the water-temperature probe.
pub trait TemperaturePort {
    /// Latest reading, already classified.  Retries, if any, happen
    /// inside the adapter; a failed read is reported as `Fault`.
    fn read_temperature(&mut self) -> TemperatureSample;
}

// ───────────────────────────────────────────────────────────────
// Relay port (driven adapter: domain → relay board)
// ───────────────────────────────────────────────────────────────

/// Write-side port: the domain commands relay channels through this.
pub trait RelayPort {
    /// Drive one appliance's relay.  Hardware failures are the adapter's
    /// to log; the control loop re-asserts every tick.
    fn set_relay(&mut self, appliance: ApplianceId, state: RelayState);

    /// De-energise every channel; safe shutdown.
    fn all_off(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (serial log, MQTT,
/// display, etc.).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persistent config)
// ───────────────────────────────────────────────────────────────

/// Loads and persists system configuration.
///
/// # Security
///
/// Implementations MUST validate config values before persisting.
/// Invalid values are rejected with [`ConfigError::ValidationFailed`],
/// never silently clamped.  A bad write must not be able to, say, move
/// the emergency high threshold above the sensor's range.
pub trait ConfigPort {
    /// Load configuration from persistent storage.
    /// Returns [`SystemConfig::default()`] if no stored config exists.
    fn load(&self) -> Result<SystemConfig, ConfigError>;

    /// Validate and persist configuration.
    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError>;
}

// ───────────────────────────────────────────────────────────────
// Storage port (driven adapter: domain ↔ NVS / flash)
// ───────────────────────────────────────────────────────────────

/// Raw namespaced blobs: the API credential, and whatever the typed
/// ports above are built on.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value, replacing any previous one.  No partial writes.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Schedule repository (driven adapter: domain ↔ persisted schedules)
// ───────────────────────────────────────────────────────────────

/// Durable home of the schedule record (appliance name → intervals).
pub trait ScheduleRepository {
    /// `Ok(None)` when nothing has been stored yet.  A record that can't
    /// be decoded is reported as [`StorageError::Corrupted`].
    fn load_schedules(&self) -> Result<Option<ScheduleRecord>, StorageError>;

    /// Replace the stored record atomically.
    fn save_schedules(&self, record: &ScheduleRecord) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`ConfigPort`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Stored config failed integrity / deserialization check.
    Corrupted,
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
    /// Underlying storage is full.
    StorageFull,
    /// Generic I/O error from the storage backend.
    IoError,
}

/// Errors from [`StoragePort`] and [`ScheduleRepository`] operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Requested key does not exist.
    NotFound,
    /// Storage partition is full.
    Full,
    /// Generic I/O error.
    IoError,
    /// Stored blob could not be decoded.
    Corrupted,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Corrupted => write!(f, "config corrupted"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
            Self::StorageFull => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
        }
    }
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::NotFound => write!(f, "key not found"),
            Self::Full => write!(f, "storage full"),
            Self::IoError => write!(f, "I/O error"),
            Self::Corrupted => write!(f, "stored data corrupted"),
        }
    }
}

impl core::error::Error for ConfigError {}
impl core::error::Error for StorageError {}
