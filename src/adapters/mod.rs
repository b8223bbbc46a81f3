//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements          | Connects to              |
//! |----------------|---------------------|--------------------------|
//! | `hardware`     | TemperaturePort     | ESP32 ADC (NTC probe)    |
//! |                | RelayPort           | ESP32 GPIO relay bank    |
//! | `log_sink`     | EventSink           | Serial log output        |
//! | `nvs`          | ConfigPort          | NVS / in-memory store    |
//! |                | StoragePort         |                          |
//! |                | ScheduleRepository  |                          |
//! | `time`         | ClockPort           | ESP32 system timer, RTC  |
//! | `wifi`         | ConnectivityPort    | ESP-IDF WiFi STA         |

pub mod hardware;
pub mod log_sink;
pub mod nvs;
pub mod time;
pub mod wifi;
