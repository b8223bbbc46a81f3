//! Flash persistence for the controller.
//!
//! One adapter backs all three storage ports:
//!
//! | Namespace | Key       | Contents                 | Port                 |
//! |-----------|-----------|--------------------------|----------------------|
//! | `aquactl` | `syscfg`  | `SystemConfig`, postcard | [`ConfigPort`]       |
//! | `aquactl` | `sched`   | schedule record, JSON    | [`ScheduleRepository`] |
//! | `auth`    | `api_key` | control API key          | [`StoragePort`]      |
//!
//! On the device each access opens an [`EspNvs`] handle on the default
//! partition; on the host a map stands in for flash.  An adapter built
//! with [`NvsAdapter::default`] on the device has no partition: reads
//! find nothing and writes fail, so the controller runs on defaults.
//!
//! [`EspNvs`]: esp_idf_svc::nvs::EspNvs

use log::{info, warn};

use crate::app::ports::{
    ConfigError, ConfigPort, ScheduleRepository, StorageError, StoragePort,
};
use crate::config::SystemConfig;
use crate::scheduler::ScheduleRecord;

#[cfg(not(target_os = "espidf"))]
use std::cell::RefCell;
#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};

const APP_NAMESPACE: &str = "aquactl";
const CONFIG_KEY: &str = "syscfg";
const SCHEDULE_KEY: &str = "sched";
const CRED_NAMESPACE: &str = "auth";
/// Credential key under which the control API key is stored.
pub const API_KEY_CRED: &str = "api_key";

/// Largest blob accepted or read back.
const MAX_BLOB_SIZE: usize = 4000;

#[derive(Default)]
pub struct NvsAdapter {
    #[cfg(target_os = "espidf")]
    partition: Option<EspDefaultNvsPartition>,
    #[cfg(not(target_os = "espidf"))]
    blobs: RefCell<HashMap<(String, String), Vec<u8>>>,
}

#[cfg(target_os = "espidf")]
impl NvsAdapter {
    /// Persist into `partition`.  Taking the partition initialises NVS
    /// flash (erasing it after a layout change), so that is the caller's.
    pub fn new(partition: EspDefaultNvsPartition) -> Self {
        info!("NvsAdapter: default partition");
        Self {
            partition: Some(partition),
        }
    }

    fn open(&self, namespace: &str, writable: bool) -> Result<EspNvs<NvsDefault>, StorageError> {
        let partition = self.partition.clone().ok_or(StorageError::IoError)?;
        EspNvs::new(partition, namespace, writable).map_err(|e| {
            warn!("NvsAdapter: open '{}' failed ({})", namespace, e);
            StorageError::IoError
        })
    }

    fn read_blob(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        if self.partition.is_none() {
            return Err(StorageError::NotFound);
        }
        let nvs = self.open(namespace, false)?;
        let mut buf = vec![0u8; MAX_BLOB_SIZE];
        match nvs.get_blob(key, &mut buf) {
            Ok(Some(bytes)) => Ok(bytes.to_vec()),
            Ok(None) => Err(StorageError::NotFound),
            Err(e) if e.code() == esp_idf_svc::sys::ESP_ERR_NVS_INVALID_LENGTH as i32 => {
                Err(StorageError::Corrupted)
            }
            Err(e) => {
                warn!("NvsAdapter: read {}/{} failed ({})", namespace, key, e);
                Err(StorageError::IoError)
            }
        }
    }

    fn write_blob(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if data.len() > MAX_BLOB_SIZE {
            return Err(StorageError::Full);
        }
        let mut nvs = self.open(namespace, true)?;
        nvs.set_blob(key, data).map_err(|e| {
            warn!("NvsAdapter: write {}/{} failed ({})", namespace, key, e);
            if e.code() == esp_idf_svc::sys::ESP_ERR_NVS_NOT_ENOUGH_SPACE as i32 {
                StorageError::Full
            } else {
                StorageError::IoError
            }
        })
    }
}

#[cfg(not(target_os = "espidf"))]
impl NvsAdapter {
    fn read_blob(&self, namespace: &str, key: &str) -> Result<Vec<u8>, StorageError> {
        self.blobs
            .borrow()
            .get(&(namespace.to_owned(), key.to_owned()))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    fn write_blob(&self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if data.len() > MAX_BLOB_SIZE {
            return Err(StorageError::Full);
        }
        self.blobs
            .borrow_mut()
            .insert((namespace.to_owned(), key.to_owned()), data.to_vec());
        Ok(())
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, ConfigError> {
        let bytes = match self.read_blob(APP_NAMESPACE, CONFIG_KEY) {
            Ok(bytes) => bytes,
            Err(StorageError::NotFound) => {
                info!("NvsAdapter: no stored config, using defaults");
                return Ok(SystemConfig::default());
            }
            Err(StorageError::Corrupted) => return Err(ConfigError::Corrupted),
            Err(e) => {
                warn!("NvsAdapter: config unreadable ({}), using defaults", e);
                return Ok(SystemConfig::default());
            }
        };
        let cfg: SystemConfig = postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
        cfg.validate()?;
        info!("NvsAdapter: config loaded ({} bytes)", bytes.len());
        Ok(cfg)
    }

    fn save(&self, config: &SystemConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;
        self.write_blob(APP_NAMESPACE, CONFIG_KEY, &bytes)
            .map_err(|e| match e {
                StorageError::Full => ConfigError::StorageFull,
                _ => ConfigError::IoError,
            })?;
        info!("NvsAdapter: config saved ({} bytes)", bytes.len());
        Ok(())
    }
}

impl ScheduleRepository for NvsAdapter {
    fn load_schedules(&self) -> Result<Option<ScheduleRecord>, StorageError> {
        match self.read_blob(APP_NAMESPACE, SCHEDULE_KEY) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map(Some)
                .map_err(|_| StorageError::Corrupted),
            Err(StorageError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn save_schedules(&self, record: &ScheduleRecord) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(record).map_err(|_| StorageError::IoError)?;
        self.write_blob(APP_NAMESPACE, SCHEDULE_KEY, &bytes)?;
        info!("NvsAdapter: schedules saved ({} bytes)", bytes.len());
        Ok(())
    }
}

impl StoragePort for NvsAdapter {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let data = self.read_blob(namespace, key)?;
        let len = data.len().min(buf.len());
        buf[..len].copy_from_slice(&data[..len]);
        Ok(len)
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.write_blob(namespace, key, data)
    }
}

// Credentials live in their own namespace so a config reset never
// touches them.
impl NvsAdapter {
    pub fn store_credential(&mut self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.write(CRED_NAMESPACE, key, data)
    }

    pub fn read_credential(&self, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        self.read(CRED_NAMESPACE, key, buf)
    }
}
