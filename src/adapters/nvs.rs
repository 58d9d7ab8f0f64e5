//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`StoragePort`] and [`ConfigPort`] over the ESP-IDF NVS
//! flash partition. Each subsystem gets its own namespace (`net`,
//! `claim`, `radio`, `certs`); writes commit atomically per
//! nvs_commit(), so no partial value survives power loss.
//!
//! On simulation targets the backend is an in-memory map — persistence
//! across "boots" is the test's responsibility.

use log::{info, warn};

use crate::app::ports::{ConfigPort, StoragePort};
use crate::config::SystemConfig;
use crate::error::StorageError;

#[cfg(not(target_os = "espidf"))]
use std::cell::RefCell;
#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;

const CONFIG_NAMESPACE: &str = "meteo";
const CONFIG_KEY: &str = "syscfg";
const CONFIG_BLOB_MAX: usize = 512;

pub struct NvsAdapter {
    #[cfg(not(target_os = "espidf"))]
    store: RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsAdapter {
    /// Initialise NVS flash. On first boot or after a version mismatch
    /// the partition is erased and re-initialised; any other failure is
    /// unrecoverable and the caller must halt — every subsystem
    /// (credentials, ownership, channel memory) depends on storage.
    pub fn new() -> Result<Self, StorageError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: nvs_flash_init / nvs_flash_erase run from the
            // single main-task context before any concurrent NVS access.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(StorageError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(StorageError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(StorageError::IoError);
            }
            info!("NvsAdapter: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsAdapter: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key(namespace: &str, key: &str) -> String {
        format!("{namespace}::{key}")
    }

    /// Open an NVS namespace, run a closure with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(namespace: &str, write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut ns_buf = [0u8; 16];
        let ns_bytes = namespace.as_bytes();
        let len = ns_bytes.len().min(15);
        ns_buf[..len].copy_from_slice(&ns_bytes[..len]);

        let mut key_handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut key_handle) };
        if ret != ESP_OK {
            return Err(ret);
        }
        let result = f(key_handle);
        unsafe {
            nvs_close(key_handle);
        }
        result
    }

    #[cfg(target_os = "espidf")]
    fn key_cstr(key: &str) -> [u8; 16] {
        let mut buf = [0u8; 16];
        let bytes = key.as_bytes();
        let len = bytes.len().min(15);
        buf[..len].copy_from_slice(&bytes[..len]);
        buf
    }
}

impl StoragePort for NvsAdapter {
    #[cfg(target_os = "espidf")]
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let key_buf = Self::key_cstr(key);
        Self::with_nvs_handle(namespace, false, |h| {
            let mut len = buf.len();
            let ret = unsafe {
                nvs_get_blob(
                    h,
                    key_buf.as_ptr() as *const _,
                    buf.as_mut_ptr() as *mut _,
                    &mut len,
                )
            };
            if ret == ESP_OK { Ok(len) } else { Err(ret) }
        })
        .map_err(|ret| {
            if ret == ESP_ERR_NVS_NOT_FOUND {
                StorageError::NotFound
            } else {
                StorageError::IoError
            }
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match self.store.borrow().get(&Self::composite_key(namespace, key)) {
            Some(v) => {
                let n = v.len().min(buf.len());
                buf[..n].copy_from_slice(&v[..n]);
                Ok(n)
            }
            None => Err(StorageError::NotFound),
        }
    }

    #[cfg(target_os = "espidf")]
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let key_buf = Self::key_cstr(key);
        Self::with_nvs_handle(namespace, true, |h| {
            let ret = unsafe {
                nvs_set_blob(
                    h,
                    key_buf.as_ptr() as *const _,
                    data.as_ptr() as *const _,
                    data.len(),
                )
            };
            if ret != ESP_OK {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(h) };
            if ret == ESP_OK { Ok(()) } else { Err(ret) }
        })
        .map_err(|ret| {
            if ret == ESP_ERR_NVS_NOT_ENOUGH_SPACE {
                StorageError::Full
            } else {
                StorageError::IoError
            }
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        self.store
            .borrow_mut()
            .insert(Self::composite_key(namespace, key), data.to_vec());
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        let key_buf = Self::key_cstr(key);
        let res = Self::with_nvs_handle(namespace, true, |h| {
            let ret = unsafe { nvs_erase_key(h, key_buf.as_ptr() as *const _) };
            // A missing key is already the desired end state.
            if ret != ESP_OK && ret != ESP_ERR_NVS_NOT_FOUND {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(h) };
            if ret == ESP_OK { Ok(()) } else { Err(ret) }
        });
        res.map_err(|_| StorageError::IoError)
    }

    #[cfg(not(target_os = "espidf"))]
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.store
            .borrow_mut()
            .remove(&Self::composite_key(namespace, key));
        Ok(())
    }

    #[cfg(target_os = "espidf")]
    fn exists(&self, namespace: &str, key: &str) -> bool {
        let key_buf = Self::key_cstr(key);
        // Null-buffer length query: reports presence without copying.
        Self::with_nvs_handle(namespace, false, |h| {
            let mut len: usize = 0;
            let ret = unsafe {
                nvs_get_blob(
                    h,
                    key_buf.as_ptr() as *const _,
                    core::ptr::null_mut(),
                    &mut len,
                )
            };
            match ret {
                ESP_OK => Ok(true),
                ESP_ERR_NVS_NOT_FOUND => Ok(false),
                _ => Err(ret),
            }
        })
        .unwrap_or(false)
    }

    #[cfg(not(target_os = "espidf"))]
    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.store
            .borrow()
            .contains_key(&Self::composite_key(namespace, key))
    }

    #[cfg(target_os = "espidf")]
    fn erase_namespace(&mut self, namespace: &str) -> Result<(), StorageError> {
        Self::with_nvs_handle(namespace, true, |h| {
            let ret = unsafe { nvs_erase_all(h) };
            if ret != ESP_OK {
                return Err(ret);
            }
            let ret = unsafe { nvs_commit(h) };
            if ret == ESP_OK { Ok(()) } else { Err(ret) }
        })
        .map_err(|_| StorageError::IoError)
    }

    #[cfg(not(target_os = "espidf"))]
    fn erase_namespace(&mut self, namespace: &str) -> Result<(), StorageError> {
        let prefix = format!("{namespace}::");
        self.store.borrow_mut().retain(|k, _| !k.starts_with(&prefix));
        Ok(())
    }
}

impl ConfigPort for NvsAdapter {
    fn load(&self) -> Result<SystemConfig, StorageError> {
        let mut buf = [0u8; CONFIG_BLOB_MAX];
        match self.read(CONFIG_NAMESPACE, CONFIG_KEY, &mut buf) {
            Ok(n) => match postcard::from_bytes(&buf[..n]) {
                Ok(cfg) => {
                    info!("Config: loaded from NVS ({n} bytes)");
                    Ok(cfg)
                }
                Err(_) => {
                    warn!("Config: stored blob undecodable, using defaults");
                    Ok(SystemConfig::default())
                }
            },
            Err(StorageError::NotFound) => Ok(SystemConfig::default()),
            Err(e) => Err(e),
        }
    }

    fn save(&self, config: &SystemConfig) -> Result<(), StorageError> {
        let mut buf = [0u8; CONFIG_BLOB_MAX];
        let used = postcard::to_slice(config, &mut buf).map_err(|_| StorageError::Full)?;

        // save() is &self so both ports can share one adapter handle;
        // route through the same backend as write().
        #[cfg(target_os = "espidf")]
        {
            let key_buf = Self::key_cstr(CONFIG_KEY);
            Self::with_nvs_handle(CONFIG_NAMESPACE, true, |h| {
                let ret = unsafe {
                    nvs_set_blob(
                        h,
                        key_buf.as_ptr() as *const _,
                        used.as_ptr() as *const _,
                        used.len(),
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(h) };
                if ret == ESP_OK { Ok(()) } else { Err(ret) }
            })
            .map_err(|_| StorageError::IoError)
        }

        #[cfg(not(target_os = "espidf"))]
        {
            self.store.borrow_mut().insert(
                Self::composite_key(CONFIG_NAMESPACE, CONFIG_KEY),
                used.to_vec(),
            );
            Ok(())
        }
    }
}
