// Browser localStorage backend

use wasm_bindgen::JsValue;

use crate::store::KeyValueStore;
use crate::types::{EconomyError, Result};

fn storage_error(e: JsValue) -> EconomyError {
    EconomyError::Storage(format!("{:?}", e))
}

/// `window.localStorage` as a key-value store
///
/// Private browsing modes may expose no storage at all or reject every
/// write; both surface as `EconomyError::Storage` for the engine to log.
pub struct LocalStorageStore {
    storage: web_sys::Storage,
}

impl LocalStorageStore {
    pub fn open() -> Result<LocalStorageStore> {
        let window = web_sys::window()
            .ok_or_else(|| EconomyError::Storage("no window object".to_string()))?;
        let storage = window
            .local_storage()
            .map_err(storage_error)?
            .ok_or_else(|| EconomyError::Storage("localStorage unavailable".to_string()))?;
        Ok(LocalStorageStore { storage })
    }
}

impl KeyValueStore for LocalStorageStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.storage.get_item(key).map_err(storage_error)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.storage.set_item(key, value).map_err(storage_error)
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.storage.remove_item(key).map_err(storage_error)
    }
}
