//! `localStorage`-backed preference store.
use crate::dom;
use lsdai_core::PreferenceStore;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum WebStorageError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<wasm_bindgen::JsValue> for WebStorageError {
    fn from(value: wasm_bindgen::JsValue) -> Self {
        Self::Storage(dom::js_error_message(&value))
    }
}

/// Preferences stored as JSON strings under `<prefix><key>`.
#[derive(Debug, Clone)]
pub struct LocalStoragePreferences {
    prefix: String,
}

impl LocalStoragePreferences {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    #[must_use]
    pub fn storage_key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }

    /// # Errors
    ///
    /// Returns an error if storage is unavailable or the blob is not JSON.
    pub fn read(&self, key: &str) -> Result<Option<Value>, WebStorageError> {
        let raw = dom::local_storage()?.get_item(&self.storage_key(key))?;
        raw.map(|text| decode(&text)).transpose()
    }

    /// # Errors
    ///
    /// Returns an error if storage is unavailable or rejects the write (quota).
    pub fn write(&self, key: &str, value: &Value) -> Result<(), WebStorageError> {
        let text = serde_json::to_string(value)?;
        dom::local_storage()?.set_item(&self.storage_key(key), &text)?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if storage is unavailable.
    pub fn remove(&self, key: &str) -> Result<(), WebStorageError> {
        dom::local_storage()?.remove_item(&self.storage_key(key))?;
        Ok(())
    }
}

fn decode(text: &str) -> Result<Value, WebStorageError> {
    Ok(serde_json::from_str(text)?)
}

impl PreferenceStore for LocalStoragePreferences {
    fn get(&self, key: &str) -> Option<Value> {
        self.read(key)
            .map_err(|err| log::warn!("could not read preference {key}: {err}"))
            .ok()
            .flatten()
    }

    fn set(&self, key: &str, value: &Value) -> bool {
        match self.write(key, value) {
            Ok(()) => true,
            Err(err) => {
                log::warn!("could not save preference {key}: {err}");
                false
            }
        }
    }
}
