//! Preference blobs: settings, favorites and an in-memory store.
use crate::PreferenceStore;
use crate::constants::{FAVORITES_KEY, SETTINGS_KEY};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Widget toggles that survive reloads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Show SDXL variants instead of SD 1.5.
    pub sdxl: bool,
    pub inpainting_only: bool,
    pub detailed_download: bool,
}

impl Settings {
    /// Read settings, falling back to defaults for a missing or malformed blob.
    #[must_use]
    pub fn load<P: PreferenceStore + ?Sized>(prefs: &P) -> Self {
        prefs
            .get(SETTINGS_KEY)
            .and_then(|value| {
                serde_json::from_value(value)
                    .map_err(|err| log::warn!("ignoring stored settings: {err}"))
                    .ok()
            })
            .unwrap_or_default()
    }

    pub fn save<P: PreferenceStore + ?Sized>(&self, prefs: &P) -> bool {
        match serde_json::to_value(self) {
            Ok(value) => prefs.set(SETTINGS_KEY, &value),
            Err(err) => {
                log::warn!("settings not serializable: {err}");
                false
            }
        }
    }
}

/// Favorite ids stored as a JSON array; anything else reads as empty.
#[must_use]
pub fn load_favorites<P: PreferenceStore + ?Sized>(prefs: &P) -> Vec<String> {
    match prefs.get(FAVORITES_KEY) {
        Some(Value::Array(values)) => values
            .into_iter()
            .filter_map(|value| value.as_str().map(str::to_string))
            .collect(),
        Some(other) => {
            log::warn!("ignoring stored favorites of unexpected shape: {other}");
            Vec::new()
        }
        None => Vec::new(),
    }
}

/// Process-local store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryPreferences {
    values: Rc<RefCell<HashMap<String, Value>>>,
    read_only: bool,
}

impl MemoryPreferences {
    /// A store whose writes always fail, for exercising quota errors.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            values: Rc::default(),
            read_only: true,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &Value) -> bool {
        if self.read_only {
            log::warn!("preference store rejected write to {key}");
            return false;
        }
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.clone());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn settings_roundtrip_through_store() {
        let prefs = MemoryPreferences::default();
        let settings = Settings {
            sdxl: true,
            inpainting_only: false,
            detailed_download: true,
        };
        assert!(settings.save(&prefs));
        assert_eq!(Settings::load(&prefs), settings);
    }

    #[test]
    fn malformed_blobs_fall_back_to_defaults() {
        let prefs = MemoryPreferences::default();
        prefs.set(SETTINGS_KEY, &json!("not an object"));
        prefs.set(FAVORITES_KEY, &json!({"a": 1}));
        assert_eq!(Settings::load(&prefs), Settings::default());
        assert!(load_favorites(&prefs).is_empty());
    }

    #[test]
    fn favorites_skip_non_string_members() {
        let prefs = MemoryPreferences::default();
        prefs.set(FAVORITES_KEY, &json!(["a", 3, "b"]));
        assert_eq!(load_favorites(&prefs), vec!["a", "b"]);
    }

    #[test]
    fn failing_store_reports_false() {
        let prefs = MemoryPreferences::failing();
        assert!(!prefs.set("k", &json!(1)));
        assert!(prefs.get("k").is_none());
        assert!(prefs.is_empty());
    }
}
