use lsdai_core::PreferenceStore;
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

#[derive(Debug, thiserror::Error)]
pub enum FilePrefsError {
    #[error("could not access {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("{path} is not a JSON object: {source}")]
    Json {
        path: String,
        source: serde_json::Error,
    },
}

/// Preference blobs kept as one JSON object on disk, rewritten on every set.
/// Clones share the same in-memory copy.
#[derive(Debug, Clone)]
pub struct FilePreferences {
    path: PathBuf,
    values: Rc<RefCell<Map<String, Value>>>,
}

impl FilePreferences {
    /// Load `path` if it exists, otherwise start empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: &Path) -> Result<Self, FilePrefsError> {
        let values = match fs::read_to_string(path) {
            Ok(text) => serde_json::from_str(&text).map_err(|source| FilePrefsError::Json {
                path: path.display().to_string(),
                source,
            })?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(source) => {
                return Err(FilePrefsError::Io {
                    path: path.display().to_string(),
                    source,
                });
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            values: Rc::new(RefCell::new(values)),
        })
    }

    fn flush(&self) -> Result<(), FilePrefsError> {
        let io_err = |source| FilePrefsError::Io {
            path: self.path.display().to_string(),
            source,
        };
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let text = serde_json::to_string_pretty(&*self.values.borrow()).map_err(|source| {
            FilePrefsError::Json {
                path: self.path.display().to_string(),
                source,
            }
        })?;
        fs::write(&self.path, text).map_err(io_err)
    }
}

impl PreferenceStore for FilePreferences {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &Value) -> bool {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.clone());
        match self.flush() {
            Ok(()) => true,
            Err(err) => {
                log::warn!("preference {key} kept in memory only: {err}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_file(label: &str) -> PathBuf {
        std::env::temp_dir().join(format!(
            "lsdai-prefs-{label}-{}.json",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos()
        ))
    }

    #[test]
    fn values_survive_reopen() {
        let path = temp_file("reopen");
        let prefs = FilePreferences::open(&path).unwrap();
        assert!(prefs.set("favorites", &json!(["sdxl-vae"])));
        let reopened = FilePreferences::open(&path).unwrap();
        assert_eq!(reopened.get("favorites"), Some(json!(["sdxl-vae"])));
        let _ = fs::remove_file(path);
    }

    #[test]
    fn corrupt_file_is_rejected() {
        let path = temp_file("corrupt");
        fs::write(&path, "[1, 2").unwrap();
        assert!(matches!(
            FilePreferences::open(&path),
            Err(FilePrefsError::Json { .. })
        ));
        let _ = fs::remove_file(path);
    }
}
