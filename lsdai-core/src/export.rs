//! Point-in-time export document.
use crate::constants::EXPORT_VERSION;
use crate::prefs::Settings;
use crate::queue::QueueEntry;
use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Export JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Unsupported export version {found} (newest understood is {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportDocument {
    pub version: u32,
    pub settings: Settings,
    pub favorites: Vec<String>,
    pub selected: Vec<String>,
    pub queue: Vec<QueueEntry>,
}

impl Default for ExportDocument {
    fn default() -> Self {
        Self {
            version: EXPORT_VERSION,
            settings: Settings::default(),
            favorites: Vec::new(),
            selected: Vec::new(),
            queue: Vec::new(),
        }
    }
}

impl ExportDocument {
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, ExportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// # Errors
    ///
    /// Returns an error for malformed JSON or a version newer than this build.
    pub fn from_json(json: &str) -> Result<Self, ExportError> {
        let doc: Self = serde_json::from_str(json)?;
        if doc.version > EXPORT_VERSION {
            return Err(ExportError::UnsupportedVersion {
                found: doc.version,
                supported: EXPORT_VERSION,
            });
        }
        Ok(doc)
    }

    /// Suggested download name, e.g. `lsdai-settings-2024-05-01.json`.
    #[must_use]
    pub fn file_name(date_iso: &str) -> String {
        let day = date_iso.split('T').next().unwrap_or(date_iso);
        format!("lsdai-settings-{day}.json")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_future_versions() {
        let err = ExportDocument::from_json(r#"{"version": 99}"#).unwrap_err();
        assert!(matches!(err, ExportError::UnsupportedVersion { found: 99, .. }));
    }

    #[test]
    fn missing_fields_default() {
        let doc = ExportDocument::from_json(r#"{"favorites": ["a"]}"#).unwrap();
        assert_eq!(doc.version, EXPORT_VERSION);
        assert_eq!(doc.favorites, vec!["a"]);
        assert!(doc.queue.is_empty());
    }

    #[test]
    fn file_name_uses_date_part() {
        assert_eq!(
            ExportDocument::file_name("2024-05-01T12:30:00Z"),
            "lsdai-settings-2024-05-01.json"
        );
    }
}
