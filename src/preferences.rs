//! The local key-value blob holding feature toggles and the last cleanup time.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default)]
    pub features: BTreeMap<String, bool>,
    #[serde(default)]
    pub last_cleanup_at: Option<DateTime<Utc>>,
}

impl Preferences {
    /// Toggles default to on when they have never been set.
    pub fn feature_enabled(&self, name: &str) -> bool {
        self.features.get(name).copied().unwrap_or(true)
    }

    pub fn set_feature(&mut self, name: &str, enabled: bool) {
        self.features.insert(name.to_string(), enabled);
    }

    pub fn cleanup_due(&self, now: DateTime<Utc>, every: chrono::Duration) -> bool {
        match self.last_cleanup_at {
            Some(last) => now - last >= every,
            None => true,
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum PreferencesError {
    #[error("Failed to access the preferences file {path}.")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("The preferences file {path} is not valid JSON.")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone)]
pub struct PreferencesFile {
    path: PathBuf,
}

impl PreferencesFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the blob; a file that does not exist yet yields the defaults.
    pub fn load(&self) -> Result<Preferences, PreferencesError> {
        let contents = match std::fs::read(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Preferences::default()),
            Err(source) => {
                return Err(PreferencesError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        serde_json::from_slice(&contents).map_err(|source| PreferencesError::Format {
            path: self.path.clone(),
            source,
        })
    }

    pub fn save(&self, preferences: &Preferences) -> Result<(), PreferencesError> {
        let contents =
            serde_json::to_vec_pretty(preferences).map_err(|source| PreferencesError::Format {
                path: self.path.clone(),
                source,
            })?;
        std::fs::write(&self.path, contents).map_err(|source| PreferencesError::Io {
            path: self.path.clone(),
            source,
        })
    }

    pub fn record_cleanup(&self, at: DateTime<Utc>) -> Result<(), PreferencesError> {
        let mut preferences = self.load()?;
        preferences.last_cleanup_at = Some(at);
        self.save(&preferences)
    }
}
