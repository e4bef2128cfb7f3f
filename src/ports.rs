//! Collaborator contracts consumed by the analysis core.
//!
//! The engine never talks to hardware or disk directly; capture, settings
//! persistence and wall-clock time all arrive through the traits below so the
//! pipeline can be driven by stubs in tests and by platform backends in the
//! host application.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Instant;

use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;

use crate::config::VisualizerSettings;
use crate::error::{EngineError, SettingsError};
use crate::types::AudioFrame;

/// Audio capture contract.
///
/// `read_frame` suspends until at least `min_samples` samples are available or
/// the token is cancelled. A stalled source may block indefinitely; the
/// scheduler imposes no timeout of its own.
pub trait AudioInputPort: Send + Sync {
    fn read_frame(
        &self,
        min_samples: usize,
        cancel: CancellationToken,
    ) -> BoxFuture<'_, Result<AudioFrame, EngineError>>;
}

/// Settings persistence contract. `get` must always produce a value; stores
/// fall back to defaults rather than failing a running visualizer.
pub trait SettingsPort: Send + Sync {
    fn get(&self) -> VisualizerSettings;
    fn save(&self, settings: VisualizerSettings) -> Result<(), SettingsError>;
}

/// Trait representing a monotonic time source used for frame throttling and
/// refractory gating.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
}

/// Default time source backed by `Instant::now`.
#[derive(Default)]
pub struct SystemTimeSource {
    _unit: (),
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Settings store that lives entirely in memory. Useful for tests and for
/// hosts that manage persistence themselves.
pub struct InMemorySettingsStore {
    current: RwLock<VisualizerSettings>,
}

impl InMemorySettingsStore {
    pub fn new(initial: VisualizerSettings) -> Self {
        Self {
            current: RwLock::new(initial),
        }
    }
}

impl Default for InMemorySettingsStore {
    fn default() -> Self {
        Self::new(VisualizerSettings::default())
    }
}

impl SettingsPort for InMemorySettingsStore {
    fn get(&self) -> VisualizerSettings {
        self.current
            .read()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    fn save(&self, settings: VisualizerSettings) -> Result<(), SettingsError> {
        settings.validate()?;
        let mut guard = self.current.write().map_err(|_| SettingsError::Storage {
            reason: "settings lock poisoned".to_string(),
        })?;
        *guard = settings;
        Ok(())
    }
}

/// Settings store backed by a JSON file.
///
/// `get` is forgiving: a missing or unparsable file logs a warning and yields
/// defaults so the visualizer always comes up. `save` is strict: it validates
/// first and surfaces I/O failures to the caller.
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl SettingsPort for JsonSettingsStore {
    fn get(&self) -> VisualizerSettings {
        match fs::read_to_string(&self.path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(settings) => settings,
                Err(err) => {
                    log::warn!(
                        "[JsonSettingsStore] Failed to parse {:?}: {}. Using defaults.",
                        self.path,
                        err
                    );
                    VisualizerSettings::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[JsonSettingsStore] Failed to read {:?}: {}. Using defaults.",
                    self.path,
                    err
                );
                VisualizerSettings::default()
            }
        }
    }

    fn save(&self, settings: VisualizerSettings) -> Result<(), SettingsError> {
        settings.validate()?;
        let json = serde_json::to_string_pretty(&settings).map_err(|err| {
            SettingsError::Storage {
                reason: err.to_string(),
            }
        })?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|err| SettingsError::Storage {
                reason: err.to_string(),
            })?;
        }
        fs::write(&self.path, json).map_err(|err| SettingsError::Storage {
            reason: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_memory_store_roundtrip() {
        let store = InMemorySettingsStore::default();
        let mut settings = store.get();
        settings.bar_count = 32;
        settings.target_fps = 120;
        store.save(settings.clone()).unwrap();
        assert_eq!(store.get(), settings);
    }

    #[test]
    fn test_in_memory_store_rejects_invalid_settings() {
        let store = InMemorySettingsStore::default();
        let mut settings = store.get();
        settings.bar_count = 1;
        assert!(store.save(settings).is_err());
        assert_eq!(store.get().bar_count, VisualizerSettings::default().bar_count);
    }

    #[test]
    fn test_json_store_defaults_when_file_missing() {
        let store = JsonSettingsStore::new("/nonexistent/flux-settings.json");
        assert_eq!(store.get(), VisualizerSettings::default());
    }

    #[test]
    fn test_json_store_roundtrip() {
        let dir = std::env::temp_dir().join(format!("flux_core_test_{}", std::process::id()));
        let path = dir.join("settings.json");
        let store = JsonSettingsStore::new(&path);

        let mut settings = VisualizerSettings::default();
        settings.bar_count = 48;
        settings.smoothing = 0.25;
        store.save(settings.clone()).unwrap();
        assert_eq!(store.get(), settings);

        let _ = fs::remove_dir_all(dir);
    }
}
