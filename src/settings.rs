//! Persisted user-tunable settings.
//!
//! A small JSON document on disk. Reads are forgiving (missing or mangled
//! files fall back to defaults); writes happen on every user change so the
//! next session picks up where this one left off.

use crate::session::TransitionStyle;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Settings {
    pub hold_ms: u64,
    pub fade_ms: u64,
    pub hold_enabled: bool,
    pub transition: TransitionStyle,
}

impl Settings {
    const fn default_hold_ms() -> u64 {
        2000
    }

    const fn default_fade_ms() -> u64 {
        1000
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            hold_ms: Self::default_hold_ms(),
            fade_ms: Self::default_fade_ms(),
            hold_enabled: true,
            transition: TransitionStyle::Crossfade,
        }
    }
}

/// File-backed store for [`Settings`].
#[derive(Debug)]
pub struct SettingsStore {
    path: PathBuf,
    current: Settings,
}

impl SettingsStore {
    /// Load settings from `path`, substituting defaults when the file is
    /// missing or does not parse. Never fails; a broken settings file must
    /// not keep the screensaver from starting.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<Settings>(&raw) {
                Ok(settings) => settings,
                Err(err) => {
                    warn!(path = %path.display(), error = %err, "settings file invalid; using defaults");
                    Settings::default()
                }
            },
            Err(err) => {
                debug!(path = %path.display(), error = %err, "settings file unreadable; using defaults");
                Settings::default()
            }
        };
        Self { path, current }
    }

    pub fn settings(&self) -> &Settings {
        &self.current
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Apply a mutation and persist the whole document.
    pub fn update(&mut self, apply: impl FnOnce(&mut Settings)) -> Result<()> {
        apply(&mut self.current);
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        let raw = serde_json::to_string_pretty(&self.current)
            .context("serializing settings document")?;
        fs::write(&self.path, raw)
            .with_context(|| format!("writing settings to {}", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::load(dir.path().join("absent.json"));
        assert_eq!(store.settings(), &Settings::default());
    }

    #[test]
    fn invalid_json_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{not json").unwrap();
        let store = SettingsStore::load(&path);
        assert_eq!(store.settings(), &Settings::default());
    }

    #[test]
    fn partial_document_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"hold-ms": 500}"#).unwrap();
        let store = SettingsStore::load(&path);
        assert_eq!(store.settings().hold_ms, 500);
        assert_eq!(store.settings().fade_ms, Settings::default_fade_ms());
        assert!(store.settings().hold_enabled);
    }

    #[test]
    fn updates_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let mut store = SettingsStore::load(&path);
        store
            .update(|s| {
                s.fade_ms = 750;
                s.transition = TransitionStyle::Cut;
                s.hold_enabled = false;
            })
            .unwrap();

        let reread = SettingsStore::load(&path);
        assert_eq!(reread.settings().fade_ms, 750);
        assert_eq!(reread.settings().transition, TransitionStyle::Cut);
        assert!(!reread.settings().hold_enabled);
    }
}
