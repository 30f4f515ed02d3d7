//! Player settings persisted between sessions (`{ "volume": N }`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSettings {
    pub volume: u8,
}

/// File-backed store for [`PlayerSettings`].
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the settings file. A missing or unreadable file yields
    /// `default_volume`; out-of-range volumes are clamped.
    pub fn load(&self, default_volume: u8) -> PlayerSettings {
        let fallback = PlayerSettings {
            volume: default_volume.min(100),
        };
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return fallback,
            Err(e) => {
                warn!("settings: failed to read {}: {}", self.path.display(), e);
                return fallback;
            }
        };

        #[derive(Deserialize)]
        struct Raw {
            volume: Option<f64>,
        }

        match serde_json::from_str::<Raw>(&content) {
            Ok(Raw { volume: Some(v) }) if v.is_finite() => PlayerSettings {
                volume: v.round().clamp(0.0, 100.0) as u8,
            },
            Ok(_) => fallback,
            Err(e) => {
                warn!("settings: failed to parse {}: {}", self.path.display(), e);
                fallback
            }
        }
    }

    pub fn save(&self, settings: PlayerSettings) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string(&settings)?)?;
        debug!("settings: saved volume={} to {}", settings.volume, self.path.display());
        Ok(())
    }
}
