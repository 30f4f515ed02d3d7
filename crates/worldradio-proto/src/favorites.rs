//! Favorites: user-picked stations persisted as a JSON array.
//!
//! The whole file is read once at startup and rewritten on every toggle.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::model::Station;

pub struct FavoriteStore {
    path: PathBuf,
    stations: Vec<Station>,
    ids: HashSet<String>,
}

impl FavoriteStore {
    /// Load favorites from `path`. A missing or unreadable file starts an
    /// empty set; the file itself is only created on the first toggle.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let stations = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<Vec<Station>>(&content) {
                Ok(list) => list,
                Err(e) => {
                    warn!("favorites: failed to parse {}: {}", path.display(), e);
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!("favorites: failed to read {}: {}", path.display(), e);
                Vec::new()
            }
        };

        let mut store = Self {
            path,
            stations: Vec::new(),
            ids: HashSet::new(),
        };
        for station in stations {
            if station.id.is_empty() || store.ids.contains(&station.id) {
                continue;
            }
            store.ids.insert(station.id.clone());
            store.stations.push(station);
        }
        info!(
            "favorites: loaded {} stations from {}",
            store.stations.len(),
            store.path.display()
        );
        store
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    /// Favorited stations in the order they were added.
    pub fn stations(&self) -> &[Station] {
        &self.stations
    }

    pub fn ids(&self) -> &HashSet<String> {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Add `station` if absent, remove it otherwise, then persist.
    /// Returns whether the station is a favorite afterwards.
    ///
    /// The in-memory set is updated even when writing the file fails; the
    /// error is returned so the caller can tell the user.
    pub fn toggle(&mut self, station: &Station) -> anyhow::Result<bool> {
        if station.id.trim().is_empty() {
            anyhow::bail!("station \"{}\" has no id", station.name);
        }
        let now_favorite = if self.ids.remove(&station.id) {
            self.stations.retain(|s| s.id != station.id);
            false
        } else {
            self.ids.insert(station.id.clone());
            self.stations.push(station.clone());
            true
        };
        self.save()?;
        Ok(now_favorite)
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(&self.stations)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn station(id: &str, name: &str) -> Station {
        Station {
            id: id.to_string(),
            name: name.to_string(),
            url_resolved: format!("http://stream.example/{}", id),
            ..Station::default()
        }
    }

    #[test]
    fn test_toggle_then_untoggle_leaves_empty_array() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("favorites.json");
        let mut store = FavoriteStore::load(&path);
        assert!(!path.exists());

        let radio_x = station("abc", "Radio X");
        assert!(store.toggle(&radio_x).unwrap());
        assert!(store.contains("abc"));
        assert!(!store.toggle(&radio_x).unwrap());
        assert!(store.is_empty());

        let on_disk: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(on_disk, serde_json::json!([]));
    }

    #[test]
    fn test_reload_reproduces_ids() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("favorites.json");
        let mut store = FavoriteStore::load(&path);
        for (id, name) in [("a", "Alpha FM"), ("b", "Beta Radio"), ("c", "Gamma")] {
            store.toggle(&station(id, name)).unwrap();
        }
        store.toggle(&station("b", "Beta Radio")).unwrap();

        let reloaded = FavoriteStore::load(&path);
        assert_eq!(reloaded.ids(), store.ids());
        let names: Vec<&str> = reloaded.stations().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha FM", "Gamma"]);
    }

    #[test]
    fn test_file_uses_directory_field_names() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("favorites.json");
        let mut store = FavoriteStore::load(&path);
        store.toggle(&station("abc", "Radio X")).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw[0]["stationuuid"], "abc");
        assert_eq!(raw[0]["url_resolved"], "http://stream.example/abc");
    }

    #[test]
    fn test_corrupt_file_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("favorites.json");
        std::fs::write(&path, "{ definitely not an array").unwrap();
        let store = FavoriteStore::load(&path);
        assert!(store.is_empty());
    }

    #[test]
    fn test_duplicate_ids_are_collapsed_on_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("favorites.json");
        let list = vec![station("a", "One"), station("a", "One again"), station("", "No id")];
        std::fs::write(&path, serde_json::to_string(&list).unwrap()).unwrap();
        let store = FavoriteStore::load(&path);
        assert_eq!(store.len(), 1);
        assert_eq!(store.stations()[0].name, "One");
    }

    #[test]
    fn test_save_error_is_reported() {
        let dir = TempDir::new().unwrap();
        // the "file" path is a directory, so writing must fail
        let mut store = FavoriteStore::load(dir.path());
        assert!(store.toggle(&station("a", "One")).is_err());
        assert!(store.contains("a"));
    }

    #[test]
    fn test_station_without_id_is_refused() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("favorites.json");
        let mut store = FavoriteStore::load(&path);
        assert!(store.toggle(&station("", "Nameless")).is_err());
        assert!(store.is_empty());
        assert!(!path.exists());
    }
}
