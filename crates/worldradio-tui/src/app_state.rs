//! AppState: shared read-only data passed to all components during render/event.
//!
//! Components read this but never mutate it.
//! The App event loop is the only thing that writes to AppState.

use std::collections::HashSet;

use worldradio_proto::model::{PlayerState, Station};

use crate::action::ViewMode;
use crate::widgets::status_bar::InputMode;

pub struct AppState {
    // ── Directory ───────────────────────────────────────────────────────────
    /// Last fetched list, already stripped of unplayable records.
    pub stations: Vec<Station>,
    /// What the last fetch asked for, e.g. "popular stations".
    pub source_label: String,
    pub loading: bool,
    pub last_updated: Option<chrono::DateTime<chrono::Local>>,

    // ── Favorites ───────────────────────────────────────────────────────────
    pub favorites: Vec<Station>,
    pub favorite_ids: HashSet<String>,

    // ── View ────────────────────────────────────────────────────────────────
    pub view_mode: ViewMode,
    pub input_mode: InputMode,
    pub status: String,

    // ── Player ──────────────────────────────────────────────────────────────
    pub player_state: PlayerState,
    pub volume: u8,
    /// Station handed to the player last; cleared on stop.
    pub now_playing: Option<Station>,
}

impl AppState {
    pub fn new(volume: u8) -> Self {
        Self {
            stations: Vec::new(),
            source_label: String::new(),
            loading: false,
            last_updated: None,
            favorites: Vec::new(),
            favorite_ids: HashSet::new(),
            view_mode: ViewMode::All,
            input_mode: InputMode::Normal,
            status: String::new(),
            player_state: PlayerState::Idle,
            volume,
            now_playing: None,
        }
    }

    /// The list the current view filters from.
    pub fn base_list(&self) -> &[Station] {
        match self.view_mode {
            ViewMode::All => &self.stations,
            ViewMode::Favorites => &self.favorites,
        }
    }

    pub fn is_favorite(&self, station: &Station) -> bool {
        self.favorite_ids.contains(&station.id)
    }

    /// True when `station` is the one the player was last asked to play.
    pub fn is_current(&self, station: &Station) -> bool {
        self.now_playing
            .as_ref()
            .is_some_and(|np| np.id == station.id && np.stream_url() == station.stream_url())
    }

    pub fn now_playing_name(&self) -> Option<&str> {
        self.now_playing.as_ref().map(|s| s.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn station(id: &str, name: &str) -> Station {
        Station {
            id: id.into(),
            name: name.into(),
            url_resolved: format!("http://stream.example/{}", id),
            ..Station::default()
        }
    }

    #[test]
    fn test_base_list_follows_view_mode() {
        let mut state = AppState::new(70);
        state.stations = vec![station("a", "A"), station("b", "B")];
        state.favorites = vec![station("b", "B")];

        assert_eq!(state.base_list().len(), 2);
        state.view_mode = ViewMode::Favorites;
        assert_eq!(state.base_list().len(), 1);
        assert_eq!(state.base_list()[0].id, "b");
    }

    #[test]
    fn test_current_station_is_matched_by_identity_not_position() {
        let mut state = AppState::new(70);
        let a = station("a", "A");
        let b = station("b", "B");
        assert!(!state.is_current(&a));

        state.now_playing = Some(b.clone());
        assert!(state.is_current(&b));
        assert!(!state.is_current(&a));
        assert_eq!(state.now_playing_name(), Some("B"));
    }
}
