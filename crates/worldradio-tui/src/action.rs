//! Action enum: all user-initiated intents and internal events.

use worldradio_proto::model::Station;

/// Unique identifier for a focusable component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentId {
    Header,
    StationList,
    HelpOverlay,
}

/// Which base list the station table shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ViewMode {
    #[default]
    All,
    Favorites,
}

impl ViewMode {
    pub fn other(self) -> Self {
        match self {
            Self::All => Self::Favorites,
            Self::Favorites => Self::All,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::All => "all stations",
            Self::Favorites => "favorites",
        }
    }
}

/// All actions that can flow through the system.
/// Components produce Actions; the App dispatches them.
#[derive(Debug, Clone)]
pub enum Action {
    // ── Playback ─────────────────────────────────────────────────────────────
    Play(Station),
    Stop,
    TogglePause,
    Volume(f64),

    // ── Stations ─────────────────────────────────────────────────────────────
    ToggleFavorite(Station),
    SwitchView(ViewMode),
    Refresh,

    // ── Filter/search ────────────────────────────────────────────────────────
    OpenFilter,
    CloseFilter,
    FilterChanged(String),

    // ── UI ───────────────────────────────────────────────────────────────────
    ToggleHelp,
    CopyToClipboard(String),
    /// Replace the status line text.
    Status(String),

    // ── System ───────────────────────────────────────────────────────────────
    Quit,
    Noop,
}
