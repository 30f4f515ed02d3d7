//! App: component-based event loop.
//!
//! - `App` owns the components, `AppState`, the `Player` and the favorites.
//! - A `tokio::mpsc` channel carries `AppMessage`s in from the terminal
//!   reader, the fetch worker, the player observer and the mpv event pump.
//! - The loop draws when something changed, then awaits the next message.
//! - Components return `Vec<Action>`; the App applies each one, then lets
//!   the components react to it.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use ratatui::crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    Terminal,
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use worldradio_proto::directory::{DirectoryClient, DirectoryQuery};
use worldradio_proto::favorites::FavoriteStore;
use worldradio_proto::model::{PlayerState, Station};

use crate::{
    action::{Action, ComponentId},
    app_state::AppState,
    component::Component,
    components::{header::Header, help_overlay::HelpOverlay, station_list::StationList},
    mpv::{translate_event, MpvEvent},
    player::Player,
    widgets::{
        status_bar::{self, InputMode},
        toast::{Severity, ToastManager},
    },
};

const VOLUME_STEP: f64 = 5.0;

// ── Internal event bus ────────────────────────────────────────────────────────

pub enum AppMessage {
    Event(Event),
    /// The fetch worker finished; `stations` is empty when nothing came back.
    StationsFetched {
        label: String,
        stations: Vec<Station>,
    },
    /// Pushed by the player observer on every state change.
    PlayerState(PlayerState),
    Mpv(MpvEvent),
}

pub struct App {
    state: AppState,
    player: Player,
    client: Arc<DirectoryClient>,
    query: DirectoryQuery,
    favorites: FavoriteStore,

    header: Header,
    station_list: StationList,
    help_overlay: HelpOverlay,
    toast: ToastManager,
    list_area: Rect,

    tx: Option<mpsc::Sender<AppMessage>>,
    refresh_in_flight: bool,
    should_quit: bool,
}

impl App {
    pub fn new(player: Player, client: DirectoryClient, favorites: FavoriteStore) -> Self {
        let query = client.popular();
        let mut state = AppState::new(player.volume());
        state.player_state = player.state();
        state.favorites = favorites.stations().to_vec();
        state.favorite_ids = favorites.ids().clone();

        Self {
            state,
            player,
            client: Arc::new(client),
            query,
            favorites,
            header: Header::new(),
            station_list: StationList::new(),
            help_overlay: HelpOverlay::new(),
            toast: ToastManager::new(),
            list_area: Rect::default(),
            tx: None,
            refresh_in_flight: false,
            should_quit: false,
        }
    }

    pub async fn run(mut self, mut mpv_rx: mpsc::Receiver<MpvEvent>) -> anyhow::Result<()> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;
        debug!("run(): terminal ready, size={:?}", terminal.size());

        let (tx, mut rx) = mpsc::channel::<AppMessage>(1024);
        self.tx = Some(tx.clone());

        // ── Player observer: state changes come back through the bus ─────────
        let observer_tx = tx.clone();
        self.player.subscribe(Box::new(move |state| {
            observer_tx
                .try_send(AppMessage::PlayerState(state))
                .map_err(|e| anyhow::anyhow!("ui channel: {}", e))
        }));

        // ── Background task: keyboard/mouse events ────────────────────────────
        let event_tx = tx.clone();
        tokio::task::spawn_blocking(move || loop {
            match event::read() {
                Ok(ev) => {
                    if event_tx.blocking_send(AppMessage::Event(ev)).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        });

        // ── Background task: mpv events → AppMessage ─────────────────────────
        let mpv_tx = tx.clone();
        tokio::spawn(async move {
            while let Some(evt) = mpv_rx.recv().await {
                if mpv_tx.send(AppMessage::Mpv(evt)).await.is_err() {
                    break;
                }
            }
            debug!("mpv event pump exiting");
        });

        self.station_list.sync_stations(&self.state);
        self.dispatch(Action::Refresh);

        // Toast expiry + spinner animation
        let mut toast_tick = tokio::time::interval(Duration::from_millis(100));
        toast_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut needs_redraw = true;
        let result: anyhow::Result<()> = async {
            loop {
                if needs_redraw {
                    terminal.draw(|f| self.draw(f))?;
                }
                needs_redraw = false;

                if self.should_quit {
                    break;
                }

                tokio::select! {
                    Some(msg) = rx.recv() => {
                        needs_redraw = self.handle_message(msg);
                        // drain whatever queued up while we were busy
                        while let Ok(next) = rx.try_recv() {
                            needs_redraw |= self.handle_message(next);
                        }
                    }

                    _ = toast_tick.tick() => {
                        if !self.toast.is_empty() {
                            self.toast.tick();
                            needs_redraw = true;
                        }
                    }
                }
            }
            Ok(())
        }
        .await;

        // ── Teardown ──────────────────────────────────────────────────────────
        self.player.shutdown();
        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;
        info!("worldradio exiting");

        result
    }

    /// Returns true when the screen needs a redraw.
    fn handle_message(&mut self, msg: AppMessage) -> bool {
        match msg {
            AppMessage::Event(Event::Key(key)) => {
                for action in self.handle_key(key) {
                    self.dispatch(action);
                }
                true
            }
            AppMessage::Event(Event::Mouse(mouse)) => {
                let actions = self.handle_mouse(mouse);
                let redraw = !matches!(mouse.kind, MouseEventKind::Moved);
                for action in actions {
                    self.dispatch(action);
                }
                redraw
            }
            AppMessage::Event(Event::Resize(..)) => true,
            AppMessage::Event(_) => false,
            AppMessage::StationsFetched { label, stations } => {
                self.on_stations_fetched(label, stations);
                true
            }
            AppMessage::PlayerState(state) => {
                self.on_player_state(state);
                true
            }
            AppMessage::Mpv(evt) => {
                if let Some(engine_event) = translate_event(&evt) {
                    debug!("mpv: {:?}", engine_event);
                    self.player.on_engine_event(engine_event);
                }
                false
            }
        }
    }

    // ── Keyboard handling ─────────────────────────────────────────────────────

    fn handle_key(&mut self, key: KeyEvent) -> Vec<Action> {
        if key.kind == KeyEventKind::Release {
            return vec![];
        }
        if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
            return vec![Action::Quit];
        }

        if self.help_overlay.visible {
            return self.help_overlay.handle_key(key, &self.state);
        }

        let view_switch = Action::SwitchView(self.state.view_mode.other());
        if self.state.input_mode == InputMode::Search {
            if matches!(key.code, KeyCode::Tab | KeyCode::BackTab) {
                return vec![Action::CloseFilter, view_switch];
            }
            return self.station_list.handle_key(key, &self.state);
        }

        let volume = f64::from(self.state.volume);
        match key.code {
            KeyCode::Char('q') => vec![Action::Quit],
            KeyCode::Char('?') => vec![Action::ToggleHelp],
            KeyCode::Tab | KeyCode::BackTab => vec![view_switch],
            KeyCode::Char('r') => vec![Action::Refresh],
            KeyCode::Right | KeyCode::Char('+') | KeyCode::Char('=') => {
                vec![Action::Volume(volume + VOLUME_STEP)]
            }
            KeyCode::Left | KeyCode::Char('-') => vec![Action::Volume(volume - VOLUME_STEP)],
            _ => self.station_list.handle_key(key, &self.state),
        }
    }

    // ── Mouse handling ────────────────────────────────────────────────────────

    fn handle_mouse(&mut self, event: MouseEvent) -> Vec<Action> {
        if self.help_overlay.visible {
            return vec![];
        }
        let r = self.list_area;
        let inside = r.width > 0
            && r.height > 0
            && event.column >= r.x
            && event.column < r.x + r.width
            && event.row >= r.y
            && event.row < r.y + r.height;
        if !inside {
            return vec![];
        }
        self.station_list.handle_mouse(event, r, &self.state)
    }

    // ── Action dispatcher ─────────────────────────────────────────────────────

    fn dispatch(&mut self, action: Action) {
        match &action {
            Action::Noop => return,
            Action::FilterChanged(_) => {}
            _ => debug!("dispatch: {:?}", action),
        }

        // App first, so components see the updated state
        self.apply_action(action.clone());

        let secondary: Vec<(ComponentId, Action)> = {
            let s = &self.state;
            let mut out = Vec::new();
            let components: [&mut dyn Component; 3] = [
                &mut self.header,
                &mut self.station_list,
                &mut self.help_overlay,
            ];
            for c in components {
                let id = c.id();
                out.extend(c.on_action(&action, s).into_iter().map(|a| (id, a)));
            }
            out
        };
        for (id, a) in secondary {
            debug!("dispatch: {:?} follow-up {:?}", id, a);
            self.apply_action(a);
        }
    }

    fn apply_action(&mut self, action: Action) {
        match action {
            // ── Playback ──────────────────────────────────────────────────────
            Action::Play(station) => self.play(station),
            Action::Stop => self.player.stop(),
            Action::TogglePause => {
                if !self.player.state().is_active() {
                    self.state.status = "select a station first".to_string();
                } else if let Err(e) = self.player.toggle_pause() {
                    self.toast.error(format!("pause failed: {}", e));
                }
            }
            Action::Volume(volume) => match self.player.set_volume(volume) {
                Ok(applied) => self.state.volume = applied,
                Err(e) => self.toast.warning(e.to_string()),
            },

            // ── Stations ──────────────────────────────────────────────────────
            Action::ToggleFavorite(station) => self.toggle_favorite(&station),
            Action::SwitchView(mode) => {
                self.state.view_mode = mode;
                self.state.status = format!("switched to {} view", mode.label());
            }
            Action::Refresh => self.start_refresh(),

            // ── Filter ────────────────────────────────────────────────────────
            Action::OpenFilter => self.state.input_mode = InputMode::Search,
            Action::CloseFilter => self.state.input_mode = InputMode::Normal,
            Action::FilterChanged(_) => self.update_count_status(),

            // ── UI ────────────────────────────────────────────────────────────
            Action::ToggleHelp => {}
            Action::CopyToClipboard(text) => {
                match arboard::Clipboard::new().and_then(|mut cb| cb.set_text(text.clone())) {
                    Ok(()) => {
                        let display = if text.chars().count() > 40 {
                            format!("{}…", text.chars().take(40).collect::<String>())
                        } else {
                            text
                        };
                        self.toast.success(format!("copied: {}", display));
                    }
                    Err(e) => {
                        warn!("clipboard error: {}", e);
                        self.toast.error(format!("clipboard error: {}", e));
                    }
                }
            }
            Action::Status(msg) => self.state.status = msg,

            Action::Quit => self.should_quit = true,
            Action::Noop => {}
        }
    }

    fn play(&mut self, station: Station) {
        let Some(url) = station.stream_url().map(str::to_string) else {
            self.state.status = "no stream URL".to_string();
            self.toast.warning(format!("{}: no stream URL", station.name));
            return;
        };
        info!("play: {} ({})", station.name, url);
        self.state.now_playing = Some(station);
        if let Err(e) = self.player.play(&url) {
            self.toast.error(format!("playback failed: {}", e));
        }
    }

    fn toggle_favorite(&mut self, station: &Station) {
        match self.favorites.toggle(station) {
            Ok(true) => {
                self.state.status = format!("favorited: {}", station.name);
                self.toast.success(format!("★ {}", station.name));
            }
            Ok(false) => {
                self.state.status = format!("unfavorited: {}", station.name);
                self.toast.info(format!("☆ {}", station.name));
            }
            Err(e) => {
                warn!("favorites: {}", e);
                self.toast.error(format!("favorites not saved: {}", e));
            }
        }
        self.state.favorites = self.favorites.stations().to_vec();
        self.state.favorite_ids = self.favorites.ids().clone();
    }

    // ── Directory fetch ───────────────────────────────────────────────────────

    /// Start the fetch worker unless one is already running.
    fn start_refresh(&mut self) {
        if self.refresh_in_flight {
            self.toast.warning("refresh already in progress");
            return;
        }
        let Some(tx) = self.tx.clone() else {
            return;
        };
        self.refresh_in_flight = true;
        self.state.loading = true;

        let label = self.query.describe();
        self.state.status = format!("loading {}…", label);
        self.toast.spinner(format!("fetching {}", label));

        let client = Arc::clone(&self.client);
        let query = self.query.clone();
        tokio::spawn(async move {
            let stations = client.fetch_playable(&query).await;
            let msg = AppMessage::StationsFetched { label, stations };
            if tx.send(msg).await.is_err() {
                debug!("fetch finished after the ui went away");
            }
        });
    }

    fn on_stations_fetched(&mut self, label: String, stations: Vec<Station>) {
        self.refresh_in_flight = false;
        self.state.loading = false;
        info!("fetched {} stations for {}", stations.len(), label);

        if stations.is_empty() && !self.state.stations.is_empty() {
            // nothing available right now; the previous list stays up
            self.toast.resolve_spinner(
                Severity::Warning,
                "no stations received, keeping previous list",
                Duration::from_secs(4),
            );
            self.update_count_status();
            return;
        }

        let count = stations.len();
        self.state.stations = stations;
        self.state.source_label = label;
        self.state.last_updated = Some(chrono::Local::now());
        self.station_list.sync_stations(&self.state);

        if count == 0 {
            self.toast.resolve_spinner(
                Severity::Warning,
                "no stations received",
                Duration::from_secs(4),
            );
        } else {
            self.toast.resolve_spinner(
                Severity::Success,
                format!("{} stations", count),
                Duration::from_secs(3),
            );
        }
        self.update_count_status();
    }

    fn update_count_status(&mut self) {
        let shown = self.station_list.list.len();
        self.state.status = if shown == 0 {
            "no stations to display".to_string()
        } else {
            format!("showing {} stations", shown)
        };
    }

    // ── Player feedback ───────────────────────────────────────────────────────

    fn on_player_state(&mut self, new: PlayerState) {
        let prev = self.state.player_state;
        self.state.player_state = new;
        let name = self.state.now_playing_name().unwrap_or("stream").to_string();

        self.state.status = match new {
            PlayerState::Playing if prev == PlayerState::Paused => format!("resumed: {}", name),
            PlayerState::Playing => format!("now playing: {}", name),
            PlayerState::Paused => "paused".to_string(),
            PlayerState::Idle | PlayerState::Stopped => {
                if new == PlayerState::Idle {
                    self.state.now_playing = None;
                }
                "stopped".to_string()
            }
            PlayerState::Ended => "playback ended".to_string(),
            PlayerState::Error => {
                self.toast.error(format!("playback error: {}", name));
                "playback error".to_string()
            }
        };
    }

    // ── Rendering ─────────────────────────────────────────────────────────────

    fn draw(&mut self, frame: &mut ratatui::Frame) {
        use crate::theme::C_BG;
        use ratatui::widgets::Block;
        let area = frame.area();

        frame.render_widget(
            Block::default().style(ratatui::style::Style::default().bg(C_BG)),
            area,
        );

        let outer = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(2),
                Constraint::Min(0),
                Constraint::Length(1),
                Constraint::Length(1),
            ])
            .split(area);

        self.header.draw(frame, outer[0], false, &self.state);

        self.list_area = outer[1];
        let focused = !self.help_overlay.visible;
        self.station_list
            .draw(frame, outer[1], focused, &self.state);

        status_bar::draw_status_line(frame, outer[2], &self.state.status, self.state.loading);
        status_bar::draw_keys_bar(frame, outer[3], self.state.input_mode);

        if self.help_overlay.visible {
            self.help_overlay.draw(frame, area, true, &self.state);
        }

        self.toast.draw(frame, area);
    }
}
