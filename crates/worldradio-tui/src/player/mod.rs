//! Player: thin state machine over a native media engine.
//!
//! The engine is driven through [`MediaEngine`]; its asynchronous reports come
//! back as [`EngineEvent`]s via [`Player::on_engine_event`]. Every state change
//! is pushed to the registered observers.

use std::panic::AssertUnwindSafe;

use tracing::{debug, error, info, warn};

use worldradio_proto::model::PlayerState;
use worldradio_proto::settings::{PlayerSettings, SettingsStore};


/// Commands the player needs from a native engine. Calls must not block;
/// failures that only show up later are reported as [`EngineEvent`]s.
pub trait MediaEngine: Send {
    fn load(&mut self, url: &str) -> anyhow::Result<()>;
    fn set_pause(&mut self, paused: bool) -> anyhow::Result<()>;
    fn stop(&mut self) -> anyhow::Result<()>;
    fn set_volume(&mut self, volume: u8) -> anyhow::Result<()>;
    fn shutdown(&mut self);
}

/// Unsolicited reports from the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Playing,
    Paused,
    Stopped,
    EndReached,
    Error(String),
}

#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    #[error("no stream URL")]
    EmptyUrl,

    #[error("invalid volume: {0}")]
    InvalidVolume(f64),

    #[error(transparent)]
    Engine(#[from] anyhow::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

pub type Observer = Box<dyn FnMut(PlayerState) -> anyhow::Result<()> + Send>;

pub struct Player {
    engine: Box<dyn MediaEngine>,
    settings: SettingsStore,
    state: PlayerState,
    volume: u8,
    current_url: Option<String>,
    observers: Vec<(ObserverId, Observer)>,
    next_observer_id: u64,
    /// Loads that replaced a live stream; mpv reports each replaced file with
    /// a `stop` end-file that must not be taken for a real stop.
    replaced_loads: u32,
}

impl Player {
    /// Build a player at `volume`, normally the value loaded from `settings`
    /// when the engine was started. Later changes are saved to `settings`.
    pub fn new(mut engine: Box<dyn MediaEngine>, settings: SettingsStore, volume: u8) -> Self {
        let volume = volume.min(100);
        if let Err(e) = engine.set_volume(volume) {
            warn!("player: initial volume not applied: {}", e);
        }
        info!("player: ready, volume={}", volume);
        Self {
            engine,
            settings,
            state: PlayerState::Idle,
            volume,
            current_url: None,
            observers: Vec::new(),
            next_observer_id: 1,
            replaced_loads: 0,
        }
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn current_url(&self) -> Option<&str> {
        self.current_url.as_deref()
    }

    /// Start `url`. Asking for the stream that is already loaded only
    /// resumes it if paused.
    pub fn play(&mut self, url: &str) -> Result<(), PlayerError> {
        let url = url.trim();
        if url.is_empty() {
            return Err(PlayerError::EmptyUrl);
        }

        if self.current_url.as_deref() == Some(url) {
            match self.state {
                PlayerState::Playing => {
                    debug!("player: {} already playing", url);
                    return Ok(());
                }
                PlayerState::Paused => return self.resume(),
                _ => {}
            }
        }

        let replacing = self.state.is_active();
        if let Err(e) = self.engine.load(url) {
            return Err(self.fail(e));
        }
        if replacing {
            self.replaced_loads += 1;
        }
        info!("player: play {}", url);
        self.current_url = Some(url.to_string());
        self.set_state(PlayerState::Playing);
        Ok(())
    }

    pub fn pause(&mut self) -> Result<(), PlayerError> {
        if self.state != PlayerState::Playing {
            return Ok(());
        }
        if let Err(e) = self.engine.set_pause(true) {
            return Err(self.fail(e));
        }
        self.set_state(PlayerState::Paused);
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), PlayerError> {
        if self.state != PlayerState::Paused {
            return Ok(());
        }
        if let Err(e) = self.engine.set_pause(false) {
            return Err(self.fail(e));
        }
        self.set_state(PlayerState::Playing);
        Ok(())
    }

    /// Pause when playing, resume when paused, otherwise nothing.
    pub fn toggle_pause(&mut self) -> Result<(), PlayerError> {
        match self.state {
            PlayerState::Playing => self.pause(),
            PlayerState::Paused => self.resume(),
            _ => Ok(()),
        }
    }

    /// Always lands in `Idle` with no stream loaded, whatever the engine says.
    pub fn stop(&mut self) {
        if self.current_url.is_some() {
            if let Err(e) = self.engine.stop() {
                warn!("player: engine stop failed: {}", e);
            }
        }
        self.current_url = None;
        self.replaced_loads = 0;
        info!("player: stopped");
        self.state = PlayerState::Idle;
        self.notify();
    }

    /// Clamp to 0-100, apply, and persist. Returns the applied volume.
    pub fn set_volume(&mut self, volume: f64) -> Result<u8, PlayerError> {
        if !volume.is_finite() {
            warn!("player: rejected volume {}", volume);
            return Err(PlayerError::InvalidVolume(volume));
        }
        let volume = volume.round().clamp(0.0, 100.0) as u8;
        if let Err(e) = self.engine.set_volume(volume) {
            return Err(self.fail(e));
        }
        self.volume = volume;
        if let Err(e) = self.settings.save(PlayerSettings { volume }) {
            warn!(
                "player: failed to save volume to {}: {}",
                self.settings.path().display(),
                e
            );
        }
        Ok(volume)
    }

    pub fn subscribe(&mut self, observer: Observer) -> ObserverId {
        let id = ObserverId(self.next_observer_id);
        self.next_observer_id += 1;
        self.observers.push((id, observer));
        id
    }

    /// Returns false when `id` was not registered.
    pub fn unsubscribe(&mut self, id: ObserverId) -> bool {
        let before = self.observers.len();
        self.observers.retain(|(oid, _)| *oid != id);
        self.observers.len() != before
    }

    pub fn on_engine_event(&mut self, event: EngineEvent) {
        if self.current_url.is_none() {
            debug!("player: ignoring {:?} with nothing loaded", event);
            return;
        }
        match event {
            EngineEvent::Playing => {
                if self.state == PlayerState::Paused {
                    self.set_state(PlayerState::Playing);
                }
            }
            EngineEvent::Paused => {
                if self.state == PlayerState::Playing {
                    self.set_state(PlayerState::Paused);
                }
            }
            EngineEvent::Stopped => {
                if self.replaced_loads > 0 {
                    self.replaced_loads -= 1;
                    debug!("player: previous stream unloaded");
                } else if self.state.is_active() {
                    self.set_state(PlayerState::Stopped);
                }
            }
            EngineEvent::EndReached => {
                if self.state.is_active() {
                    info!("player: stream ended");
                    self.set_state(PlayerState::Ended);
                }
            }
            EngineEvent::Error(reason) => {
                warn!("player: engine error: {}", reason);
                self.set_state(PlayerState::Error);
            }
        }
    }

    pub fn shutdown(&mut self) {
        info!("player: shutting down engine");
        self.engine.shutdown();
    }

    fn fail(&mut self, e: anyhow::Error) -> PlayerError {
        error!("player: engine failure: {}", e);
        self.set_state(PlayerState::Error);
        PlayerError::Engine(e)
    }

    fn set_state(&mut self, state: PlayerState) {
        if self.state == state {
            return;
        }
        debug!("player: {} -> {}", self.state.label(), state.label());
        self.state = state;
        self.notify();
    }

    fn notify(&mut self) {
        let state = self.state;
        for (id, observer) in self.observers.iter_mut() {
            match std::panic::catch_unwind(AssertUnwindSafe(|| observer(state))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!("player: observer {:?} failed: {}", id, e),
                Err(_) => error!("player: observer {:?} panicked", id),
            }
        }
    }
}
