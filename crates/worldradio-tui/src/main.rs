mod action;
mod app;
mod app_state;
mod component;
mod components;
mod mpv;
mod player;
mod theme;
mod widgets;

use tokio::sync::mpsc;

use worldradio_proto::config::Config;
use worldradio_proto::directory::DirectoryClient;
use worldradio_proto::favorites::FavoriteStore;
use worldradio_proto::settings::SettingsStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = worldradio_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let log_path = data_dir.join("worldradio.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // Allow RUST_LOG override; keep connection-level DEBUG from the HTTP
    // client internals out of the log.
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "debug,hyper_util=warn,reqwest=warn,hyper=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("worldradio log: {}", log_path.display());
    tracing::info!("worldradio starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("config: {} unusable, using defaults: {}", Config::config_path().display(), e);
        Config::default()
    });

    // ── Playback ─────────────────────────────────────────────────────────────
    let default_volume = config.player.default_volume.min(100);
    let settings = SettingsStore::new(config.paths.player_settings_file.clone());
    let volume = settings.load(default_volume).volume;

    let (mpv_tx, mpv_rx) = mpsc::channel::<mpv::MpvEvent>(256);
    let engine = match mpv::MpvEngine::start(volume, mpv_tx).await {
        Ok(engine) => engine,
        Err(e) => {
            tracing::error!("mpv: {}", e);
            eprintln!("worldradio: cannot start mpv: {}", e);
            return Err(e);
        }
    };
    let player = player::Player::new(Box::new(engine), settings, volume);

    // ── Directory + favorites ────────────────────────────────────────────────
    let client = DirectoryClient::new(&config)?;
    let favorites = FavoriteStore::load(config.paths.favorites_file.clone());
    tracing::info!(
        "directory: {}, {} favorites",
        client.base_url(),
        favorites.len()
    );

    // ── Run TUI ──────────────────────────────────────────────────────────────
    let app = app::App::new(player, client, favorites);
    app.run(mpv_rx).await?;

    Ok(())
}
