/// mpv IPC driver with separated reader/writer tasks.
///
/// ```text
///   MpvDriver::spawn_and_connect()
///         │
///         ├── writer_task   ← receives PendingRequest via mpsc, writes JSON lines
///         └── reader_task   ← reads JSON lines from the socket
///                                ├── response (has request_id) → matched oneshot::Sender
///                                └── event / property-change   → event_tx channel
/// ```
///
/// `MpvEngine` wraps the handle behind the [`MediaEngine`] seam used by the
/// player; `translate_event` turns raw mpv events into [`EngineEvent`]s.
///
/// Platform notes:
/// - Unix:   Unix domain sockets
/// - Windows: Named pipes  \\.\pipe\<name>
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

use worldradio_proto::platform;

use crate::player::{EngineEvent, MediaEngine};

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

const IPC_TIMEOUT: Duration = Duration::from_secs(5);

/// Fixed observe_property IDs, matched in property-change events.
pub const OBS_CORE_IDLE: u64 = 1;
pub const OBS_PAUSE: u64 = 2;

type ReplyTx = oneshot::Sender<anyhow::Result<Value>>;
type PendingMap = Arc<Mutex<HashMap<u64, ReplyTx>>>;

struct PendingRequest {
    req_id: u64,
    payload: String, // serialised JSON line (already has '\n')
    reply: ReplyTx,
}

impl PendingRequest {
    fn new(command: Value) -> anyhow::Result<(Self, oneshot::Receiver<anyhow::Result<Value>>)> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let mut payload = serde_json::to_string(&json!({
            "command": command,
            "request_id": req_id,
        }))?;
        payload.push('\n');
        let (reply, reply_rx) = oneshot::channel();
        Ok((
            Self {
                req_id,
                payload,
                reply,
            },
            reply_rx,
        ))
    }
}

/// An mpv event / property-change that arrived unsolicited (no request_id).
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    /// Returns `Some((obs_id, data))` if this is a property-change event.
    pub fn as_property_change(&self) -> Option<(u64, &Value)> {
        if self.raw.get("event")?.as_str()? == "property-change" {
            let id = self.raw.get("id")?.as_u64()?;
            let data = self.raw.get("data").unwrap_or(&Value::Null);
            Some((id, data))
        } else {
            None
        }
    }

    /// Returns the event name, e.g. "end-file", "start-file", "file-loaded".
    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }
}

/// Map a raw mpv event onto the player's event vocabulary.
///
/// `core-idle` going true is not reported: mpv is also idle while paused or
/// buffering, and the end of a file arrives separately as `end-file`.
pub fn translate_event(evt: &MpvEvent) -> Option<EngineEvent> {
    if let Some((obs_id, data)) = evt.as_property_change() {
        return match (obs_id, data.as_bool()) {
            (OBS_PAUSE, Some(true)) => Some(EngineEvent::Paused),
            (OBS_PAUSE, Some(false)) => Some(EngineEvent::Playing),
            (OBS_CORE_IDLE, Some(false)) => Some(EngineEvent::Playing),
            _ => None,
        };
    }

    match evt.event_name() {
        Some("end-file") => {
            let reason = evt
                .raw
                .get("reason")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            match reason {
                "eof" => Some(EngineEvent::EndReached),
                "stop" => Some(EngineEvent::Stopped),
                "error" | "network" => {
                    let detail = evt
                        .raw
                        .get("file_error")
                        .and_then(|v| v.as_str())
                        .unwrap_or(reason);
                    Some(EngineEvent::Error(detail.to_string()))
                }
                // quit / redirect carry no state change
                _ => None,
            }
        }
        _ => None,
    }
}

/// Cloneable handle to the mpv writer task.
#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<PendingRequest>,
}

impl MpvHandle {
    /// Send `command` and await mpv's reply.
    pub async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let (req, reply_rx) = PendingRequest::new(command)?;
        let req_id = req.req_id;
        self.tx
            .send(req)
            .await
            .map_err(|_| anyhow::anyhow!("mpv writer task gone"))?;

        tokio::time::timeout(IPC_TIMEOUT, reply_rx)
            .await
            .map_err(|_| anyhow::anyhow!("mpv IPC timeout for req={}", req_id))?
            .map_err(|_| anyhow::anyhow!("mpv reply channel dropped req={}", req_id))?
    }

    /// Queue `command` without waiting for the reply. Fails only when the
    /// command cannot be queued; an error reply is logged.
    pub fn post(&self, command: Value) -> anyhow::Result<()> {
        let (req, reply_rx) = PendingRequest::new(command)?;
        let req_id = req.req_id;
        self.tx.try_send(req).map_err(|e| match e {
            TrySendError::Full(_) => anyhow::anyhow!("mpv command queue full"),
            TrySendError::Closed(_) => anyhow::anyhow!("mpv writer task gone"),
        })?;

        tokio::spawn(async move {
            match tokio::time::timeout(IPC_TIMEOUT, reply_rx).await {
                Ok(Ok(Ok(_))) => {}
                Ok(Ok(Err(e))) => warn!("mpv: req={} failed: {}", req_id, e),
                Ok(Err(_)) => debug!("mpv: reply channel dropped req={}", req_id),
                Err(_) => warn!("mpv: IPC timeout for req={}", req_id),
            }
        });
        Ok(())
    }

    /// Register the property observers `translate_event` relies on.
    /// Must be called after every fresh connection.
    pub async fn observe_properties(&self) {
        let props = [(OBS_CORE_IDLE, "core-idle"), (OBS_PAUSE, "pause")];
        for (id, name) in &props {
            match self.send(json!(["observe_property", id, name])).await {
                Ok(_) => debug!("mpv: observe_property id={} name={}", id, name),
                Err(e) => warn!("mpv: observe_property {} failed: {}", name, e),
            }
        }
    }
}

/// Owns the mpv child process.
pub struct MpvDriver {
    pub socket_name: String,
    process: Option<tokio::process::Child>,
    initial_volume: u8,
}

impl MpvDriver {
    pub fn new(initial_volume: u8) -> Self {
        Self {
            socket_name: platform::mpv_socket_name(),
            process: None,
            initial_volume: initial_volume.min(100),
        }
    }

    /// Kill the process without waiting for it to exit.
    pub fn kill_now(&mut self) {
        if let Some(mut p) = self.process.take() {
            if let Err(e) = p.start_kill() {
                debug!("mpv: kill failed: {}", e);
            }
        }
        #[cfg(unix)]
        {
            let _ = std::fs::remove_file(&self.socket_name);
        }
    }

    fn spawn_process(&mut self) -> anyhow::Result<()> {
        self.kill_now();

        let mpv_binary = platform::find_mpv_binary().ok_or_else(|| {
            anyhow::anyhow!(
                "{} not found beside the executable or on PATH",
                platform::mpv_binary_name()
            )
        })?;

        let data_dir = platform::data_dir();
        std::fs::create_dir_all(&data_dir)?;
        let stderr_path = data_dir.join("mpv-stderr.log");
        let stderr_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&stderr_path)?;
        info!("mpv: logging stderr to {:?}", stderr_path);

        let child = tokio::process::Command::new(&mpv_binary)
            .arg("--no-video")
            .arg("--idle=yes")
            .arg(platform::mpv_socket_arg())
            .arg("--quiet")
            .arg(format!("--volume={}", self.initial_volume))
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(stderr_file)
            .kill_on_drop(true)
            .spawn()?;
        info!("mpv: spawned {:?} pid={:?}", mpv_binary, child.id());
        self.process = Some(child);
        Ok(())
    }

    #[cfg(unix)]
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        let socket_path = std::path::PathBuf::from(&self.socket_name);
        self.spawn_process()?;

        // Wait for socket to appear
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            anyhow::bail!("mpv IPC socket did not appear");
        }

        let stream = UnixStream::connect(&socket_path).await?;
        info!("mpv: connected to IPC socket");
        let (read_half, write_half) = stream.into_split();
        Ok(start_io_tasks(read_half, write_half, event_tx))
    }

    #[cfg(windows)]
    pub async fn spawn_and_connect(
        &mut self,
        event_tx: mpsc::Sender<MpvEvent>,
    ) -> anyhow::Result<MpvHandle> {
        self.spawn_process()?;

        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if let Ok(client) = ClientOptions::new().open(&pipe_path) {
                info!("mpv: connected to named pipe");
                let (read_half, write_half) = tokio::io::split(client);
                return Ok(start_io_tasks(read_half, write_half, event_tx));
            }
        }
        anyhow::bail!("mpv named pipe did not appear")
    }
}

fn start_io_tasks<R, W>(read_half: R, write_half: W, event_tx: mpsc::Sender<MpvEvent>) -> MpvHandle
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    // req_id → reply channel. Writer inserts, reader resolves.
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);

    tokio::spawn(writer_task(write_half, cmd_rx, pending.clone()));
    tokio::spawn(reader_task(BufReader::new(read_half), pending, event_tx));

    MpvHandle { tx: cmd_tx }
}

async fn fail_all(pending: &PendingMap, reason: &str) {
    let mut map = pending.lock().await;
    for (_, tx) in map.drain() {
        let _ = tx.send(Err(anyhow::anyhow!("{}", reason)));
    }
}

async fn reader_task<R>(
    mut reader: BufReader<R>,
    pending: PendingMap,
    event_tx: mpsc::Sender<MpvEvent>,
) where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                fail_all(&pending, "mpv IPC connection closed").await;
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                if let Some(req_id) = val.get("request_id").and_then(|v| v.as_u64()) {
                    let mut map = pending.lock().await;
                    if let Some(tx) = map.remove(&req_id) {
                        let result = if val["error"].as_str() == Some("success") {
                            Ok(val)
                        } else {
                            let err = val["error"].as_str().unwrap_or("unknown error");
                            Err(anyhow::anyhow!("mpv error: {}", err))
                        };
                        let _ = tx.send(result);
                    } else {
                        debug!("mpv reader: response for unknown req={}", req_id);
                    }
                } else {
                    debug!("mpv reader: event {}", trimmed);
                    if event_tx.send(MpvEvent { raw: val }).await.is_err() {
                        debug!("mpv reader: event receiver gone");
                    }
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                fail_all(&pending, "mpv IPC read error").await;
                break;
            }
        }
    }
}

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, pending: PendingMap)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // Register reply channel before writing so reader can match it
        pending.lock().await.insert(req.req_id, req.reply);
        debug!("mpv writer: req={} {}", req.req_id, req.payload.trim());
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            if let Some(tx) = pending.lock().await.remove(&req.req_id) {
                let _ = tx.send(Err(anyhow::anyhow!("mpv write error: {}", e)));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}

/// mpv behind the player's engine seam.
pub struct MpvEngine {
    driver: MpvDriver,
    handle: MpvHandle,
}

impl MpvEngine {
    /// Spawn mpv at `volume`, connect, and start forwarding events to `event_tx`.
    pub async fn start(volume: u8, event_tx: mpsc::Sender<MpvEvent>) -> anyhow::Result<Self> {
        let mut driver = MpvDriver::new(volume);
        let handle = driver.spawn_and_connect(event_tx).await?;
        handle.observe_properties().await;
        Ok(Self { driver, handle })
    }
}

impl MediaEngine for MpvEngine {
    fn load(&mut self, url: &str) -> anyhow::Result<()> {
        // mpv keeps the pause flag across files
        self.handle.post(json!(["set_property", "pause", false]))?;
        self.handle.post(json!(["loadfile", url, "replace"]))
    }

    fn set_pause(&mut self, paused: bool) -> anyhow::Result<()> {
        self.handle.post(json!(["set_property", "pause", paused]))
    }

    fn stop(&mut self) -> anyhow::Result<()> {
        self.handle.post(json!(["stop"]))
    }

    fn set_volume(&mut self, volume: u8) -> anyhow::Result<()> {
        self.handle
            .post(json!(["set_property", "volume", volume.min(100)]))
    }

    fn shutdown(&mut self) {
        if let Err(e) = self.handle.post(json!(["quit"])) {
            debug!("mpv: quit not sent: {}", e);
        }
        self.driver.kill_now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(raw: Value) -> MpvEvent {
        MpvEvent { raw }
    }

    #[test]
    fn test_pause_property_changes() {
        let paused = event(json!({"event":"property-change","id":OBS_PAUSE,"name":"pause","data":true}));
        let resumed = event(json!({"event":"property-change","id":OBS_PAUSE,"name":"pause","data":false}));
        assert_eq!(translate_event(&paused), Some(EngineEvent::Paused));
        assert_eq!(translate_event(&resumed), Some(EngineEvent::Playing));
    }

    #[test]
    fn test_core_idle_only_reports_start() {
        let busy = event(json!({"event":"property-change","id":OBS_CORE_IDLE,"data":false}));
        let idle = event(json!({"event":"property-change","id":OBS_CORE_IDLE,"data":true}));
        assert_eq!(translate_event(&busy), Some(EngineEvent::Playing));
        assert_eq!(translate_event(&idle), None);
    }

    #[test]
    fn test_end_file_reasons() {
        let eof = event(json!({"event":"end-file","reason":"eof"}));
        let stop = event(json!({"event":"end-file","reason":"stop"}));
        let err = event(json!({"event":"end-file","reason":"error","file_error":"loading failed"}));
        let net = event(json!({"event":"end-file","reason":"network"}));
        let quit = event(json!({"event":"end-file","reason":"quit"}));
        assert_eq!(translate_event(&eof), Some(EngineEvent::EndReached));
        assert_eq!(translate_event(&stop), Some(EngineEvent::Stopped));
        assert_eq!(
            translate_event(&err),
            Some(EngineEvent::Error("loading failed".into()))
        );
        assert_eq!(translate_event(&net), Some(EngineEvent::Error("network".into())));
        assert_eq!(translate_event(&quit), None);
    }

    #[test]
    fn test_unrelated_events_ignored() {
        assert_eq!(translate_event(&event(json!({"event":"file-loaded"}))), None);
        assert_eq!(
            translate_event(&event(json!({"event":"property-change","id":42,"data":true}))),
            None
        );
    }

    #[tokio::test]
    async fn test_reader_routes_replies_and_events() {
        let (client, server) = tokio::io::duplex(4096);
        let (read_half, write_half) = tokio::io::split(client);
        let (server_read, mut server_write) = tokio::io::split(server);
        let (event_tx, mut event_rx) = mpsc::channel(8);
        let handle = start_io_tasks(read_half, write_half, event_tx);

        let reply = tokio::spawn({
            let handle = handle.clone();
            async move { handle.send(json!(["get_property", "volume"])).await }
        });

        // Read the request line and answer it, with an event in between.
        let mut reader = BufReader::new(server_read);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        let req: Value = serde_json::from_str(line.trim()).unwrap();
        let req_id = req["request_id"].as_u64().unwrap();
        assert_eq!(req["command"], json!(["get_property", "volume"]));

        let out = format!(
            "{}\n{}\n",
            json!({"event":"end-file","reason":"eof"}),
            json!({"request_id":req_id,"error":"success","data":70.0})
        );
        server_write.write_all(out.as_bytes()).await.unwrap();

        let value = reply.await.unwrap().unwrap();
        assert_eq!(value["data"], json!(70.0));
        let evt = event_rx.recv().await.unwrap();
        assert_eq!(translate_event(&evt), Some(EngineEvent::EndReached));
    }

    #[tokio::test]
    async fn test_error_reply_becomes_err() {
        let (client, server) = tokio::io::duplex(4096);
        let (read_half, write_half) = tokio::io::split(client);
        let (server_read, mut server_write) = tokio::io::split(server);
        let (event_tx, _event_rx) = mpsc::channel(8);
        let handle = start_io_tasks(read_half, write_half, event_tx);

        let reply = tokio::spawn({
            let handle = handle.clone();
            async move { handle.send(json!(["loadfile", "nope://"])).await }
        });

        let mut reader = BufReader::new(server_read);
        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        let req: Value = serde_json::from_str(line.trim()).unwrap();
        let out = format!(
            "{}\n",
            json!({"request_id":req["request_id"],"error":"invalid parameter"})
        );
        server_write.write_all(out.as_bytes()).await.unwrap();

        let err = reply.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("invalid parameter"));
    }
}
