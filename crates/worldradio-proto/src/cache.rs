//! Time-based on-disk cache for raw directory responses.
//!
//! One file per key, `{dir}/{key}.json`. Freshness is judged from the file's
//! modification time, so a restart keeps whatever is still fresh.

use std::path::{Path, PathBuf};
use sha2::{Digest, Sha256};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Body stored under `key` if it is younger than the ttl.
    pub fn load_fresh(&self, key: &str) -> Option<String> {
        let path = self.entry_path(key);
        let modified = std::fs::metadata(&path).and_then(|m| m.modified()).ok()?;
        // A clock that went backwards leaves the entry looking brand new.
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);

        if age >= self.ttl {
            debug!(
                "cache: {} expired (age {}s, ttl {}s)",
                key,
                age.as_secs(),
                self.ttl.as_secs()
            );
            return None;
        }

        match std::fs::read_to_string(&path) {
            Ok(body) => {
                debug!("cache: hit {} (age {}s)", key, age.as_secs());
                Some(body)
            }
            Err(e) => {
                warn!("cache: failed to read {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn store(&self, key: &str, body: &str) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.entry_path(key);
        std::fs::write(&path, body)?;
        debug!("cache: stored {} ({} bytes)", path.display(), body.len());
        Ok(())
    }

    pub fn invalidate(&self, key: &str) {
        let path = self.entry_path(key);
        match std::fs::remove_file(&path) {
            Ok(()) => debug!("cache: removed {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("cache: failed to remove {}: {}", path.display(), e),
        }
    }
}

/// Turn arbitrary query text into a file-name-safe key fragment.
pub fn sanitize_key(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.trim().to_lowercase().chars() {
        if ch.is_alphanumeric() {
            out.push(ch);
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    out.trim_matches('_').to_string()
}

/// Key fragment for free query text: the readable sanitized form plus a short
/// digest of the raw text, so inputs that sanitize alike stay apart.
pub fn query_fragment(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    let short = hex::encode(&digest[..4]);
    match sanitize_key(raw) {
        readable if readable.is_empty() => short,
        readable => format!("{}_{}", readable, short),
    }
}
