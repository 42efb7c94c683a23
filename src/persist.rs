//! Fire-and-forget persistence: the redacted session snapshot and the
//! item-template cache.
//!
//! Each file has one writer task.  Callers hand it the latest body through a
//! `watch` channel and never wait for the write; a body superseded before the
//! task got to it is skipped.  Files are replaced by rename, so readers see
//! either the previous or the next copy.  Failures are logged and dropped.
//! `close` drains the task before the process exits.

use crate::state::SessionState;
use bytes::Bytes;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Write `body` next to `path` and rename it into place.
async fn replace_file(path: &Path, body: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(dir).await?;
    }
    let mut tmp_name = path.file_name().map(OsString::from).unwrap_or_default();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);
    tokio::fs::write(&tmp, body).await?;
    tokio::fs::rename(&tmp, path).await
}

/// Single writer for one file, fed the latest body only.
#[derive(Debug)]
struct FileWriter {
    tx: watch::Sender<Bytes>,
    task: JoinHandle<()>,
}

impl FileWriter {
    fn spawn(path: PathBuf, first: Bytes) -> Self {
        let (tx, mut rx) = watch::channel(first);
        let task = tokio::spawn(async move {
            loop {
                let body = rx.borrow_and_update().clone();
                match replace_file(&path, &body).await {
                    Ok(()) => debug!("Wrote {} ({} bytes)", path.display(), body.len()),
                    Err(e) => warn!("Failed to write {}: {}", path.display(), e),
                }
                // Still yields a body sent just before the sender was dropped.
                if rx.changed().await.is_err() {
                    return;
                }
            }
        });
        Self { tx, task }
    }

    fn send(&self, body: Bytes) {
        self.tx.send_replace(body);
    }

    async fn close(self) {
        drop(self.tx);
        if let Err(e) = self.task.await {
            warn!("Writer task failed: {}", e);
        }
    }
}

/// Writes the serialised [`SessionState`] whenever it changed since the
/// last write.
#[derive(Debug)]
pub struct SnapshotWriter {
    path: PathBuf,
    last_digest: Option<md5::Digest>,
    writer: Option<FileWriter>,
}

impl SnapshotWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_digest: None,
            writer: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Queue a write of `state`.  Returns `false` when the content matched
    /// the previous write (or could not be serialised) and nothing was queued.
    pub fn save(&mut self, state: &SessionState) -> bool {
        let body = match serde_json::to_vec_pretty(state) {
            Ok(body) => body,
            Err(e) => {
                warn!("Failed to serialise state: {}", e);
                return false;
            }
        };

        let digest = md5::compute(&body);
        if self.last_digest == Some(digest) {
            return false;
        }
        self.last_digest = Some(digest);

        let body = Bytes::from(body);
        match &self.writer {
            Some(writer) => writer.send(body),
            None => self.writer = Some(FileWriter::spawn(self.path.clone(), body)),
        }
        true
    }

    /// Wait until the last queued snapshot is on disk.
    pub async fn close(self) {
        if let Some(writer) = self.writer {
            writer.close().await;
        }
    }
}

/// Cached item templates, keyed by the server timestamp they were
/// downloaded at.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CachedTemplates {
    pub timestamp_ms: u64,
    #[serde(default)]
    pub templates: Vec<serde_json::Value>,
}

impl CachedTemplates {
    /// Whether a fresh download is needed for `server_timestamp_ms`.
    pub fn is_stale(cached: Option<&CachedTemplates>, server_timestamp_ms: u64) -> bool {
        match cached {
            None => true,
            Some(c) => c.timestamp_ms < server_timestamp_ms,
        }
    }
}

#[derive(Debug)]
pub struct TemplateCache {
    path: PathBuf,
    writer: Option<FileWriter>,
}

impl TemplateCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writer: None,
        }
    }

    /// Read the cache.  Missing or unreadable caches count as absent.
    pub async fn load(&self) -> Option<CachedTemplates> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) => {
                debug!("No template cache at {}: {}", self.path.display(), e);
                return None;
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(cached) => Some(cached),
            Err(e) => {
                warn!("Ignoring corrupt template cache {}: {}", self.path.display(), e);
                None
            }
        }
    }

    pub fn save(&mut self, cached: &CachedTemplates) {
        let body = match serde_json::to_vec(cached) {
            Ok(body) => Bytes::from(body),
            Err(e) => {
                warn!("Failed to serialise item templates: {}", e);
                return;
            }
        };
        match &self.writer {
            Some(writer) => writer.send(body),
            None => self.writer = Some(FileWriter::spawn(self.path.clone(), body)),
        }
    }

    pub async fn close(self) {
        if let Some(writer) = self.writer {
            writer.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OwnedPokemon, Position};

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("roambot-{}-{}.json", name, std::process::id()))
    }

    fn large_state() -> SessionState {
        let mut state = SessionState::new(Position::new(1.0, 2.0));
        state.inventory.pokemon = (0..5_000)
            .map(|id| OwnedPokemon {
                id,
                pokemon_id: 16,
                cp: 100,
                favorite: false,
            })
            .collect();
        state
    }

    #[test]
    fn template_staleness() {
        let cached = CachedTemplates {
            timestamp_ms: 100,
            templates: vec![],
        };
        assert!(CachedTemplates::is_stale(None, 0));
        assert!(CachedTemplates::is_stale(Some(&cached), 101));
        assert!(!CachedTemplates::is_stale(Some(&cached), 100));
    }

    #[tokio::test]
    async fn unchanged_state_is_not_rewritten() {
        let path = scratch("unchanged");
        let mut writer = SnapshotWriter::new(&path);
        let mut state = SessionState::new(Position::new(1.0, 2.0));

        assert!(writer.save(&state));
        assert!(!writer.save(&state));
        state.tick = 1;
        assert!(writer.save(&state));
        writer.close().await;
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn latest_snapshot_wins_over_a_slower_earlier_one() {
        let path = scratch("latest");
        for round in 0..50u64 {
            let mut writer = SnapshotWriter::new(&path);
            writer.save(&large_state());
            let mut small = SessionState::new(Position::new(1.0, 2.0));
            small.tick = round + 1;
            writer.save(&small);
            writer.close().await;

            let raw = tokio::fs::read(&path).await.unwrap();
            let on_disk: serde_json::Value = serde_json::from_slice(&raw).unwrap();
            assert_eq!(on_disk["tick"], round + 1, "round {round}");
        }

        let mut tmp = path.file_name().unwrap().to_os_string();
        tmp.push(".tmp");
        assert!(!path.with_file_name(tmp).exists());
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn template_cache_round_trips_after_close() {
        let path = scratch("templates");
        let mut cache = TemplateCache::new(&path);
        let cached = CachedTemplates {
            timestamp_ms: 42,
            templates: vec![serde_json::json!({"template_id": "ITEM_POKE_BALL"})],
        };
        cache.save(&cached);
        cache.close().await;

        let reread = TemplateCache::new(&path);
        assert_eq!(reread.load().await, Some(cached));
        let _ = std::fs::remove_file(&path);
    }

    #[tokio::test]
    async fn missing_cache_loads_as_none() {
        let cache = TemplateCache::new("/nonexistent/roambot/templates.json");
        assert!(cache.load().await.is_none());
    }
}
