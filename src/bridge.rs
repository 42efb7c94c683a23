//! JSON-lines TCP bridge to the external collaborators.
//!
//! The game protocol client, the mapping service, the challenge solver and
//! the proxy selector all live behind one line-delimited JSON connection.
//! One request line, one reply line; the connection is held under a lock for
//! the whole round-trip so calls never interleave.
//!
//! ## Requests
//!
//! | `op`              | Extra keys                    | Reply keys           |
//! |-------------------|-------------------------------|----------------------|
//! | `batch`           | `position`, `calls`           | `responses`          |
//! | `route`           | `origin`, `destination`       | `legs`               |
//! | `elevation`       | `at`                          | `elevation`          |
//! | `solve_challenge` | `url`                         | `token` (nullable)   |
//! | `proxy_bad`       | `kind`                        | –                    |
//!
//! Every reply carries `ok`.  A failed `batch` carries an `error` object
//! tagged by `kind`: `challenge` (`url`), `transport` (`message`, `code`) or
//! `other` (`message`).

use crate::client::{
    Batch, ChallengeSolver, GameClient, GameResponse, MappingService, ProxyFeedback,
    RemoteFuture, RouteLeg,
};
use crate::error::{MappingError, RemoteError, TransportKind};
use crate::types::{LatLng, Position};
use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

struct BridgeConn {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum BridgeFailure {
    Challenge {
        url: String,
    },
    Transport {
        message: String,
        #[serde(default)]
        code: Option<String>,
    },
    Other {
        #[serde(default)]
        message: String,
    },
}

impl From<BridgeFailure> for RemoteError {
    fn from(f: BridgeFailure) -> Self {
        match f {
            BridgeFailure::Challenge { url } => RemoteError::ChallengeRequired { url },
            BridgeFailure::Transport { message, code } => {
                RemoteError::from_message(message, code.as_deref())
            }
            BridgeFailure::Other { message } => RemoteError::Unclassified(message),
        }
    }
}

/// Client side of the bridge.  Implements every collaborator trait.
pub struct BridgeClient {
    conn: Mutex<BridgeConn>,
    position: parking_lot::Mutex<Position>,
}

impl BridgeClient {
    pub async fn connect(addr: &str, start: Position) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .await
            .with_context(|| format!("connect bridge {addr}"))?;
        stream.set_nodelay(true).ok();
        let (read, write) = stream.into_split();
        Ok(Self {
            conn: Mutex::new(BridgeConn {
                reader: BufReader::new(read),
                writer: write,
            }),
            position: parking_lot::Mutex::new(start),
        })
    }

    async fn request_json(&self, req: Value) -> Result<Value> {
        let line = format!("{req}\n");
        let mut conn = self.conn.lock().await;
        conn.writer
            .write_all(line.as_bytes())
            .await
            .context("bridge write")?;
        conn.writer.flush().await.ok();

        let mut resp_line = String::new();
        let n = conn
            .reader
            .read_line(&mut resp_line)
            .await
            .context("bridge read")?;
        if n == 0 {
            return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof))
                .context("bridge connection closed");
        }
        serde_json::from_str(resp_line.trim()).context("invalid bridge json response")
    }

    /// `request_json`, then fail unless `ok` is set.
    async fn request_ok(&self, req: Value) -> Result<Value> {
        let v = self.request_json(req).await?;
        if v.get("ok").and_then(Value::as_bool) != Some(true) {
            anyhow::bail!("bridge request failed: {}", v);
        }
        Ok(v)
    }

    async fn submit_batch(&self, batch: Batch) -> Result<Vec<GameResponse>, RemoteError> {
        let position = *self.position.lock();
        let req = json!({
            "op": "batch",
            "position": position,
            "calls": batch.into_calls(),
        });
        let v = self.request_json(req).await.map_err(remote_error)?;

        if v.get("ok").and_then(Value::as_bool) != Some(true) {
            let failure = v
                .get("error")
                .cloned()
                .and_then(|e| serde_json::from_value::<BridgeFailure>(e).ok());
            return Err(match failure {
                Some(f) => f.into(),
                None => RemoteError::Unclassified(format!("batch failed: {v}")),
            });
        }

        let responses = v.get("responses").cloned().unwrap_or(Value::Null);
        serde_json::from_value(responses)
            .map_err(|e| RemoteError::Unclassified(format!("decode batch responses: {e}")))
    }
}

/// Map a bridge-level failure onto the remote error taxonomy.
fn remote_error(err: anyhow::Error) -> RemoteError {
    match err.downcast_ref::<std::io::Error>() {
        Some(io) => RemoteError::from_io(io),
        None => RemoteError::from_message(format!("{err:#}"), None),
    }
}

impl GameClient for BridgeClient {
    fn set_position(&self, position: Position) {
        *self.position.lock() = position;
    }

    fn submit<'a>(
        &'a self,
        batch: Batch,
    ) -> RemoteFuture<'a, Result<Vec<GameResponse>, RemoteError>> {
        Box::pin(async move {
            debug!("Submitting batch of {} calls", batch.len());
            self.submit_batch(batch).await
        })
    }
}

impl MappingService for BridgeClient {
    fn route<'a>(
        &'a self,
        origin: LatLng,
        destination: LatLng,
    ) -> RemoteFuture<'a, Result<Vec<RouteLeg>, MappingError>> {
        Box::pin(async move {
            let v = self
                .request_ok(json!({ "op": "route", "origin": origin, "destination": destination }))
                .await
                .map_err(|e| MappingError::Unavailable(format!("{e:#}")))?;
            let legs = v
                .get("legs")
                .cloned()
                .ok_or_else(|| MappingError::NoRoute(format!("{origin} -> {destination}")))?;
            serde_json::from_value(legs).map_err(|e| MappingError::Unavailable(e.to_string()))
        })
    }

    fn elevation<'a>(&'a self, at: LatLng) -> RemoteFuture<'a, Result<f64, MappingError>> {
        Box::pin(async move {
            let v = self
                .request_ok(json!({ "op": "elevation", "at": at }))
                .await
                .map_err(|e| MappingError::Unavailable(format!("{e:#}")))?;
            v.get("elevation")
                .and_then(Value::as_f64)
                .ok_or_else(|| MappingError::Unavailable("missing elevation".into()))
        })
    }
}

impl ChallengeSolver for BridgeClient {
    fn resolve<'a>(&'a self, url: &'a str) -> RemoteFuture<'a, Option<String>> {
        Box::pin(async move {
            match self
                .request_ok(json!({ "op": "solve_challenge", "url": url }))
                .await
            {
                Ok(v) => v.get("token").and_then(Value::as_str).map(str::to_owned),
                Err(e) => {
                    warn!("Challenge solver failed: {:#}", e);
                    None
                }
            }
        })
    }
}

impl ProxyFeedback for BridgeClient {
    fn mark_bad<'a>(&'a self, kind: TransportKind) -> RemoteFuture<'a, ()> {
        Box::pin(async move {
            if let Err(e) = self
                .request_json(json!({ "op": "proxy_bad", "kind": kind.to_string() }))
                .await
            {
                warn!("Failed to report bad proxy: {:#}", e);
            }
        })
    }
}
