//! Observer hub and the line-delimited TCP server UIs connect to.
//!
//! ## Outbound
//!
//! Every [`Observer`] notification is serialised once into an
//! `{"event": name, "data": UiEvent<T>}` line and broadcast to every
//! connected UI.  The last `initialized` line is kept and replayed to UIs
//! that connect later.
//!
//! ## Inbound
//!
//! UIs send [`InboundMessage`] lines.  Queries are forwarded to the session
//! controller, answered from live state between ticks, and written back on
//! the same connection as `{"event": name, "data": answer}`.  `enqueue`
//! commands are appended to the pending-action queue.

use crate::observer::Observer;
use crate::protocol::{events, InboundMessage, Initialized, OutboundFrame, Query, UiEvent};
use crate::types::{LatLng, OwnedPokemon, PendingAction, Pokestop, Position, WildPokemon};
use anyhow::{Context, Result};
use bytes::Bytes;
use log::{debug, info, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc, oneshot};

/// A request from a UI, handled by the session controller between ticks.
#[derive(Debug)]
pub enum UiRequest {
    Query {
        query: Query,
        reply: oneshot::Sender<serde_json::Value>,
    },
    Enqueue(PendingAction),
}

// ---------------------------------------------------------------------------
// Broadcast hub
// ---------------------------------------------------------------------------

/// [`Observer`] that fans serialised events out to every connected UI.
///
/// Cheap to clone; clones share the channel, frame counter and replay slot.
#[derive(Clone)]
pub struct ChannelObserver {
    session: Arc<str>,
    tx: broadcast::Sender<Bytes>,
    frame: Arc<AtomicU64>,
    initialized: Arc<Mutex<Option<Bytes>>>,
}

impl ChannelObserver {
    pub fn new(session: &str, capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self {
            session: Arc::from(session),
            tx,
            frame: Arc::new(AtomicU64::new(0)),
            initialized: Arc::new(Mutex::new(None)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Bytes> {
        self.tx.subscribe()
    }

    pub fn last_initialized(&self) -> Option<Bytes> {
        self.initialized.lock().clone()
    }

    /// Serialise and broadcast one event.  Failures are logged and swallowed;
    /// having no UI connected is not a failure.
    fn publish<T: Serialize>(&self, event: &str, payload: T) {
        let frame = self.frame.fetch_add(1, Ordering::Relaxed);
        let line = OutboundFrame {
            event,
            data: UiEvent::new(self.session.as_ref(), frame, payload),
        };
        match encode_line(&line) {
            Ok(bytes) => {
                if event == events::INITIALIZED {
                    *self.initialized.lock() = Some(bytes.clone());
                }
                let _ = self.tx.send(bytes);
            }
            Err(e) => warn!("Failed to serialise event {}: {}", event, e),
        }
    }
}

fn encode_line<T: Serialize>(value: &T) -> serde_json::Result<Bytes> {
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    Ok(Bytes::from(line))
}

impl Observer for ChannelObserver {
    fn initialized(&self, payload: &Initialized) {
        self.publish(events::INITIALIZED, payload);
    }

    fn position(&self, position: &Position) {
        self.publish(events::POSITION, position);
    }

    fn route(&self, route: &[LatLng]) {
        self.publish(events::ROUTE, route);
    }

    fn pokestops(&self, stops: &[Pokestop]) {
        self.publish(events::POKESTOPS, stops);
    }

    fn pokestop_visited(&self, stop: &Pokestop) {
        self.publish(events::POKESTOP_VISITED, stop);
    }

    fn pokemon_encountered(&self, pokemon: &WildPokemon) {
        self.publish(events::POKEMON_ENCOUNTERED, pokemon);
    }

    fn pokemon_caught(&self, pokemon: &OwnedPokemon) {
        self.publish(events::POKEMON_CAUGHT, pokemon);
    }
}

// ---------------------------------------------------------------------------
// TCP server
// ---------------------------------------------------------------------------

pub struct UiServer {
    listener: TcpListener,
    hub: ChannelObserver,
    requests: mpsc::Sender<UiRequest>,
}

impl UiServer {
    pub async fn bind(
        addr: &str,
        hub: ChannelObserver,
        requests: mpsc::Sender<UiRequest>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("bind ui listener {addr}"))?;
        info!("UI server listening on {}", addr);
        Ok(Self {
            listener,
            hub,
            requests,
        })
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        self.listener.local_addr().context("ui listener address")
    }

    /// Accept UIs until the task is cancelled.
    pub async fn run(self) -> Result<()> {
        loop {
            let (socket, addr) = self.listener.accept().await.context("ui accept")?;
            debug!("UI connected from {}", addr);
            let hub = self.hub.clone();
            let requests = self.requests.clone();
            tokio::spawn(async move {
                if let Err(e) = serve_connection(socket, hub, requests).await {
                    debug!("UI connection {} closed: {:#}", addr, e);
                }
            });
        }
    }
}

async fn serve_connection(
    socket: TcpStream,
    hub: ChannelObserver,
    requests: mpsc::Sender<UiRequest>,
) -> Result<()> {
    let (read, mut write) = socket.into_split();
    let mut feed = hub.subscribe();

    if let Some(initialized) = hub.last_initialized() {
        write.write_all(&initialized).await.context("ui write")?;
    }

    let mut lines = BufReader::new(read).lines();
    loop {
        tokio::select! {
            frame = feed.recv() => match frame {
                Ok(bytes) => write.write_all(&bytes).await.context("ui write")?,
                Err(RecvError::Lagged(n)) => warn!("UI fell behind, {} events dropped", n),
                Err(RecvError::Closed) => return Ok(()),
            },
            line = lines.next_line() => {
                let Some(line) = line.context("ui read")? else {
                    return Ok(());
                };
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match serde_json::from_str::<InboundMessage>(trimmed) {
                    Ok(message) => {
                        if let Some(reply) = handle_inbound(message, &requests).await? {
                            write.write_all(&reply).await.context("ui write")?;
                        }
                    }
                    Err(e) => warn!("Ignoring bad UI line: {} ({})", trimmed, e),
                }
            }
        }
    }
}

/// Forward one inbound message.  Returns the encoded answer for queries.
async fn handle_inbound(
    message: InboundMessage,
    requests: &mpsc::Sender<UiRequest>,
) -> Result<Option<Bytes>> {
    if let InboundMessage::Enqueue(action) = message {
        requests
            .send(UiRequest::Enqueue(action))
            .await
            .context("session gone")?;
        return Ok(None);
    }

    let Some(query) = message.as_query() else {
        return Ok(None);
    };
    let (reply, answer) = oneshot::channel();
    requests
        .send(UiRequest::Query { query, reply })
        .await
        .context("session gone")?;
    let data = answer.await.context("query dropped")?;
    let line = encode_line(&OutboundFrame {
        event: query.event_name(),
        data,
    })?;
    Ok(Some(line))
}
