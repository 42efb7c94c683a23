//! roambot
//!
//! Orchestration core for a location-based game agent: walks a route,
//! keeps a rate-gated snapshot of the surrounding world, acts on what is in
//! reach, and stops cleanly on challenges and network failures.
//!
//! ## Architecture
//!
//! ```text
//! SessionController  (session.rs)     ← state machine, owns SessionState
//!   ├── walker.rs                     ← route planning, per-tick movement
//!   ├── refresh.rs                    ← refresh gate + map query
//!   ├── Dispatcher  (dispatcher.rs)   ← stops, encounter/catch, deferred queue
//!   │     └── throw.rs                ← ball + throw parameters
//!   └── recovery.rs                   ← challenge / proxy / fatal handling
//!
//! collaborators (client.rs traits)
//!   ├── BridgeClient  (bridge.rs)     ← JSON-lines TCP to the protocol client
//!   └── ChannelObserver (ui.rs)       ← UI broadcast + queries
//! ```
//!
//! All state lives in one [`state::SessionState`] that the controller lends
//! out by `&mut`; nothing else keeps a copy.

// Pure types and logic are always available (no server feature needed).
pub mod api;
pub mod client;
pub mod error;
pub mod geo;
pub mod observer;
pub mod protocol;
pub mod refresh;
pub mod state;
pub mod throw;
pub mod types;
pub mod walker;

// Runtime-bound modules require the `server` feature.
#[cfg(feature = "server")]
pub mod bridge;
#[cfg(feature = "server")]
pub mod dispatcher;
#[cfg(feature = "server")]
pub mod persist;
#[cfg(feature = "server")]
pub mod recovery;
#[cfg(feature = "server")]
pub mod session;
#[cfg(feature = "server")]
pub mod ui;

// Convenience re-exports (server only)
#[cfg(feature = "server")]
pub use bridge::BridgeClient;
#[cfg(feature = "server")]
pub use dispatcher::Dispatcher;
#[cfg(feature = "server")]
pub use recovery::ExitReason;
#[cfg(feature = "server")]
pub use session::{Collaborators, SessionController, SessionPhase};
#[cfg(feature = "server")]
pub use ui::{ChannelObserver, UiServer};
pub use error::{MappingError, RemoteError, TransportKind};
pub use state::SessionState;
pub use types::{BotConfig, LatLng, Position};
