//! Observer wire protocol.
//!
//! This module owns **every message that crosses the observer boundary**
//! between the agent and any UI watching it.
//!
//! ## Directions
//!
//! | Kind        | Direction        | Shape                                     |
//! |-------------|------------------|-------------------------------------------|
//! | push events | agent → observer | `{"event": name, "data": UiEvent<T>}`     |
//! | queries     | observer → agent | `{"event": "inventory_list"}` etc.        |
//! | commands    | observer → agent | `{"event": "enqueue", "data": {...}}`     |
//!
//! ## Design rules
//!
//! 1. Every struct is `Serialize + Deserialize` with snake_case JSON.
//! 2. Push events are fire-and-forget; a slow observer never blocks a tick.
//! 3. Query answers are built from live [`SessionState`] between ticks.

use crate::state::SessionState;
use crate::types::{
    Candy, Egg, EggIncubator, ItemStack, LatLng, OwnedPokemon, PendingAction, PlayerStats,
    Position,
};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Common envelope
// ---------------------------------------------------------------------------

/// Every push event is wrapped in this envelope.
///
/// `frame` is a per-session sequence number so observers can order events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiEvent<T> {
    pub session: String,
    pub frame: u64,
    pub payload: T,
}

impl<T> UiEvent<T> {
    pub fn new(session: impl Into<String>, frame: u64, payload: T) -> Self {
        Self {
            session: session.into(),
            frame,
            payload,
        }
    }
}

/// One outbound line.
#[derive(Debug, Clone, Serialize)]
pub struct OutboundFrame<'a, T> {
    pub event: &'a str,
    pub data: T,
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Storage {
    pub max_pokemon_storage: u32,
    pub max_item_storage: u32,
}

/// Sent once the bootstrap has finished, and to every observer that
/// connects afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Initialized {
    pub username: String,
    pub player: PlayerStats,
    pub storage: Storage,
    pub pos: Position,
}

impl Initialized {
    pub fn from_state(state: &SessionState) -> Self {
        Self {
            username: state.player.username.clone(),
            player: state.inventory.player,
            storage: Storage {
                max_pokemon_storage: state.player.max_pokemon_storage,
                max_item_storage: state.player.max_item_storage,
            },
            pos: state.position,
        }
    }
}

/// The current position followed by the remaining waypoints.
pub fn route_payload(state: &SessionState) -> Vec<LatLng> {
    std::iter::once(state.position.latlng())
        .chain(state.route.waypoints.iter().copied())
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PokemonList {
    pub pokemon: Vec<OwnedPokemon>,
    pub candy: Vec<Candy>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EggsList {
    pub km_walked: f64,
    pub egg_incubators: Vec<EggIncubator>,
    pub eggs: Vec<Egg>,
}

// ---------------------------------------------------------------------------
// Inbound requests
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Query {
    InventoryList,
    PokemonList,
    EggsList,
}

impl Query {
    pub fn event_name(self) -> &'static str {
        match self {
            Query::InventoryList => events::INVENTORY_LIST,
            Query::PokemonList => events::POKEMON_LIST,
            Query::EggsList => events::EGGS_LIST,
        }
    }
}

/// A line received from an observer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum InboundMessage {
    InventoryList,
    PokemonList,
    EggsList,
    Enqueue(PendingAction),
}

impl InboundMessage {
    pub fn as_query(&self) -> Option<Query> {
        match self {
            InboundMessage::InventoryList => Some(Query::InventoryList),
            InboundMessage::PokemonList => Some(Query::PokemonList),
            InboundMessage::EggsList => Some(Query::EggsList),
            InboundMessage::Enqueue(_) => None,
        }
    }
}

/// Answer a pull-style query from live state.
pub fn answer(state: &SessionState, query: Query) -> serde_json::Value {
    let value = match query {
        Query::InventoryList => serde_json::to_value::<Vec<ItemStack>>(state.inventory.item_stacks()),
        Query::PokemonList => serde_json::to_value(PokemonList {
            pokemon: state.inventory.pokemon.clone(),
            candy: state.inventory.candy_list(),
        }),
        Query::EggsList => serde_json::to_value(EggsList {
            km_walked: state.inventory.player.km_walked,
            egg_incubators: state.inventory.egg_incubators.clone(),
            eggs: state.inventory.eggs.clone(),
        }),
    };
    value.unwrap_or(serde_json::Value::Null)
}

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

pub mod events {
    pub const INITIALIZED: &str = "initialized";
    pub const POSITION: &str = "position";
    pub const ROUTE: &str = "route";
    pub const POKESTOPS: &str = "pokestops";
    pub const POKESTOP_VISITED: &str = "pokestop_visited";
    pub const POKEMON_ENCOUNTERED: &str = "pokemon_encountered";
    pub const POKEMON_CAUGHT: &str = "pokemon_caught";

    pub const INVENTORY_LIST: &str = "inventory_list";
    pub const POKEMON_LIST: &str = "pokemon_list";
    pub const EGGS_LIST: &str = "eggs_list";
}
