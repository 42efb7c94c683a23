//! `SessionState` – the single owned aggregate the control loop threads
//! through every component by `&mut`.

use crate::client::{InventorySnapshot, MapObjects};
use crate::refresh::RefreshBaseline;
use crate::types::{
    Candy, Egg, EggIncubator, ItemStack, LatLng, MapSettings, OwnedPokemon, PendingAction,
    PlayerProfile, PlayerStats, Pokestop, Position, WildPokemon,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

// ---------------------------------------------------------------------------
// Route
// ---------------------------------------------------------------------------

/// Waypoints toward a target stop.  Consumed front to back.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct Route {
    pub waypoints: VecDeque<LatLng>,
    /// Id of the target stop in the world snapshot.  Looked up by id, never
    /// held by reference: the stop may vanish on the next refresh.
    pub target: Option<String>,
}

impl Route {
    pub fn idle() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn next(&self) -> Option<LatLng> {
        self.waypoints.front().copied()
    }
}

// ---------------------------------------------------------------------------
// World snapshot
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct WorldSnapshot {
    /// Stationary stops, in the order the service first reported them.
    pub pokestops: Vec<Pokestop>,
    /// Ephemeral creatures from the most recent refresh only.
    pub wild_pokemons: Vec<WildPokemon>,
}

impl WorldSnapshot {
    /// Replace the ephemeral set; upsert stops while keeping the locally set
    /// `visited` / `reached` flags.
    pub fn apply_map_objects(&mut self, objects: MapObjects) {
        self.wild_pokemons = objects.wild_pokemons;

        for incoming in objects.pokestops {
            match self.pokestops.iter_mut().find(|p| p.id == incoming.id) {
                Some(existing) => {
                    let visited = existing.visited || incoming.visited;
                    let reached = existing.reached || incoming.reached;
                    *existing = Pokestop {
                        visited,
                        reached,
                        ..incoming
                    };
                }
                None => self.pokestops.push(incoming),
            }
        }
    }

    pub fn pokestop(&self, id: &str) -> Option<&Pokestop> {
        self.pokestops.iter().find(|p| p.id == id)
    }

    pub fn pokestop_mut(&mut self, id: &str) -> Option<&mut Pokestop> {
        self.pokestops.iter_mut().find(|p| p.id == id)
    }
}

// ---------------------------------------------------------------------------
// Inventory
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct Inventory {
    /// Item id → count.
    pub items: BTreeMap<u32, u32>,
    pub pokemon: Vec<OwnedPokemon>,
    pub eggs: Vec<Egg>,
    pub egg_incubators: Vec<EggIncubator>,
    /// Family id → candy.
    pub candies: BTreeMap<u32, u32>,
    pub player: PlayerStats,
}

impl Inventory {
    pub fn count(&self, item_id: u32) -> u32 {
        self.items.get(&item_id).copied().unwrap_or(0)
    }

    pub fn credit(&mut self, awarded: &[ItemStack]) {
        for stack in awarded {
            *self.items.entry(stack.item_id).or_insert(0) += stack.count;
        }
    }

    /// Spend one of `item_id`.  Returns false when none was held.
    pub fn consume(&mut self, item_id: u32) -> bool {
        match self.items.get_mut(&item_id) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        }
    }

    pub fn item_stacks(&self) -> Vec<ItemStack> {
        self.items
            .iter()
            .map(|(&item_id, &count)| ItemStack { item_id, count })
            .collect()
    }

    pub fn candy_list(&self) -> Vec<Candy> {
        self.candies
            .iter()
            .map(|(&family_id, &candy)| Candy { family_id, candy })
            .collect()
    }

    /// Replace with the service-confirmed inventory.  Player stats are only
    /// replaced when the response carried them.
    pub fn apply_snapshot(&mut self, snap: InventorySnapshot) {
        self.items = snap.items.iter().map(|s| (s.item_id, s.count)).collect();
        self.pokemon = snap.pokemon;
        self.eggs = snap.eggs;
        self.egg_incubators = snap.egg_incubators;
        self.candies = snap.candies.iter().map(|c| (c.family_id, c.candy)).collect();
        if let Some(player) = snap.player {
            self.player = player;
        }
    }
}

// ---------------------------------------------------------------------------
// API bookkeeping
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize)]
pub struct ApiState {
    /// Template timestamp the service reported in its remote config.
    pub item_templates_timestamp_ms: u64,
    /// Refresh thresholds from the service's settings response.
    pub map_settings: MapSettings,
    /// Baseline for the refresh gate (time + position of last refresh).
    #[serde(skip)]
    pub last_refresh: Option<RefreshBaseline>,
    /// Static template data.  Large; never persisted with the state.
    #[serde(skip)]
    pub item_templates: Vec<serde_json::Value>,
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct SessionState {
    pub position: Position,
    pub route: Route,
    pub world: WorldSnapshot,
    pub inventory: Inventory,
    pub player: PlayerProfile,
    pub pending: VecDeque<PendingAction>,
    /// Encounter ids already attempted this session.
    pub encountered: BTreeSet<u64>,
    pub api: ApiState,
    pub tick: u64,
}

impl SessionState {
    pub fn new(start: Position) -> Self {
        Self {
            position: start,
            route: Route::idle(),
            world: WorldSnapshot::default(),
            inventory: Inventory::default(),
            player: PlayerProfile::default(),
            pending: VecDeque::new(),
            encountered: BTreeSet::new(),
            api: ApiState::default(),
            tick: 0,
        }
    }

    pub fn enqueue(&mut self, action: PendingAction) {
        self.pending.push_back(action);
    }
}
