//! Boundary to the external collaborators: the batched game client, the
//! mapping service, the challenge solver and the proxy selector.
//!
//! Everything here is a wire shape or a trait.  Concrete implementations
//! live in [`crate::bridge`] (server feature) and in test fakes.
//!
//! ## Call / response contract
//!
//! | Call                          | Response                          |
//! |-------------------------------|-----------------------------------|
//! | `get_player`                  | `get_player` (profile)            |
//! | `download_remote_config_version` | item-template timestamp        |
//! | `get_map_objects`             | stops + wild creatures            |
//! | `fort_search`                 | status + awarded items + cooldown |
//! | `encounter`                   | status                            |
//! | `catch_pokemon`               | status + captured id              |
//! | `release_pokemon` / `evolve_pokemon` / `level_up_rewards` | result |
//! | `use_item_egg_incubator`      | result + updated incubator        |
//! | `verify_challenge`            | success flag                      |
//!
//! Every batch may also carry the standard trailing calls (see
//! [`crate::api`]); their responses are applied to state during parsing.

use crate::error::{MappingError, RemoteError, TransportKind};
use crate::types::{
    EggIncubator, ItemStack, LatLng, MapSettings, OwnedPokemon, PlayerProfile, PlayerStats,
    Pokestop, Position, WildPokemon, Candy, Egg,
};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

pub type RemoteFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ---------------------------------------------------------------------------
// Calls
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameCall {
    // Standard trailing calls
    CheckChallenge,
    GetHatchedEggs,
    GetInventory,
    CheckAwardedBadges,
    DownloadSettings,
    GetBuddyWalked,

    // Bootstrap
    GetPlayer {
        country: String,
        language: String,
        timezone: String,
    },
    DownloadRemoteConfigVersion {
        app_version: u32,
    },
    GetAssetDigest {
        app_version: u32,
    },
    DownloadItemTemplates,
    GetPlayerProfile,
    MarkTutorialComplete {
        tutorials: Vec<u32>,
    },
    LevelUpRewards {
        level: u32,
    },

    // World + actions
    GetMapObjects {
        latitude: f64,
        longitude: f64,
    },
    FortSearch {
        fort_id: String,
        fort_latitude: f64,
        fort_longitude: f64,
    },
    Encounter {
        encounter_id: u64,
        spawn_point_id: String,
    },
    CatchPokemon {
        encounter_id: u64,
        pokeball: u32,
        normalized_reticle_size: f64,
        spawn_point_id: String,
        hit_pokemon: bool,
        spin_modifier: f64,
        normalized_hit_position: f64,
    },
    ReleasePokemon {
        pokemon_ids: Vec<u64>,
    },
    EvolvePokemon {
        pokemon_id: u64,
    },
    UseItemEggIncubator {
        incubator_id: String,
        egg_id: u64,
    },
    VerifyChallenge {
        token: String,
    },
}

/// Calls submitted together in a single round-trip.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    calls: Vec<GameCall>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, call: GameCall) -> &mut Self {
        self.calls.push(call);
        self
    }

    pub fn calls(&self) -> &[GameCall] {
        &self.calls
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn into_calls(self) -> Vec<GameCall> {
        self.calls
    }
}

// ---------------------------------------------------------------------------
// Response statuses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FortSearchStatus {
    Success,
    OutOfRange,
    InCooldownPeriod,
    InventoryFull,
    ExceededDailyLimit,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EncounterStatus {
    Success,
    PokemonInventoryFull,
    NotFound,
    Closed,
    Fled,
    NotInRange,
    AlreadyHappened,
    #[serde(other)]
    Error,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CatchStatus {
    Success,
    Escape,
    Flee,
    MissedBall,
    #[serde(other)]
    Error,
}

/// Outcome of release / evolve / level-up / incubator calls.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionResult {
    Success,
    #[serde(other)]
    Failed,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Full inventory as confirmed by the service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InventorySnapshot {
    pub items: Vec<ItemStack>,
    pub pokemon: Vec<OwnedPokemon>,
    pub eggs: Vec<Egg>,
    pub egg_incubators: Vec<EggIncubator>,
    pub candies: Vec<Candy>,
    pub player: Option<PlayerStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MapObjects {
    pub pokestops: Vec<Pokestop>,
    pub wild_pokemons: Vec<WildPokemon>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GameResponse {
    CheckChallenge {
        show_challenge: bool,
        #[serde(default)]
        challenge_url: String,
    },
    GetHatchedEggs {
        #[serde(default)]
        pokemon_ids: Vec<u64>,
    },
    GetInventory(InventorySnapshot),
    CheckAwardedBadges {
        #[serde(default)]
        badges: Vec<u32>,
    },
    DownloadSettings {
        #[serde(default)]
        map_settings: Option<MapSettings>,
    },
    GetBuddyWalked,

    GetPlayer(PlayerProfile),
    DownloadRemoteConfigVersion {
        item_templates_timestamp_ms: u64,
    },
    GetAssetDigest {
        #[serde(default)]
        digest_count: usize,
    },
    DownloadItemTemplates {
        timestamp_ms: u64,
        #[serde(default)]
        templates: Vec<serde_json::Value>,
    },
    GetPlayerProfile {
        #[serde(default)]
        start_time_ms: u64,
    },
    MarkTutorialComplete {
        success: bool,
    },
    LevelUpRewards {
        result: ActionResult,
        #[serde(default)]
        items_awarded: Vec<ItemStack>,
    },

    GetMapObjects(MapObjects),
    FortSearch {
        result: FortSearchStatus,
        #[serde(default)]
        items_awarded: Vec<ItemStack>,
        #[serde(default)]
        experience_awarded: u32,
        #[serde(default)]
        cooldown_complete_ms: u64,
    },
    Encounter {
        status: EncounterStatus,
    },
    CatchPokemon {
        status: CatchStatus,
        #[serde(default)]
        captured_pokemon_id: u64,
    },
    ReleasePokemon {
        result: ActionResult,
        #[serde(default)]
        candy_awarded: u32,
    },
    EvolvePokemon {
        result: ActionResult,
        #[serde(default)]
        evolved_pokemon: Option<OwnedPokemon>,
    },
    UseItemEggIncubator {
        result: ActionResult,
        #[serde(default)]
        egg_incubator: Option<EggIncubator>,
    },
    VerifyChallenge {
        success: bool,
    },
}

// ---------------------------------------------------------------------------
// Mapping shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteStep {
    pub end_location: LatLng,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RouteLeg {
    pub steps: Vec<RouteStep>,
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// The batched request/response game client.
pub trait GameClient: Send + Sync {
    fn start_batch(&self) -> Batch {
        Batch::new()
    }

    /// Position reported with every subsequent batch.
    fn set_position(&self, position: Position);

    /// One round-trip.  Responses come back in call order.
    fn submit<'a>(
        &'a self,
        batch: Batch,
    ) -> RemoteFuture<'a, Result<Vec<GameResponse>, RemoteError>>;
}

/// Walking directions and elevation lookups.
pub trait MappingService: Send + Sync {
    fn route<'a>(
        &'a self,
        origin: LatLng,
        destination: LatLng,
    ) -> RemoteFuture<'a, Result<Vec<RouteLeg>, MappingError>>;

    fn elevation<'a>(&'a self, at: LatLng) -> RemoteFuture<'a, Result<f64, MappingError>>;
}

/// Produces a response token for a challenge URL, or `None` when it gave up.
pub trait ChallengeSolver: Send + Sync {
    fn resolve<'a>(&'a self, url: &'a str) -> RemoteFuture<'a, Option<String>>;
}

/// Feedback to whatever picked the outbound proxy.
pub trait ProxyFeedback: Send + Sync {
    fn mark_bad<'a>(&'a self, kind: TransportKind) -> RemoteFuture<'a, ()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn calls_serialize_with_snake_case_tag() {
        let call = GameCall::Encounter {
            encounter_id: 7,
            spawn_point_id: "abc".into(),
        };
        let v = serde_json::to_value(&call).unwrap();
        assert_eq!(v["type"], "encounter");
        assert_eq!(v["encounter_id"], 7);
    }

    #[test]
    fn unknown_statuses_fall_back() {
        let r: GameResponse =
            serde_json::from_str(r#"{"type":"encounter","status":"something_new"}"#).unwrap();
        assert_eq!(
            r,
            GameResponse::Encounter {
                status: EncounterStatus::Error
            }
        );
    }
}
