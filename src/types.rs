//! Core agent types shared across all modules.

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

/// A bare latitude/longitude pair (route waypoints, entity locations).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl std::fmt::Display for LatLng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.lat, self.lng)
    }
}

/// Where the agent currently is.  Altitude is filled in once the mapping
/// service has answered for this position.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub lat: f64,
    pub lng: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
}

impl Position {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            altitude: None,
        }
    }

    pub fn latlng(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }

    /// Move to `to`, dropping the altitude (it belongs to the old spot).
    pub fn moved_to(&self, to: LatLng) -> Self {
        Self::new(to.lat, to.lng)
    }
}

impl From<LatLng> for Position {
    fn from(p: LatLng) -> Self {
        Self::new(p.lat, p.lng)
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.altitude {
            Some(alt) => write!(f, "({:.6}, {:.6}, {:.1}m)", self.lat, self.lng, alt),
            None => write!(f, "({:.6}, {:.6})", self.lat, self.lng),
        }
    }
}

// ---------------------------------------------------------------------------
// Map entities
// ---------------------------------------------------------------------------

/// A stationary point of interest.  Visitable once per cooldown.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pokestop {
    pub id: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Epoch millis at which the server-side cooldown ends (0 = none).
    #[serde(default)]
    pub cooldown_complete_ms: u64,
    /// Spun successfully during this session.  Set locally, survives merges.
    #[serde(default)]
    pub visited: bool,
    /// Arrived at as a route target.  Set locally, survives merges.
    #[serde(default)]
    pub reached: bool,
}

impl Pokestop {
    pub fn location(&self) -> LatLng {
        LatLng::new(self.latitude, self.longitude)
    }

    pub fn on_cooldown(&self, now_ms: u64) -> bool {
        self.cooldown_complete_ms > now_ms
    }
}

/// An ephemeral encounterable creature.  Disappears after its TTL or once
/// acted on; the whole set is replaced on every world refresh.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WildPokemon {
    pub encounter_id: u64,
    pub spawn_point_id: String,
    pub pokemon_id: u32,
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub expiration_ms: u64,
}

/// Ties an encountered creature to its spawn.  Produced by a successful
/// encounter and consumed by the catch step of the same pipeline item.
#[derive(Debug, Clone, PartialEq)]
pub struct EncounterRecord {
    pub encounter_id: u64,
    pub spawn_point_id: String,
    pub pokemon_id: u32,
}

// ---------------------------------------------------------------------------
// Inventory records
// ---------------------------------------------------------------------------

/// Item ids the agent cares about.
pub mod items {
    pub const POKE_BALL: u32 = 1;
    pub const GREAT_BALL: u32 = 2;
    pub const ULTRA_BALL: u32 = 3;
    pub const MASTER_BALL: u32 = 4;

    /// Catch-capable items, in the order they are spent.
    pub const CATCH_BALLS: [u32; 4] = [POKE_BALL, GREAT_BALL, ULTRA_BALL, MASTER_BALL];

    pub const INCUBATOR_UNLIMITED: u32 = 901;
    pub const INCUBATOR_BASIC: u32 = 902;
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ItemStack {
    pub item_id: u32,
    pub count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OwnedPokemon {
    pub id: u64,
    pub pokemon_id: u32,
    #[serde(default)]
    pub cp: u32,
    #[serde(default)]
    pub favorite: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Egg {
    pub id: u64,
    /// Distance this egg needs to be walked before hatching.
    pub km_target: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incubator_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EggIncubator {
    pub id: String,
    pub item_id: u32,
    /// Remaining uses; ignored for the unlimited incubator.
    #[serde(default)]
    pub uses_remaining: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub egg_id: Option<u64>,
}

impl EggIncubator {
    pub fn is_idle(&self) -> bool {
        self.egg_id.is_none()
            && (self.item_id == items::INCUBATOR_UNLIMITED || self.uses_remaining > 0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Candy {
    pub family_id: u32,
    pub candy: u32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct PlayerStats {
    pub level: u32,
    #[serde(default)]
    pub experience: u64,
    #[serde(default)]
    pub km_walked: f64,
}

/// Account-level data returned by the player query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct PlayerProfile {
    pub username: String,
    #[serde(default)]
    pub max_pokemon_storage: u32,
    #[serde(default)]
    pub max_item_storage: u32,
    /// Completed tutorial steps.
    #[serde(default)]
    pub tutorial_state: Vec<u32>,
}

/// Map-object refresh thresholds.  Sent by the service; never local config.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct MapSettings {
    pub get_map_objects_min_refresh_seconds: f64,
    pub get_map_objects_max_refresh_seconds: f64,
    pub get_map_objects_min_distance_meters: f64,
}

impl Default for MapSettings {
    /// Fallback used until the first settings response arrives.
    fn default() -> Self {
        Self {
            get_map_objects_min_refresh_seconds: 10.0,
            get_map_objects_max_refresh_seconds: 30.0,
            get_map_objects_min_distance_meters: 10.0,
        }
    }
}

// ---------------------------------------------------------------------------
// Deferred actions
// ---------------------------------------------------------------------------

/// A user- or system-requested action executed one per tick.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "call", rename_all = "snake_case")]
pub enum PendingAction {
    LevelUp,
    ReleasePokemon { pokemon_ids: Vec<u64> },
    EvolvePokemon { pokemon_id: u64 },
}

impl PendingAction {
    pub fn name(&self) -> &'static str {
        match self {
            PendingAction::LevelUp => "level_up",
            PendingAction::ReleasePokemon { .. } => "release_pokemon",
            PendingAction::EvolvePokemon { .. } => "evolve_pokemon",
        }
    }
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

/// Human pacing delays, in seconds.  Each is randomised by ±10% at use.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Delays {
    pub walk: f64,
    pub encounter: f64,
    pub spin: f64,
    pub level_up: f64,
    pub release: f64,
    pub evolve: f64,
}

impl Delays {
    pub fn zero() -> Self {
        Self {
            walk: 0.0,
            encounter: 0.0,
            spin: 0.0,
            level_up: 0.0,
            release: 0.0,
            evolve: 0.0,
        }
    }
}

impl Default for Delays {
    fn default() -> Self {
        Self {
            walk: 1.0,
            encounter: 1.5,
            spin: 2.0,
            level_up: 1.0,
            release: 0.1,
            evolve: 3.0,
        }
    }
}

/// Locale + client version sent with the bootstrap calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    pub country: String,
    pub language: String,
    pub timezone: String,
    pub app_version: u32,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            country: "US".into(),
            language: "en".into(),
            timezone: "America/Chicago".into(),
            app_version: 5704,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    /// Name stamped on every observer event.
    pub session: String,
    /// Starting position.
    pub start: LatLng,
    /// Base walking speed in km/h.
    pub speed_kmh: f64,
    /// Attempt catches after successful encounters.
    pub catch_pokemon: bool,
    /// Maximum distance (m) at which a stop can be spun.
    pub interaction_range_m: f64,
    /// Probability of dispatching incubators after a world refresh.
    pub incubator_chance: f64,
    pub delays: Delays,
    pub api: ApiSettings,
    /// Fixed RNG seed; random when absent.
    pub seed: Option<u64>,
    /// Where the redacted state snapshot is written (disabled when absent).
    pub state_path: Option<String>,
    /// Where item templates are cached (disabled when absent).
    pub templates_path: Option<String>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            session: "default".into(),
            start: LatLng::new(48.8456222, 2.3364526),
            speed_kmh: 4.6,
            catch_pokemon: true,
            interaction_range_m: 38.0,
            incubator_chance: 0.3,
            delays: Delays::default(),
            api: ApiSettings::default(),
            seed: None,
            state_path: Some("data/state.json".into()),
            templates_path: Some("data/item_templates.json".into()),
        }
    }
}

/// `base` seconds scaled by `factor`, never negative.
pub fn scaled_delay(base_secs: f64, factor: f64) -> Duration {
    Duration::from_secs_f64((base_secs * factor).max(0.0))
}

/// Wall-clock epoch millis (cooldowns are expressed in server epoch time).
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
