//! Observer interface injected into the components that notify the UI.

use crate::protocol::Initialized;
use crate::types::{LatLng, OwnedPokemon, Pokestop, Position, WildPokemon};

/// Named notifications.  All are fire-and-forget: implementations must not
/// block and must swallow their own delivery failures.
pub trait Observer: Send + Sync {
    fn initialized(&self, _payload: &Initialized) {}
    fn position(&self, _position: &Position) {}
    /// Current position followed by the remaining waypoints.
    fn route(&self, _route: &[LatLng]) {}
    fn pokestops(&self, _stops: &[Pokestop]) {}
    fn pokestop_visited(&self, _stop: &Pokestop) {}
    fn pokemon_encountered(&self, _pokemon: &WildPokemon) {}
    fn pokemon_caught(&self, _pokemon: &OwnedPokemon) {}
}

/// Drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl Observer for NullObserver {}
