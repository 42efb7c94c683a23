//! Action dispatcher – opportunistic actions against the world snapshot.
//!
//! ## Families
//!
//! | Step                   | Remote call               | Post-step delay     |
//! |------------------------|---------------------------|---------------------|
//! | stop visit             | `fort_search`             | `delays.spin`       |
//! | encounter              | `encounter`               | `delays.encounter`  |
//! | catch                  | `catch_pokemon`           | –                   |
//! | deferred action        | level-up / release / evolve | per action        |
//! | incubator dispatch     | `use_item_egg_incubator`  | –                   |
//!
//! Every step is awaited before the next one is issued: there is never more
//! than one call in flight for the session.  Local inventory changes are only
//! applied when the same batch did not already carry a confirmed inventory.

use crate::api;
use crate::client::{
    ActionResult, CatchStatus, EncounterStatus, FortSearchStatus, GameCall, GameClient,
    GameResponse,
};
use crate::error::RemoteError;
use crate::geo;
use crate::observer::Observer;
use crate::state::SessionState;
use crate::throw;
use crate::types::{
    items, now_ms, scaled_delay, BotConfig, EncounterRecord, OwnedPokemon, PendingAction,
    WildPokemon,
};
use log::{debug, info, warn};
use rand::Rng;
use std::collections::HashSet;

/// Sleep `base_secs` scaled by a random factor in `[0.9, 1.1]`.
pub async fn pace<R: Rng + ?Sized>(base_secs: f64, rng: &mut R) {
    let delay = scaled_delay(base_secs, rng.gen_range(0.9..=1.1));
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// Borrowed view over the collaborators a dispatch round needs.
pub struct Dispatcher<'a> {
    client: &'a dyn GameClient,
    observer: &'a dyn Observer,
    config: &'a BotConfig,
}

impl<'a> Dispatcher<'a> {
    pub fn new(client: &'a dyn GameClient, observer: &'a dyn Observer, config: &'a BotConfig) -> Self {
        Self {
            client,
            observer,
            config,
        }
    }

    /// Run one batch consisting of `call` plus the standard trailing calls.
    /// Returns the primary response and whether inventory was confirmed.
    async fn call(
        &self,
        state: &mut SessionState,
        call: GameCall,
    ) -> Result<(Option<GameResponse>, bool), RemoteError> {
        let mut batch = self.client.start_batch();
        batch.add(call);
        api::always(&mut batch);
        let responses = self.client.submit(batch).await?;
        let parsed = api::parse(state, responses)?;
        let synced = parsed.inventory_synced;
        Ok((parsed.primary(), synced))
    }

    // -----------------------------------------------------------------------
    // Opportunistic round
    // -----------------------------------------------------------------------

    /// Everything that follows a world refresh: stop visits, the encounter
    /// pipeline and, by chance, incubator dispatch.
    pub async fn opportunistic<R: Rng + ?Sized>(
        &self,
        state: &mut SessionState,
        rng: &mut R,
    ) -> Result<(), RemoteError> {
        self.spin_pokestops(state, rng).await?;
        self.encounter_pokemons(state, rng).await?;
        if rng.gen_bool(self.config.incubator_chance.clamp(0.0, 1.0)) {
            self.dispatch_incubators(state).await?;
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Stops
    // -----------------------------------------------------------------------

    /// Visit every stop in range that is neither cooling down nor already
    /// visited.  Returns how many visits succeeded.
    pub async fn spin_pokestops<R: Rng + ?Sized>(
        &self,
        state: &mut SessionState,
        rng: &mut R,
    ) -> Result<usize, RemoteError> {
        let now = now_ms();
        let here = state.position.latlng();
        let eligible: Vec<String> = state
            .world
            .pokestops
            .iter()
            .filter(|s| !s.visited && !s.on_cooldown(now))
            .filter(|s| geo::distance(here, s.location()) <= self.config.interaction_range_m)
            .map(|s| s.id.clone())
            .collect();

        let mut spun = 0;
        for id in eligible {
            let Some(stop) = state.world.pokestop(&id).cloned() else {
                continue;
            };

            let call = GameCall::FortSearch {
                fort_id: stop.id.clone(),
                fort_latitude: stop.latitude,
                fort_longitude: stop.longitude,
            };
            let (response, synced) = self.call(state, call).await?;

            match response {
                Some(GameResponse::FortSearch {
                    result: FortSearchStatus::Success,
                    items_awarded,
                    experience_awarded,
                    cooldown_complete_ms,
                }) => {
                    if !synced {
                        state.inventory.credit(&items_awarded);
                    }
                    if let Some(s) = state.world.pokestop_mut(&id) {
                        s.visited = true;
                        s.cooldown_complete_ms = cooldown_complete_ms;
                        self.observer.pokestop_visited(s);
                    }
                    info!(
                        "Stop {} visited: {} item stacks, {} xp",
                        id,
                        items_awarded.len(),
                        experience_awarded
                    );
                    spun += 1;
                }
                Some(GameResponse::FortSearch {
                    result: FortSearchStatus::InCooldownPeriod,
                    cooldown_complete_ms,
                    ..
                }) => {
                    warn!("Stop {} is cooling down", id);
                    if let Some(s) = state.world.pokestop_mut(&id) {
                        s.cooldown_complete_ms = cooldown_complete_ms;
                    }
                }
                Some(GameResponse::FortSearch { result, .. }) => {
                    warn!("Stop {} visit failed: {:?}", id, result);
                }
                other => warn!("Unexpected response to stop visit: {:?}", other),
            }

            pace(self.config.delays.spin, rng).await;
        }
        Ok(spun)
    }

    // -----------------------------------------------------------------------
    // Encounter / catch pipeline
    // -----------------------------------------------------------------------

    /// Creatures in the snapshot that have not been attempted yet, each id
    /// once, in snapshot order.
    pub fn encounter_candidates(state: &SessionState) -> Vec<WildPokemon> {
        let mut seen = HashSet::new();
        state
            .world
            .wild_pokemons
            .iter()
            .filter(|p| !state.encountered.contains(&p.encounter_id))
            .filter(|p| seen.insert(p.encounter_id))
            .cloned()
            .collect()
    }

    /// Encounter (and optionally catch) every candidate, one at a time.
    pub async fn encounter_pokemons<R: Rng + ?Sized>(
        &self,
        state: &mut SessionState,
        rng: &mut R,
    ) -> Result<(), RemoteError> {
        for pokemon in Self::encounter_candidates(state) {
            let record = self.encounter(state, &pokemon).await?;
            pace(self.config.delays.encounter, rng).await;

            if let Some(record) = record {
                if self.config.catch_pokemon {
                    self.catch_pokemon(state, &record, rng).await?;
                }
            }
        }
        Ok(())
    }

    pub async fn encounter(
        &self,
        state: &mut SessionState,
        pokemon: &WildPokemon,
    ) -> Result<Option<EncounterRecord>, RemoteError> {
        debug!("Encounter {} ({})", pokemon.encounter_id, pokemon.pokemon_id);
        let call = GameCall::Encounter {
            encounter_id: pokemon.encounter_id,
            spawn_point_id: pokemon.spawn_point_id.clone(),
        };
        let (response, _) = self.call(state, call).await?;

        match response {
            Some(GameResponse::Encounter {
                status: EncounterStatus::Success,
            }) => {
                state.encountered.insert(pokemon.encounter_id);
                self.observer.pokemon_encountered(pokemon);
                Ok(Some(EncounterRecord {
                    encounter_id: pokemon.encounter_id,
                    spawn_point_id: pokemon.spawn_point_id.clone(),
                    pokemon_id: pokemon.pokemon_id,
                }))
            }
            Some(GameResponse::Encounter {
                status: EncounterStatus::PokemonInventoryFull,
            }) => {
                warn!("Pokemon bag full.");
                state.encountered.insert(pokemon.encounter_id);
                Ok(None)
            }
            Some(GameResponse::Encounter { status }) => {
                warn!("Error while encountering pokemon: {:?}", status);
                Ok(None)
            }
            other => {
                warn!("Unexpected response to encounter: {:?}", other);
                Ok(None)
            }
        }
    }

    /// One throw at an encountered creature.  Without a ball no call is made.
    pub async fn catch_pokemon<R: Rng + ?Sized>(
        &self,
        state: &mut SessionState,
        record: &EncounterRecord,
        rng: &mut R,
    ) -> Result<Option<CatchStatus>, RemoteError> {
        let Some(ball) = throw::select_ball(&state.inventory) else {
            warn!("No pokeball to catch pokemon {}", record.pokemon_id);
            return Ok(None);
        };

        let t = throw::draw_throw(ball, rng);
        debug!(
            "Throwing ball {} ({:?}, reticle {:.2}, spin {:.2})",
            ball, t.tier, t.reticle_size, t.spin_modifier
        );
        let call = GameCall::CatchPokemon {
            encounter_id: record.encounter_id,
            pokeball: t.ball,
            normalized_reticle_size: t.reticle_size,
            spawn_point_id: record.spawn_point_id.clone(),
            hit_pokemon: t.hit,
            spin_modifier: t.spin_modifier,
            normalized_hit_position: t.normalized_hit_position,
        };
        let (response, synced) = self.call(state, call).await?;

        match response {
            Some(GameResponse::CatchPokemon {
                status,
                captured_pokemon_id,
            }) => {
                if !synced {
                    state.inventory.consume(ball);
                }
                if status == CatchStatus::Success {
                    let caught = state
                        .inventory
                        .pokemon
                        .iter()
                        .find(|p| p.id == captured_pokemon_id)
                        .cloned()
                        .unwrap_or(OwnedPokemon {
                            id: captured_pokemon_id,
                            pokemon_id: record.pokemon_id,
                            cp: 0,
                            favorite: false,
                        });
                    if !synced {
                        state.inventory.pokemon.push(caught.clone());
                    }
                    info!("Pokemon {} caught", record.pokemon_id);
                    self.observer.pokemon_caught(&caught);
                } else {
                    info!("Pokemon {} missed ({:?})", record.pokemon_id, status);
                }
                Ok(Some(status))
            }
            other => {
                warn!("Unexpected response to catch: {:?}", other);
                Ok(None)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Deferred queue
    // -----------------------------------------------------------------------

    /// Pop and run at most one pending action.
    pub async fn process_pending<R: Rng + ?Sized>(
        &self,
        state: &mut SessionState,
        rng: &mut R,
    ) -> Result<Option<PendingAction>, RemoteError> {
        let Some(action) = state.pending.pop_front() else {
            return Ok(None);
        };
        info!("Running pending action {}", action.name());

        match &action {
            PendingAction::LevelUp => {
                let level = state.inventory.player.level;
                let (response, synced) = self.call(state, GameCall::LevelUpRewards { level }).await?;
                match response {
                    Some(GameResponse::LevelUpRewards {
                        result: ActionResult::Success,
                        items_awarded,
                    }) => {
                        if !synced {
                            state.inventory.credit(&items_awarded);
                        }
                        info!("Level {} rewards claimed", level);
                    }
                    other => warn!("Level-up reward claim failed: {:?}", other),
                }
                pace(self.config.delays.level_up, rng).await;
            }
            PendingAction::ReleasePokemon { pokemon_ids } => {
                let call = GameCall::ReleasePokemon {
                    pokemon_ids: pokemon_ids.clone(),
                };
                let (response, synced) = self.call(state, call).await?;
                match response {
                    Some(GameResponse::ReleasePokemon {
                        result: ActionResult::Success,
                        candy_awarded,
                    }) => {
                        if !synced {
                            state.inventory.pokemon.retain(|p| !pokemon_ids.contains(&p.id));
                        }
                        info!("Released {:?} (+{} candy)", pokemon_ids, candy_awarded);
                    }
                    other => warn!("Release failed: {:?}", other),
                }
                pace(self.config.delays.release, rng).await;
            }
            PendingAction::EvolvePokemon { pokemon_id } => {
                let call = GameCall::EvolvePokemon {
                    pokemon_id: *pokemon_id,
                };
                let (response, synced) = self.call(state, call).await?;
                match response {
                    Some(GameResponse::EvolvePokemon {
                        result: ActionResult::Success,
                        evolved_pokemon,
                    }) => {
                        if !synced {
                            state.inventory.pokemon.retain(|p| p.id != *pokemon_id);
                            state.inventory.pokemon.extend(evolved_pokemon);
                        }
                        info!("Evolved {}", pokemon_id);
                    }
                    other => warn!("Evolve failed: {:?}", other),
                }
                pace(self.config.delays.evolve, rng).await;
            }
        }
        Ok(Some(action))
    }

    // -----------------------------------------------------------------------
    // Incubators
    // -----------------------------------------------------------------------

    /// Pair idle incubators with unincubated eggs, shortest hatch distance
    /// first.  Unlimited incubators are used before basic ones.
    pub fn incubator_assignments(state: &SessionState) -> Vec<(String, u64)> {
        let mut incubators: Vec<_> = state
            .inventory
            .egg_incubators
            .iter()
            .filter(|i| i.is_idle())
            .collect();
        incubators.sort_by_key(|i| i.item_id != items::INCUBATOR_UNLIMITED);

        let mut eggs: Vec<_> = state
            .inventory
            .eggs
            .iter()
            .filter(|e| e.incubator_id.is_none())
            .collect();
        eggs.sort_by(|a, b| a.km_target.total_cmp(&b.km_target));

        incubators
            .into_iter()
            .zip(eggs)
            .map(|(i, e)| (i.id.clone(), e.id))
            .collect()
    }

    /// Send every assignment in a single batch.  No call when nothing pairs up.
    pub async fn dispatch_incubators(&self, state: &mut SessionState) -> Result<usize, RemoteError> {
        let assignments = Self::incubator_assignments(state);
        if assignments.is_empty() {
            debug!("No idle incubator or egg to pair");
            return Ok(0);
        }

        let mut batch = self.client.start_batch();
        for (incubator_id, egg_id) in &assignments {
            batch.add(GameCall::UseItemEggIncubator {
                incubator_id: incubator_id.clone(),
                egg_id: *egg_id,
            });
        }
        api::always(&mut batch);
        let responses = self.client.submit(batch).await?;
        let parsed = api::parse(state, responses)?;
        let synced = parsed.inventory_synced;

        let mut started = 0;
        for response in parsed.results {
            match response {
                GameResponse::UseItemEggIncubator {
                    result: ActionResult::Success,
                    egg_incubator,
                } => {
                    started += 1;
                    if let (false, Some(updated)) = (synced, egg_incubator) {
                        if let Some(egg) = state
                            .inventory
                            .eggs
                            .iter_mut()
                            .find(|e| Some(e.id) == updated.egg_id)
                        {
                            egg.incubator_id = Some(updated.id.clone());
                        }
                        if let Some(slot) = state
                            .inventory
                            .egg_incubators
                            .iter_mut()
                            .find(|i| i.id == updated.id)
                        {
                            *slot = updated;
                        }
                    }
                }
                other => warn!("Incubator start failed: {:?}", other),
            }
        }
        info!("Started {} of {} incubators", started, assignments.len());
        Ok(started)
    }
}
