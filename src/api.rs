//! Batch helpers: the standard trailing calls every request carries, and
//! the parse step that folds responses into [`SessionState`].

use crate::client::{Batch, GameCall, GameResponse};
use crate::error::RemoteError;
use crate::state::SessionState;
use crate::types::PendingAction;
use log::{debug, info};

/// Append the trailing calls used during bootstrap.
pub fn always_init(batch: &mut Batch) -> &mut Batch {
    batch
        .add(GameCall::CheckChallenge)
        .add(GameCall::GetHatchedEggs)
        .add(GameCall::GetInventory)
        .add(GameCall::CheckAwardedBadges)
        .add(GameCall::DownloadSettings)
}

/// Append the trailing calls used once the session is running.
pub fn always(batch: &mut Batch) -> &mut Batch {
    always_init(batch).add(GameCall::GetBuddyWalked)
}

/// Result of folding a batch into state: the responses the caller asked
/// for, in call order, with the trailing ones removed.
#[derive(Debug, Default)]
pub struct Parsed {
    pub results: Vec<GameResponse>,
    /// The batch carried a confirmed inventory; callers must not apply
    /// their own local inventory changes on top of it.
    pub inventory_synced: bool,
}

impl Parsed {
    pub fn primary(self) -> Option<GameResponse> {
        self.results.into_iter().next()
    }
}

/// Apply every response to `state`.
///
/// A challenge flag aborts with [`RemoteError::ChallengeRequired`] after
/// the preceding responses have been applied.
pub fn parse(state: &mut SessionState, responses: Vec<GameResponse>) -> Result<Parsed, RemoteError> {
    let mut parsed = Parsed::default();

    for response in responses {
        match response {
            GameResponse::CheckChallenge {
                show_challenge,
                challenge_url,
            } => {
                if show_challenge {
                    return Err(RemoteError::ChallengeRequired { url: challenge_url });
                }
            }
            GameResponse::GetHatchedEggs { pokemon_ids } => {
                if !pokemon_ids.is_empty() {
                    info!("Eggs hatched: {:?}", pokemon_ids);
                }
            }
            GameResponse::GetInventory(snapshot) => {
                let before = state.inventory.player.level;
                state.inventory.apply_snapshot(snapshot);
                parsed.inventory_synced = true;
                let after = state.inventory.player.level;
                if before > 0 && after > before {
                    info!("Level up {} -> {}", before, after);
                    state.enqueue(PendingAction::LevelUp);
                }
            }
            GameResponse::CheckAwardedBadges { badges } => {
                if !badges.is_empty() {
                    debug!("Badges awarded: {:?}", badges);
                }
            }
            GameResponse::DownloadSettings { map_settings } => {
                if let Some(settings) = map_settings {
                    state.api.map_settings = settings;
                }
            }
            GameResponse::GetBuddyWalked => {}

            GameResponse::GetPlayer(profile) => {
                state.player = profile.clone();
                parsed.results.push(GameResponse::GetPlayer(profile));
            }
            GameResponse::DownloadRemoteConfigVersion {
                item_templates_timestamp_ms,
            } => {
                state.api.item_templates_timestamp_ms = item_templates_timestamp_ms;
                parsed.results.push(GameResponse::DownloadRemoteConfigVersion {
                    item_templates_timestamp_ms,
                });
            }
            GameResponse::DownloadItemTemplates {
                timestamp_ms,
                templates,
            } => {
                debug!("Received {} item templates", templates.len());
                state.api.item_templates = templates;
                parsed.results.push(GameResponse::DownloadItemTemplates {
                    timestamp_ms,
                    templates: Vec::new(),
                });
            }
            other => parsed.results.push(other),
        }
    }

    Ok(parsed)
}
