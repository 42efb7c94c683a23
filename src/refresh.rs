//! Refresh gate for the world snapshot.
//!
//! A refresh may fire when there is no previous refresh, when the maximum
//! interval has elapsed, or when the minimum interval has elapsed *and* the
//! agent has moved at least the minimum distance since the last refresh.

use crate::api;
use crate::client::{GameCall, GameClient, GameResponse};
use crate::error::RemoteError;
use crate::geo;
use crate::state::SessionState;
use crate::types::{LatLng, MapSettings};
use log::{info, warn};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefreshThresholds {
    pub min_interval: Duration,
    pub max_interval: Duration,
    pub min_distance_m: f64,
}

impl From<&MapSettings> for RefreshThresholds {
    fn from(s: &MapSettings) -> Self {
        Self {
            min_interval: Duration::from_secs_f64(s.get_map_objects_min_refresh_seconds.max(0.0)),
            max_interval: Duration::from_secs_f64(s.get_map_objects_max_refresh_seconds.max(0.0)),
            min_distance_m: s.get_map_objects_min_distance_meters,
        }
    }
}

/// When and where the last refresh was issued.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefreshBaseline {
    pub at: Instant,
    pub position: LatLng,
}

pub fn should_refresh(
    last: Option<&RefreshBaseline>,
    current: LatLng,
    now: Instant,
    thresholds: &RefreshThresholds,
) -> bool {
    let Some(last) = last else {
        return true;
    };

    let elapsed = now.saturating_duration_since(last.at);
    if elapsed >= thresholds.max_interval {
        return true;
    }

    elapsed >= thresholds.min_interval
        && geo::distance(last.position, current) >= thresholds.min_distance_m
}

/// Gate check against the thresholds the service last sent.
pub fn is_due(state: &SessionState, now: Instant) -> bool {
    should_refresh(
        state.api.last_refresh.as_ref(),
        state.position.latlng(),
        now,
        &RefreshThresholds::from(&state.api.map_settings),
    )
}

/// Query map objects around the current position and fold them into the
/// world snapshot.  The baseline is recorded before the call goes out.
pub async fn refresh(
    state: &mut SessionState,
    client: &dyn GameClient,
    now: Instant,
) -> Result<(), RemoteError> {
    let here = state.position.latlng();
    info!("Map refresh at {}", here);

    state.api.last_refresh = Some(RefreshBaseline {
        at: now,
        position: here,
    });

    let mut batch = client.start_batch();
    batch.add(GameCall::GetMapObjects {
        latitude: here.lat,
        longitude: here.lng,
    });
    api::always(&mut batch);

    let responses = client.submit(batch).await?;
    match api::parse(state, responses)?.primary() {
        Some(GameResponse::GetMapObjects(objects)) => {
            state.world.apply_map_objects(objects);
        }
        other => warn!("Unexpected response to map query: {:?}", other),
    }
    Ok(())
}
