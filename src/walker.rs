//! Location simulator: route planning toward the nearest eligible stop,
//! per-tick interpolation with speed jitter, and positional fuzz.

use crate::client::{MappingService, RouteLeg};
use crate::error::MappingError;
use crate::geo;
use crate::state::{Route, SessionState};
use crate::types::{LatLng, Pokestop};
use log::{debug, info, warn};
use rand::Rng;
use std::collections::VecDeque;

/// A waypoint closer than this (metres) counts as reached.
pub const WAYPOINT_ARRIVAL_M: f64 = 5.0;

/// Maximum per-axis positional fuzz, in degrees.
pub const FUZZ_DEGREES: f64 = 0.0000009;

/// Relative walking-speed jitter applied every step.
pub const SPEED_JITTER: f64 = 0.1;

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Nearest stop that is neither visited, reached nor cooling down.
/// Ties keep list order.
pub fn find_next_target(from: LatLng, stops: &[Pokestop], now_ms: u64) -> Option<&Pokestop> {
    let mut best: Option<(&Pokestop, f64)> = None;
    for stop in stops
        .iter()
        .filter(|s| !s.visited && !s.reached && !s.on_cooldown(now_ms))
    {
        let d = geo::distance(from, stop.location());
        match best {
            Some((_, best_d)) if d >= best_d => {}
            _ => best = Some((stop, d)),
        }
    }
    best.map(|(stop, _)| stop)
}

/// Step end-points of every leg, in order, then the target itself.
pub fn flatten_legs(legs: &[RouteLeg], target: LatLng) -> VecDeque<LatLng> {
    let mut waypoints: VecDeque<LatLng> = legs
        .iter()
        .flat_map(|leg| leg.steps.iter().map(|s| s.end_location))
        .collect();
    waypoints.push_back(target);
    waypoints
}

/// Plan a walking route to the nearest eligible stop.  Returns an idle
/// (empty) route when there is nowhere to go.
pub async fn plan_route(
    from: LatLng,
    stops: &[Pokestop],
    now_ms: u64,
    mapping: &dyn MappingService,
) -> Result<Route, MappingError> {
    let Some(target) = find_next_target(from, stops, now_ms) else {
        debug!("No stop to go to, holding position");
        return Ok(Route::idle());
    };

    let legs = mapping.route(from, target.location()).await?;
    let waypoints = flatten_legs(&legs, target.location());
    info!(
        "New route to stop {} ({} waypoints, {:.0}m)",
        target.id,
        waypoints.len(),
        geo::distance(from, target.location())
    );

    Ok(Route {
        waypoints,
        target: Some(target.id.clone()),
    })
}

/// Keep the current route, or plan a new one when it ran out or its target
/// has already been handled.  Returns `true` when a non-empty route was
/// planned this call.
pub async fn check_path(
    state: &mut SessionState,
    mapping: &dyn MappingService,
    now_ms: u64,
) -> Result<bool, MappingError> {
    let target_handled = state
        .route
        .target
        .as_deref()
        .and_then(|id| state.world.pokestop(id))
        .map(|s| s.visited || s.reached)
        .unwrap_or(false);

    if !state.route.is_empty() && !target_handled {
        return Ok(false);
    }

    if state.route.is_empty() {
        if let Some(id) = state.route.target.take() {
            if let Some(stop) = state.world.pokestop_mut(&id) {
                debug!("Arrived at stop {}", id);
                stop.reached = true;
            }
        }
    }

    state.route = Route::idle();
    let from = state.position.latlng();
    state.route = plan_route(from, &state.world.pokestops, now_ms, mapping).await?;
    Ok(!state.route.is_empty())
}

// ---------------------------------------------------------------------------
// Movement
// ---------------------------------------------------------------------------

/// Whether a waypoint `distance_m` away counts as reached.
pub fn arrived(distance_m: f64) -> bool {
    distance_m <= WAYPOINT_ARRIVAL_M
}

/// Pop the head waypoint if `at` is within [`WAYPOINT_ARRIVAL_M`] of it.
pub fn pop_if_arrived(route: &mut Route, at: LatLng) -> bool {
    match route.next() {
        Some(next) if arrived(geo::distance(at, next)) => {
            route.waypoints.pop_front();
            true
        }
        _ => false,
    }
}

/// Move one step toward the next waypoint.  No-op without waypoints.
pub fn advance<R: Rng + ?Sized>(
    state: &mut SessionState,
    speed_kmh: f64,
    rng: &mut R,
) -> Option<LatLng> {
    let dest = state.route.next()?;

    let speed = speed_kmh * (1.0 + rng.gen_range(-SPEED_JITTER..=SPEED_JITTER));
    let speed_ms = speed / 3.6;
    if speed_ms <= 0.0 {
        warn!("Walking speed is {:.2}km/h, not moving", speed);
        return None;
    }

    let from = state.position.latlng();
    let steps = (geo::distance(from, dest) / speed_ms).max(1.0);
    let stepped = LatLng::new(
        from.lat + (dest.lat - from.lat) / steps,
        from.lng + (dest.lng - from.lng) / steps,
    );
    let next = fuzz(stepped, rng);

    state.position = state.position.moved_to(next);
    pop_if_arrived(&mut state.route, next);
    Some(next)
}

/// Independently jitter latitude and longitude by up to [`FUZZ_DEGREES`].
pub fn fuzz<R: Rng + ?Sized>(p: LatLng, rng: &mut R) -> LatLng {
    LatLng::new(
        geo::round14(p.lat + geo::round14(rng.gen_range(-FUZZ_DEGREES..=FUZZ_DEGREES))),
        geo::round14(p.lng + geo::round14(rng.gen_range(-FUZZ_DEGREES..=FUZZ_DEGREES))),
    )
}

/// Elevation at `at`, or 0 when the lookup fails.
pub async fn elevation(mapping: &dyn MappingService, at: LatLng) -> f64 {
    match mapping.elevation(at).await {
        Ok(alt) => alt,
        Err(e) => {
            warn!("Unable to get altitude: {}", e);
            0.0
        }
    }
}
