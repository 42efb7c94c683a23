//! Walker tests

mod support;

#[cfg(test)]
mod tests {
    use super::support::{offset, origin, stop_at, FakeMapping};
    use roambot::client::{RouteLeg, RouteStep};
    use roambot::geo;
    use roambot::state::{Route, SessionState};
    use roambot::types::{now_ms, LatLng, Position};
    use roambot::walker::{self, FUZZ_DEGREES, WAYPOINT_ARRIVAL_M};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use roambot::error::MappingError;
    use tokio_test::{assert_err, assert_ok};

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    // -----------------------------------------------------------------------
    // Fuzz
    // -----------------------------------------------------------------------

    #[test]
    fn fuzz_stays_within_bound_on_each_axis() {
        let mut rng = rng();
        let p = origin();
        for _ in 0..10_000 {
            let q = walker::fuzz(p, &mut rng);
            assert!((q.lat - p.lat).abs() <= FUZZ_DEGREES + 1e-13);
            assert!((q.lng - p.lng).abs() <= FUZZ_DEGREES + 1e-13);
        }
    }

    #[test]
    fn fuzz_moves_axes_independently() {
        let mut rng = rng();
        let p = origin();
        let moved_differently = (0..100)
            .map(|_| walker::fuzz(p, &mut rng))
            .any(|q| (q.lat - p.lat) != (q.lng - p.lng));
        assert!(moved_differently);
    }

    // -----------------------------------------------------------------------
    // Waypoints
    // -----------------------------------------------------------------------

    #[test]
    fn arrival_distance_is_inclusive() {
        assert!(walker::arrived(WAYPOINT_ARRIVAL_M));
        assert!(walker::arrived(0.0));
        let just_over = f64::from_bits(WAYPOINT_ARRIVAL_M.to_bits() + 1);
        assert!(!walker::arrived(just_over));
    }

    #[test]
    fn waypoint_inside_arrival_distance_is_popped() {
        let at = origin();
        let mut route = Route::default();
        route
            .waypoints
            .push_back(offset(at, WAYPOINT_ARRIVAL_M - 0.01, 0.0));
        assert!(walker::pop_if_arrived(&mut route, at));
        assert!(route.is_empty());
    }

    #[test]
    fn waypoint_just_beyond_arrival_distance_is_kept() {
        let at = origin();
        let mut route = Route::default();
        route
            .waypoints
            .push_back(offset(at, WAYPOINT_ARRIVAL_M + 0.01, 0.0));
        assert!(!walker::pop_if_arrived(&mut route, at));
        assert_eq!(route.waypoints.len(), 1);
    }

    #[test]
    fn legs_flatten_to_step_ends_then_target() {
        let a = LatLng::new(1.0, 1.0);
        let b = LatLng::new(2.0, 2.0);
        let c = LatLng::new(3.0, 3.0);
        let target = LatLng::new(4.0, 4.0);
        let legs = vec![
            RouteLeg {
                steps: vec![RouteStep { end_location: a }, RouteStep { end_location: b }],
            },
            RouteLeg {
                steps: vec![RouteStep { end_location: c }],
            },
        ];
        let flat: Vec<_> = walker::flatten_legs(&legs, target).into_iter().collect();
        assert_eq!(flat, vec![a, b, c, target]);
    }

    // -----------------------------------------------------------------------
    // Targeting
    // -----------------------------------------------------------------------

    #[test]
    fn nearest_eligible_stop_is_chosen() {
        let mut visited = stop_at("visited", 5.0, 0.0);
        visited.visited = true;
        let mut reached = stop_at("reached", 6.0, 0.0);
        reached.reached = true;
        let mut cooling = stop_at("cooling", 7.0, 0.0);
        cooling.cooldown_complete_ms = now_ms() + 60_000;
        let stops = vec![
            visited,
            reached,
            cooling,
            stop_at("far", 80.0, 0.0),
            stop_at("near", 0.0, 30.0),
        ];

        let target = walker::find_next_target(origin(), &stops, now_ms()).unwrap();
        assert_eq!(target.id, "near");
    }

    #[test]
    fn equidistant_stops_keep_list_order() {
        let stops = vec![stop_at("first", 20.0, 0.0), stop_at("second", -20.0, 0.0)];
        let target = walker::find_next_target(origin(), &stops, now_ms()).unwrap();
        assert_eq!(target.id, "first");
    }

    #[test]
    fn expired_cooldown_is_eligible_again() {
        let mut stop = stop_at("s", 10.0, 0.0);
        stop.cooldown_complete_ms = 1;
        let stops = [stop];
        assert!(walker::find_next_target(origin(), &stops, now_ms()).is_some());
    }

    #[test]
    fn nothing_eligible_plans_idle_route_without_mapping_call() {
        let mapping = FakeMapping::default();
        let mut done = stop_at("done", 10.0, 0.0);
        done.visited = true;

        let route = assert_ok!(tokio_test::block_on(walker::plan_route(
            origin(),
            &[done],
            now_ms(),
            &mapping,
        )));

        assert!(route.is_empty());
        assert_eq!(route.target, None);
        assert_eq!(mapping.route_call_count(), 0);
    }

    #[test]
    fn planned_route_ends_at_the_target() {
        let mapping = FakeMapping::default();
        let mid = offset(origin(), 20.0, 0.0);
        mapping.legs.lock().unwrap().push_back(Ok(vec![RouteLeg {
            steps: vec![RouteStep { end_location: mid }],
        }]));
        let stop = stop_at("s", 40.0, 0.0);

        let route = assert_ok!(tokio_test::block_on(walker::plan_route(
            origin(),
            std::slice::from_ref(&stop),
            now_ms(),
            &mapping,
        )));

        assert_eq!(route.target.as_deref(), Some("s"));
        assert_eq!(route.waypoints.len(), 2);
        assert_eq!(route.waypoints.back().copied(), Some(stop.location()));
        assert_eq!(mapping.route_call_count(), 1);
    }

    #[test]
    fn exhausted_route_marks_target_reached_and_replans() {
        let mapping = FakeMapping::default();
        let mut state = SessionState::new(Position::from(origin()));
        state.world.pokestops = vec![stop_at("a", 2.0, 0.0), stop_at("b", 50.0, 0.0)];
        state.route.target = Some("a".into());

        let planned = assert_ok!(tokio_test::block_on(walker::check_path(
            &mut state,
            &mapping,
            now_ms()
        )));

        assert!(planned);
        assert!(state.world.pokestop("a").unwrap().reached);
        assert_eq!(state.route.target.as_deref(), Some("b"));
    }

    #[test]
    fn visited_target_with_waypoints_left_replans_to_next_stop() {
        let mapping = FakeMapping::default();
        let mut state = SessionState::new(Position::from(origin()));
        let mut a = stop_at("a", 50.0, 0.0);
        a.visited = true;
        state.world.pokestops = vec![a, stop_at("b", 80.0, 0.0)];
        state.route.target = Some("a".into());
        state.route.waypoints.push_back(offset(origin(), 25.0, 0.0));
        state.route.waypoints.push_back(offset(origin(), 50.0, 0.0));

        let planned = assert_ok!(tokio_test::block_on(walker::check_path(
            &mut state,
            &mapping,
            now_ms()
        )));

        assert!(planned);
        assert_eq!(state.route.target.as_deref(), Some("b"));
        assert!(!state.world.pokestop("a").unwrap().reached);
        assert_eq!(
            state.route.waypoints.back().copied(),
            Some(state.world.pokestop("b").unwrap().location())
        );
        assert_eq!(mapping.route_call_count(), 1);
    }

    #[test]
    fn route_is_kept_while_target_is_pending() {
        let mapping = FakeMapping::default();
        let mut state = SessionState::new(Position::from(origin()));
        state.world.pokestops = vec![stop_at("a", 50.0, 0.0)];
        state.route.target = Some("a".into());
        state.route.waypoints.push_back(offset(origin(), 25.0, 0.0));

        let planned = assert_ok!(tokio_test::block_on(walker::check_path(
            &mut state,
            &mapping,
            now_ms()
        )));

        assert!(!planned);
        assert_eq!(state.route.waypoints.len(), 1);
        assert_eq!(mapping.route_call_count(), 0);
    }

    #[test]
    fn failed_route_lookup_leaves_an_idle_route() {
        let mapping = FakeMapping::default();
        mapping
            .legs
            .lock()
            .unwrap()
            .push_back(Err(MappingError::NoRoute("closed".into())));
        let mut state = SessionState::new(Position::from(origin()));
        state.world.pokestops = vec![stop_at("a", 50.0, 0.0)];

        assert_err!(tokio_test::block_on(walker::check_path(
            &mut state,
            &mapping,
            now_ms()
        )));
        assert!(state.route.is_empty());
        assert_eq!(state.route.target, None);
    }

    // -----------------------------------------------------------------------
    // Movement
    // -----------------------------------------------------------------------

    #[test]
    fn advance_without_waypoints_is_a_no_op() {
        let mut state = SessionState::new(Position::from(origin()));
        let moved = walker::advance(&mut state, 4.6, &mut rng());
        assert_eq!(moved, None);
        assert_eq!(state.position.latlng(), origin());
    }

    #[test]
    fn advance_covers_about_one_second_of_walking() {
        let mut state = SessionState::new(Position::from(origin()));
        state.route.waypoints.push_back(offset(origin(), 100.0, 0.0));

        let next = walker::advance(&mut state, 36.0, &mut rng()).unwrap();

        // 36km/h = 10m/s, ±10% jitter, plus sub-metre fuzz.
        let covered = geo::distance(origin(), next);
        assert!((8.5..=11.5).contains(&covered), "covered {covered}m");
        assert_eq!(state.position.altitude, None);
        assert_eq!(state.route.waypoints.len(), 1);
    }

    #[test]
    fn close_waypoint_is_reached_in_one_step() {
        let mut state = SessionState::new(Position::from(origin()));
        let wp = offset(origin(), 2.0, 0.0);
        state.route.waypoints.push_back(wp);

        walker::advance(&mut state, 36.0, &mut rng());

        assert!(geo::distance(state.position.latlng(), wp) < 1.0);
        assert!(state.route.is_empty());
    }
}
