//! Refresh gate tests

mod support;

#[cfg(test)]
mod tests {
    use super::support::{offset, origin};
    use roambot::refresh::{should_refresh, RefreshBaseline, RefreshThresholds};
    use std::time::{Duration, Instant};

    fn thresholds() -> RefreshThresholds {
        RefreshThresholds {
            min_interval: Duration::from_secs(10),
            max_interval: Duration::from_secs(30),
            min_distance_m: 10.0,
        }
    }

    fn baseline(at: Instant) -> RefreshBaseline {
        RefreshBaseline {
            at,
            position: origin(),
        }
    }

    #[test]
    fn first_refresh_is_always_due() {
        assert!(should_refresh(None, origin(), Instant::now(), &thresholds()));
    }

    #[test]
    fn max_interval_forces_refresh_without_movement() {
        let start = Instant::now();
        let last = baseline(start);
        assert!(!should_refresh(
            Some(&last),
            origin(),
            start + Duration::from_secs(29),
            &thresholds()
        ));
        assert!(should_refresh(
            Some(&last),
            origin(),
            start + Duration::from_secs(30),
            &thresholds()
        ));
    }

    #[test]
    fn min_interval_needs_distance_too() {
        let start = Instant::now();
        let last = baseline(start);
        let moved = offset(origin(), 15.0, 0.0);
        let barely = offset(origin(), 5.0, 0.0);
        let now = start + Duration::from_secs(12);

        assert!(should_refresh(Some(&last), moved, now, &thresholds()));
        assert!(!should_refresh(Some(&last), barely, now, &thresholds()));
    }

    #[test]
    fn distance_alone_is_not_enough_before_min_interval() {
        let start = Instant::now();
        let last = baseline(start);
        let far = offset(origin(), 500.0, 0.0);
        assert!(!should_refresh(
            Some(&last),
            far,
            start + Duration::from_secs(3),
            &thresholds()
        ));
    }

    #[test]
    fn once_due_stays_due_as_time_passes() {
        let start = Instant::now();
        let last = baseline(start);
        let moved = offset(origin(), 15.0, 0.0);
        let mut was_due = false;
        for secs in 0..60 {
            let due = should_refresh(
                Some(&last),
                moved,
                start + Duration::from_secs(secs),
                &thresholds(),
            );
            assert!(due || !was_due, "gate closed again at {secs}s");
            was_due = due;
        }
        assert!(was_due);
    }

    #[test]
    fn clock_skew_before_baseline_counts_as_no_time() {
        let start = Instant::now() + Duration::from_secs(5);
        let last = baseline(start);
        assert!(!should_refresh(
            Some(&last),
            origin(),
            Instant::now(),
            &thresholds()
        ));
    }
}
