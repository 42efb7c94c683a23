//! Throw parameter tests

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use roambot::state::Inventory;
    use roambot::throw::{draw_throw, select_ball, ThrowTier, MAX_SPIN_MODIFIER};
    use roambot::types::items;

    // -----------------------------------------------------------------------
    // Tiers
    // -----------------------------------------------------------------------

    #[test]
    fn tier_cutoffs_are_exclusive() {
        assert_eq!(ThrowTier::from_draw(0.95), ThrowTier::Excellent);
        assert_eq!(ThrowTier::from_draw(0.9), ThrowTier::Great);
        assert_eq!(ThrowTier::from_draw(0.85), ThrowTier::Great);
        assert_eq!(ThrowTier::from_draw(0.8), ThrowTier::Nice);
        assert_eq!(ThrowTier::from_draw(0.75), ThrowTier::Nice);
        assert_eq!(ThrowTier::from_draw(0.7), ThrowTier::Normal);
        assert_eq!(ThrowTier::from_draw(0.0), ThrowTier::Normal);
    }

    #[test]
    fn only_normal_throws_miss_the_centre() {
        assert_eq!(ThrowTier::Normal.hit_position(), 0.0);
        for tier in [ThrowTier::Excellent, ThrowTier::Great, ThrowTier::Nice] {
            assert_eq!(tier.hit_position(), 1.0);
        }
    }

    #[test]
    fn drawn_parameters_stay_in_their_tier_ranges() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut seen = Vec::new();
        for _ in 0..5_000 {
            let t = draw_throw(items::GREAT_BALL, &mut rng);
            let (lo, hi) = t.tier.reticle_range();
            assert!(t.reticle_size >= lo && t.reticle_size < hi, "{t:?}");
            assert!(t.spin_modifier >= 0.0 && t.spin_modifier < MAX_SPIN_MODIFIER);
            assert_eq!(t.normalized_hit_position, t.tier.hit_position());
            assert_eq!(t.ball, items::GREAT_BALL);
            assert!(t.hit);
            if !seen.contains(&t.tier) {
                seen.push(t.tier);
            }
        }
        assert_eq!(seen.len(), 4, "every tier drawn: {seen:?}");
    }

    // -----------------------------------------------------------------------
    // Ball selection
    // -----------------------------------------------------------------------

    #[test]
    fn cheapest_held_ball_is_spent_first() {
        let mut inv = Inventory::default();
        inv.items.insert(items::ULTRA_BALL, 2);
        inv.items.insert(items::GREAT_BALL, 1);
        assert_eq!(select_ball(&inv), Some(items::GREAT_BALL));

        inv.items.insert(items::POKE_BALL, 4);
        assert_eq!(select_ball(&inv), Some(items::POKE_BALL));
    }

    #[test]
    fn empty_stacks_do_not_count() {
        let mut inv = Inventory::default();
        inv.items.insert(items::POKE_BALL, 0);
        inv.items.insert(items::MASTER_BALL, 1);
        assert_eq!(select_ball(&inv), Some(items::MASTER_BALL));
    }

    #[test]
    fn no_ball_means_no_throw() {
        let mut inv = Inventory::default();
        inv.items.insert(items::INCUBATOR_BASIC, 3);
        assert_eq!(select_ball(&inv), None);
    }
}
