//! Ball selection and throw parameters.
//!
//! Throws fall into four tiers picked by one uniform draw in `[0, 1)`
//! against cumulative cutoffs (highest first).  The three bonus tiers hit
//! the centre of the target; the baseline tier does not.
//!
//! | Draw        | Tier      | Reticle size | Hit position |
//! |-------------|-----------|--------------|--------------|
//! | `> 0.9`     | excellent | 1.70 – 1.95  | 1.0          |
//! | `> 0.8`     | great     | 1.30 – 1.70  | 1.0          |
//! | `> 0.7`     | nice      | 1.00 – 1.30  | 1.0          |
//! | otherwise   | normal    | 1.25 – 1.95  | 0.0          |

use crate::state::Inventory;
use crate::types::items::CATCH_BALLS;
use rand::Rng;

/// Upper bound of the spin modifier draw.
pub const MAX_SPIN_MODIFIER: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrowTier {
    Excellent,
    Great,
    Nice,
    Normal,
}

impl ThrowTier {
    pub fn from_draw(draw: f64) -> Self {
        if draw > 0.9 {
            ThrowTier::Excellent
        } else if draw > 0.8 {
            ThrowTier::Great
        } else if draw > 0.7 {
            ThrowTier::Nice
        } else {
            ThrowTier::Normal
        }
    }

    /// Half-open reticle-size range `[lo, hi)` for this tier.
    pub fn reticle_range(self) -> (f64, f64) {
        match self {
            ThrowTier::Excellent => (1.70, 1.95),
            ThrowTier::Great => (1.30, 1.70),
            ThrowTier::Nice => (1.00, 1.30),
            ThrowTier::Normal => (1.25, 1.95),
        }
    }

    pub fn hit_position(self) -> f64 {
        match self {
            ThrowTier::Normal => 0.0,
            _ => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThrowParameters {
    pub ball: u32,
    pub tier: ThrowTier,
    pub reticle_size: f64,
    pub hit: bool,
    pub spin_modifier: f64,
    pub normalized_hit_position: f64,
}

/// First catch-capable item held, by priority.
pub fn select_ball(inventory: &Inventory) -> Option<u32> {
    CATCH_BALLS
        .iter()
        .copied()
        .find(|&id| inventory.count(id) > 0)
}

pub fn draw_throw<R: Rng + ?Sized>(ball: u32, rng: &mut R) -> ThrowParameters {
    let tier = ThrowTier::from_draw(rng.gen::<f64>());
    let (lo, hi) = tier.reticle_range();
    ThrowParameters {
        ball,
        tier,
        reticle_size: rng.gen_range(lo..hi),
        hit: true,
        spin_modifier: rng.gen_range(0.0..MAX_SPIN_MODIFIER),
        normalized_hit_position: tier.hit_position(),
    }
}
