use crate::config::discovery_weights::*;
use crate::config::MARKET_RANK_CUTOFF;

use super::clamp_score;

/// Final 0-100 discovery score. The weighted terms leave headroom that the bonuses
/// can overflow; clamping absorbs the excess.
pub fn discovery_score(
    momentum_score: i64,
    rs_score: i64,
    market_cap_rank: Option<i64>,
    is_outperformer: bool,
    trend_score: f64,
) -> i64 {
    let mut score = momentum_score as f64 * MOMENTUM + rs_score as f64 * RELATIVE_STRENGTH;

    if market_cap_rank.is_some_and(|rank| rank > MARKET_RANK_CUTOFF) {
        score += SMALL_CAP_BONUS;
    }
    if is_outperformer {
        score += OUTPERFORMER_BONUS;
    }
    if trend_score > TREND_BONUS_MIN {
        score += TREND_BONUS;
    }

    clamp_score(score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_terms_only() {
        // 60·0.4 + 50·0.3 = 39
        assert_eq!(discovery_score(60, 50, Some(5), false, 0.0), 39);
    }

    #[test]
    fn bonuses_stack_and_clamp() {
        // 100·0.4 + 100·0.3 + 30 = 100
        assert_eq!(discovery_score(100, 100, Some(250), true, 4.5), 100);
        // 90·0.4 + 90·0.3 + 30 = 93
        assert_eq!(discovery_score(90, 90, Some(250), true, 4.5), 93);
    }

    #[test]
    fn bonus_boundaries() {
        // rank exactly 100 and trend exactly 2 earn nothing
        assert_eq!(discovery_score(50, 50, Some(100), false, 2.0), 35);
        // unranked assets get no small-cap bonus
        assert_eq!(discovery_score(50, 50, None, false, 0.0), 35);
        assert_eq!(discovery_score(50, 50, Some(101), false, 2.1), 55);
    }
}
