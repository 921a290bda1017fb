use crate::config::momentum_weights::*;

use super::clamp_score;

/// Neutral value used for any component whose input is unavailable.
pub const NEUTRAL_SCORE: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MomentumBreakdown {
    /// 0.5·1h + 0.3·4h + 0.2·24h, in percent.
    pub price_action_raw: f64,
    pub price_action_score: f64,
    pub volume_score: f64,
    pub trend_consistency_score: f64,
    pub sentiment_alignment_score: f64,
    pub momentum_score: i64,
}

/// Weighted 0-100 momentum composite. Missing changes count as 0.
pub fn score(
    change_1h: f64,
    change_4h: f64,
    change_24h: f64,
    volume_ratio: f64,
    asi_score: Option<f64>,
) -> MomentumBreakdown {
    let price_action_raw = 0.5 * change_1h + 0.3 * change_4h + 0.2 * change_24h;
    let price_action_score = NEUTRAL_SCORE + (price_action_raw * 5.0).clamp(-50.0, 50.0);
    let volume_score = (NEUTRAL_SCORE + (volume_ratio - 1.0) * 25.0).clamp(0.0, 100.0);
    let trend_consistency_score = trend_consistency(change_1h, change_4h, change_24h);
    let sentiment_alignment_score = sentiment_alignment(price_action_raw, asi_score);

    let weighted = price_action_score * PRICE_ACTION
        + volume_score * VOLUME_CONFIRMATION
        + trend_consistency_score * TREND_CONSISTENCY
        + sentiment_alignment_score * SENTIMENT_ALIGNMENT;

    MomentumBreakdown {
        price_action_raw,
        price_action_score,
        volume_score,
        trend_consistency_score,
        sentiment_alignment_score,
        momentum_score: clamp_score(weighted),
    }
}

/// 85 when all three windows are strictly up, 15 when all strictly down, else 50.
fn trend_consistency(change_1h: f64, change_4h: f64, change_24h: f64) -> f64 {
    if change_1h > 0.0 && change_4h > 0.0 && change_24h > 0.0 {
        85.0
    } else if change_1h < 0.0 && change_4h < 0.0 && change_24h < 0.0 {
        15.0
    } else {
        NEUTRAL_SCORE
    }
}

/// Bullish sentiment supports an up move; bearish sentiment supports a down move.
fn sentiment_alignment(price_action_raw: f64, asi_score: Option<f64>) -> f64 {
    match asi_score {
        Some(asi) => {
            let asi = asi.clamp(0.0, 100.0);
            if price_action_raw >= 0.0 {
                asi
            } else {
                100.0 - asi
            }
        }
        None => NEUTRAL_SCORE,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strong_pump_scores_high() {
        let m = score(5.0, 4.0, 6.0, 3.0, None);
        assert!((m.price_action_raw - 4.9).abs() < 1e-9);
        assert!((m.price_action_score - 74.5).abs() < 1e-9);
        assert_eq!(m.volume_score, 100.0);
        assert_eq!(m.trend_consistency_score, 85.0);
        assert_eq!(m.sentiment_alignment_score, 50.0);
        // 74.5·0.35 + 100·0.25 + 85·0.2 + 50·0.2 = 78.075
        assert_eq!(m.momentum_score, 78);
    }

    #[test]
    fn price_action_is_capped_both_ways() {
        assert_eq!(score(100.0, 100.0, 100.0, 1.0, None).price_action_score, 100.0);
        assert_eq!(score(-100.0, -100.0, -100.0, 1.0, None).price_action_score, 0.0);
    }

    #[test]
    fn partial_agreement_is_neutral() {
        assert_eq!(score(1.0, 1.0, -1.0, 1.0, None).trend_consistency_score, 50.0);
        assert_eq!(score(-1.0, -1.0, -1.0, 1.0, None).trend_consistency_score, 15.0);
        assert_eq!(score(0.0, 1.0, 1.0, 1.0, None).trend_consistency_score, 50.0);
    }

    #[test]
    fn volume_score_clamps() {
        assert_eq!(score(0.0, 0.0, 0.0, 10.0, None).volume_score, 100.0);
        assert_eq!(score(0.0, 0.0, 0.0, 0.0, None).volume_score, 25.0);
    }

    #[test]
    fn sentiment_alignment_follows_direction() {
        assert_eq!(score(2.0, 2.0, 2.0, 1.0, Some(80.0)).sentiment_alignment_score, 80.0);
        assert_eq!(score(-2.0, -2.0, -2.0, 1.0, Some(80.0)).sentiment_alignment_score, 20.0);
    }

    #[test]
    fn all_neutral_inputs_give_fifty() {
        assert_eq!(score(0.0, 0.0, 0.0, 1.0, None).momentum_score, 50);
    }
}
