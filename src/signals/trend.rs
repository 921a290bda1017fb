use crate::config::trend_thresholds::*;
use crate::types::TrendLabel;

use super::round_to;

/// Signed trend strength in [-5, 5] (1 decimal) and its label.
pub fn trend_score(change_1h: f64, change_4h: f64, change_24h: f64) -> (f64, TrendLabel) {
    let raw = contribution(change_1h, WINDOW_1H)
        + contribution(change_4h, WINDOW_4H)
        + contribution(change_24h, WINDOW_24H);
    let score = round_to(raw.clamp(-MAX_ABS, MAX_ABS), 1);
    (score, label(score))
}

/// `(threshold, strong, base)`: a move beyond `threshold` percent earns the strong weight.
fn contribution(change: f64, (threshold, strong, base): (f64, f64, f64)) -> f64 {
    let weight = if change.abs() > threshold { strong } else { base };
    sign(change) * weight
}

fn sign(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Boundaries resolve to the stronger label.
pub fn label(score: f64) -> TrendLabel {
    if score >= STRONG {
        TrendLabel::StrongUp
    } else if score >= MODERATE {
        TrendLabel::Up
    } else if score <= -STRONG {
        TrendLabel::StrongDown
    } else if score <= -MODERATE {
        TrendLabel::Down
    } else {
        TrendLabel::Neutral
    }
}
