use chrono::{DateTime, Duration, Utc};

use crate::config::windows::{CHANGE_REFERENCE_MAX_AGE_SECS, CHANGE_REFERENCE_MIN_AGE_SECS};
use crate::types::Candle;

/// 4h percentage change against the earliest candle opened 2-4 hours before `now`.
///
/// Falls back to `change_24h * 4 / 24` when no such candle exists, so every asset
/// gets a value (a missing 24h change counts as 0).
pub fn change_4h(
    current_price: f64,
    change_24h: Option<f64>,
    candles: Option<&[Candle]>,
    now: DateTime<Utc>,
) -> f64 {
    match reference_close(candles.unwrap_or_default(), now) {
        Some(close_4h_ago) => (current_price - close_4h_ago) / close_4h_ago * 100.0,
        None => change_24h.unwrap_or(0.0) * 4.0 / 24.0,
    }
}

fn reference_close(candles: &[Candle], now: DateTime<Utc>) -> Option<f64> {
    let oldest = now - Duration::seconds(CHANGE_REFERENCE_MAX_AGE_SECS);
    let newest = now - Duration::seconds(CHANGE_REFERENCE_MIN_AGE_SECS);

    candles
        .iter()
        .filter(|c| c.open_time >= oldest && c.open_time <= newest)
        .min_by_key(|c| c.open_time)
        .map(|c| c.close)
        .filter(|close| *close > 0.0)
}
