use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::config::windows::{HOUR_SECS, VOLUME_BASELINE_SECS, VOLUME_RECENT_SECS};
use crate::types::Candle;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeProfile {
    /// Volume of candles opened within the last hour.
    pub volume_1h: f64,
    /// Mean hourly volume over the trailing 24h (0 when no candles).
    pub avg_volume_1h: f64,
    pub volume_ratio: f64,
    pub volume_change_pct: f64,
}

impl Default for VolumeProfile {
    fn default() -> Self {
        Self {
            volume_1h: 0.0,
            avg_volume_1h: 0.0,
            volume_ratio: 1.0,
            volume_change_pct: 0.0,
        }
    }
}

/// Builds the hourly volume profile for one asset.
///
/// The 24h average divides by the number of hour buckets that actually hold candles,
/// so a series that only covers part of the day is not diluted by empty hours.
pub fn volume_profile(candles: Option<&[Candle]>, now: DateTime<Utc>) -> VolumeProfile {
    let Some(candles) = candles else {
        return VolumeProfile::default();
    };

    let mut volume_1h = 0.0;
    // hour bucket (0 = most recent) → summed volume
    let mut buckets: BTreeMap<i64, f64> = BTreeMap::new();

    for candle in candles {
        let age = (now - candle.open_time).num_seconds();
        if !(0..VOLUME_BASELINE_SECS).contains(&age) {
            continue;
        }
        if age < VOLUME_RECENT_SECS {
            volume_1h += candle.volume;
        }
        *buckets.entry(age / HOUR_SECS).or_insert(0.0) += candle.volume;
    }

    let avg_volume_1h = if buckets.is_empty() {
        0.0
    } else {
        buckets.values().sum::<f64>() / buckets.len() as f64
    };

    let volume_ratio = if avg_volume_1h > 0.0 {
        volume_1h / avg_volume_1h
    } else {
        1.0
    };

    VolumeProfile {
        volume_1h,
        avg_volume_1h,
        volume_ratio,
        volume_change_pct: (volume_ratio - 1.0) * 100.0,
    }
}
