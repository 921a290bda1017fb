//! Per-run signal computation.
//!
//! `compute` is the whole calculation stage of a run: a population pre-pass
//! (benchmark change, market mean, z-score statistics, sentiment index) followed by
//! one pass over the assets that applies every calculator in dependency order.

pub mod anomaly;
pub mod change_window;
pub mod discovery;
pub mod momentum;
pub mod pump_dump;
pub mod relative_strength;
pub mod sentiment;
pub mod trend;
pub mod volume_profile;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::config::SignalPolicy;
use crate::types::{AssetMarketRow, CandleSeries, ComputedSignals, DiscoverySnapshotRow, SentimentRecord};

use anomaly::PopulationStats;
use pump_dump::PumpDumpObservables;
use sentiment::SentimentIndex;

/// Everything one run reads.
pub struct SignalInputs<'a> {
    pub rows: &'a [AssetMarketRow],
    pub candles: &'a HashMap<String, CandleSeries>,
    pub sentiment: &'a [SentimentRecord],
    pub now: DateTime<Utc>,
}

/// Output of the calculation stage.
#[derive(Debug)]
pub struct ComputedRun {
    pub rows: Vec<DiscoverySnapshotRow>,
    pub population: PopulationStats,
    /// None when the benchmark asset was missing from the run (treated as 0).
    pub benchmark_change_24h: Option<f64>,
    pub market_mean_24h: f64,
    pub sentiment_matched: usize,
    pub sentiment_ambiguous: usize,
}

pub fn compute(inputs: &SignalInputs<'_>, policy: &SignalPolicy) -> ComputedRun {
    // Pre-pass: population-wide aggregates.
    let benchmark_change_24h = relative_strength::benchmark_change(inputs.rows, &policy.benchmark_coin_id);
    let benchmark = benchmark_change_24h.unwrap_or(0.0);
    let market_mean_24h = relative_strength::market_mean(inputs.rows);
    let population = PopulationStats::from_changes(inputs.rows.iter().filter_map(|r| r.change_24h));
    let index = SentimentIndex::build(inputs.sentiment);
    if !index.is_empty() {
        debug!(symbols = index.len(), ambiguous = index.ambiguous().len(), "sentiment index built");
    }
    let merged = sentiment::merge(inputs.rows, &index);

    let mut sentiment_matched = 0;
    let rows = inputs
        .rows
        .iter()
        .zip(merged)
        .map(|(row, sentiment)| {
            if sentiment.is_some() {
                sentiment_matched += 1;
            }
            let asi_score = sentiment.as_ref().map(|s| s.asi_score);
            let signals = compute_asset(row, inputs, asi_score, benchmark, market_mean_24h, &population, policy);
            DiscoverySnapshotRow {
                market: row.clone(),
                signals,
                asi_score,
                asi_signal: sentiment.and_then(|s| s.signal),
                updated_at: inputs.now,
            }
        })
        .collect();

    ComputedRun {
        rows,
        population,
        benchmark_change_24h,
        market_mean_24h,
        sentiment_matched,
        sentiment_ambiguous: index.ambiguous().len(),
    }
}

fn compute_asset(
    row: &AssetMarketRow,
    inputs: &SignalInputs<'_>,
    asi_score: Option<f64>,
    benchmark_change_24h: f64,
    market_mean_24h: f64,
    population: &PopulationStats,
    policy: &SignalPolicy,
) -> ComputedSignals {
    let candles = inputs.candles.get(&row.coin_id).map(Vec::as_slice);
    let change_1h = row.change_1h.unwrap_or(0.0);
    let change_24h = row.change_24h.unwrap_or(0.0);

    let change_4h = change_window::change_4h(row.price, row.change_24h, candles, inputs.now);
    let volume = volume_profile::volume_profile(candles, inputs.now);
    let momentum = momentum::score(change_1h, change_4h, change_24h, volume.volume_ratio, asi_score);
    let (trend_score, trend_label) = trend::trend_score(change_1h, change_4h, change_24h);
    let rs = relative_strength::relative_strength(change_24h, benchmark_change_24h, market_mean_24h);

    let price_zscore = population.zscore(row.change_24h);
    let (is_anomaly, anomaly_type) = anomaly::classify(price_zscore, policy.anomaly_zscore);

    let (is_sudden_pump, is_sudden_dump) = pump_dump::classify(
        &PumpDumpObservables {
            change_1h,
            volume_ratio: volume.volume_ratio,
            volume_24h: row.volume_24h.unwrap_or(0.0),
            is_anomaly,
            zscore: price_zscore,
        },
        policy,
    );

    let discovery_score = discovery::discovery_score(
        momentum.momentum_score,
        rs.rs_score,
        row.market_cap_rank,
        rs.is_outperformer,
        trend_score,
    );

    ComputedSignals {
        change_4h,
        volume_1h: volume.volume_1h,
        avg_volume_1h: volume.avg_volume_1h,
        volume_ratio: volume.volume_ratio,
        volume_change_pct: volume.volume_change_pct,
        price_action_score: momentum.price_action_score,
        volume_score: momentum.volume_score,
        trend_consistency_score: momentum.trend_consistency_score,
        sentiment_alignment_score: momentum.sentiment_alignment_score,
        momentum_score: momentum.momentum_score,
        trend_score,
        trend_label,
        rs_vs_benchmark: rs.rs_vs_benchmark,
        rs_vs_market: rs.rs_vs_market,
        rs_score: rs.rs_score,
        is_outperformer: rs.is_outperformer,
        price_zscore,
        is_anomaly,
        anomaly_type,
        is_sudden_pump,
        is_sudden_dump,
        discovery_score,
    }
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Round to an integer score in [0, 100].
pub(crate) fn clamp_score(value: f64) -> i64 {
    value.round().clamp(0.0, 100.0) as i64
}
