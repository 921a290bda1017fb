use crate::config::MARKET_RANK_CUTOFF;
use crate::types::AssetMarketRow;

use super::clamp_score;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelativeStrength {
    pub rs_vs_benchmark: f64,
    pub rs_vs_market: f64,
    pub rs_score: i64,
    pub is_outperformer: bool,
}

/// Mean 24h change of the top-ranked assets, or of the whole population when fewer than
/// `MARKET_RANK_CUTOFF` ranked assets are present. Missing changes count as 0.
pub fn market_mean(rows: &[AssetMarketRow]) -> f64 {
    let ranked: Vec<f64> = rows
        .iter()
        .filter(|r| r.market_cap_rank.is_some_and(|rank| rank <= MARKET_RANK_CUTOFF))
        .map(|r| r.change_24h.unwrap_or(0.0))
        .collect();

    if ranked.len() >= MARKET_RANK_CUTOFF as usize {
        mean(&ranked)
    } else {
        let all: Vec<f64> = rows.iter().map(|r| r.change_24h.unwrap_or(0.0)).collect();
        mean(&all)
    }
}

/// 24h change of the benchmark asset, if it is part of this run.
pub fn benchmark_change(rows: &[AssetMarketRow], benchmark_coin_id: &str) -> Option<f64> {
    rows.iter()
        .find(|r| r.coin_id == benchmark_coin_id)
        .map(|r| r.change_24h.unwrap_or(0.0))
}

pub fn relative_strength(change_24h: f64, benchmark_change_24h: f64, market_mean: f64) -> RelativeStrength {
    let rs_vs_benchmark = change_24h - benchmark_change_24h;
    let rs_vs_market = change_24h - market_mean;
    let rs_score = clamp_score(50.0 + (rs_vs_benchmark + rs_vs_market) / 2.0 * 5.0);

    RelativeStrength {
        rs_vs_benchmark,
        rs_vs_market,
        rs_score,
        is_outperformer: rs_vs_benchmark > 0.0 && rs_vs_market > 0.0,
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}
