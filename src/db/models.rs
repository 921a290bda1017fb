use chrono::{DateTime, Utc};

use crate::types::{AssetMarketRow, ComputedSignals, DiscoverySnapshotRow};

/// Column list shared by every snapshot read, in `SnapshotRecord` order.
pub const SNAPSHOT_COLUMNS: &str = "coin_id, symbol, name, image, price, \
    change_1h, change_4h, change_24h, change_7d, volume_24h, market_cap, market_cap_rank, \
    volume_1h, avg_volume_1h, volume_ratio, volume_change_pct, \
    price_action_score, volume_score, trend_consistency_score, sentiment_alignment_score, \
    momentum_score, trend_score, trend_label, rs_vs_benchmark, rs_vs_market, rs_score, \
    is_outperformer, price_zscore, is_anomaly, anomaly_type, is_sudden_pump, is_sudden_dump, \
    discovery_score, asi_score, asi_signal, updated_at";

/// Row of `discovery_snapshot` as stored. Labels are plain text here and parsed on
/// conversion into `DiscoverySnapshotRow`.
#[derive(Debug, sqlx::FromRow)]
pub struct SnapshotRecord {
    pub coin_id: String,
    pub symbol: String,
    pub name: String,
    pub image: Option<String>,
    pub price: f64,
    pub change_1h: Option<f64>,
    pub change_4h: f64,
    pub change_24h: Option<f64>,
    pub change_7d: Option<f64>,
    pub volume_24h: Option<f64>,
    pub market_cap: Option<f64>,
    pub market_cap_rank: Option<i64>,
    pub volume_1h: f64,
    pub avg_volume_1h: f64,
    pub volume_ratio: f64,
    pub volume_change_pct: f64,
    pub price_action_score: f64,
    pub volume_score: f64,
    pub trend_consistency_score: f64,
    pub sentiment_alignment_score: f64,
    pub momentum_score: i64,
    pub trend_score: f64,
    pub trend_label: String,
    pub rs_vs_benchmark: f64,
    pub rs_vs_market: f64,
    pub rs_score: i64,
    pub is_outperformer: bool,
    pub price_zscore: Option<f64>,
    pub is_anomaly: bool,
    pub anomaly_type: Option<String>,
    pub is_sudden_pump: bool,
    pub is_sudden_dump: bool,
    pub discovery_score: i64,
    pub asi_score: Option<f64>,
    pub asi_signal: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl From<SnapshotRecord> for DiscoverySnapshotRow {
    fn from(r: SnapshotRecord) -> Self {
        DiscoverySnapshotRow {
            market: AssetMarketRow {
                coin_id: r.coin_id,
                symbol: r.symbol,
                name: r.name,
                image: r.image,
                price: r.price,
                change_1h: r.change_1h,
                change_24h: r.change_24h,
                change_7d: r.change_7d,
                volume_24h: r.volume_24h,
                market_cap: r.market_cap,
                market_cap_rank: r.market_cap_rank,
            },
            signals: ComputedSignals {
                change_4h: r.change_4h,
                volume_1h: r.volume_1h,
                avg_volume_1h: r.avg_volume_1h,
                volume_ratio: r.volume_ratio,
                volume_change_pct: r.volume_change_pct,
                price_action_score: r.price_action_score,
                volume_score: r.volume_score,
                trend_consistency_score: r.trend_consistency_score,
                sentiment_alignment_score: r.sentiment_alignment_score,
                momentum_score: r.momentum_score,
                trend_score: r.trend_score,
                trend_label: r.trend_label.parse().unwrap_or_default(),
                rs_vs_benchmark: r.rs_vs_benchmark,
                rs_vs_market: r.rs_vs_market,
                rs_score: r.rs_score,
                is_outperformer: r.is_outperformer,
                price_zscore: r.price_zscore,
                is_anomaly: r.is_anomaly,
                anomaly_type: r.anomaly_type.and_then(|t| t.parse().ok()),
                is_sudden_pump: r.is_sudden_pump,
                is_sudden_dump: r.is_sudden_dump,
                discovery_score: r.discovery_score,
            },
            asi_score: r.asi_score,
            asi_signal: r.asi_signal,
            updated_at: r.updated_at,
        }
    }
}
