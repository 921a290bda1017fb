use std::str::FromStr;

use crate::error::{AppError, Result};

/// Default number of assets pulled from the market source per run (largest caps first).
pub const DEFAULT_UNIVERSE_SIZE: usize = 1000;

/// Default coin_id used as the relative-strength benchmark.
pub const DEFAULT_BENCHMARK_COIN_ID: &str = "bitcoin";

/// Default scheduling interval for the `discovery` binary (seconds).
pub const DEFAULT_RUN_INTERVAL_SECS: u64 = 300;

/// Rows upserted per transaction.
pub const DEFAULT_PERSIST_BATCH_SIZE: usize = 500;

/// Global liquidity floor applied by every ranked query (USD, 24h volume).
pub const DEFAULT_LIQUIDITY_FLOOR_USD: f64 = 100_000.0;

/// Assets ranked at or above this cap-rank form the "market" for relative strength.
pub const MARKET_RANK_CUTOFF: i64 = 100;

/// Lookback windows used when loading candles (seconds).
pub mod windows {
    pub const VOLUME_BASELINE_SECS: i64 = 24 * 3_600;
    pub const VOLUME_RECENT_SECS: i64 = 3_600;
    /// The 4h reference candle must open inside [now - 4h, now - 2h].
    pub const CHANGE_REFERENCE_MAX_AGE_SECS: i64 = 4 * 3_600;
    pub const CHANGE_REFERENCE_MIN_AGE_SECS: i64 = 2 * 3_600;
    pub const HOUR_SECS: i64 = 3_600;
}

/// Momentum component weights. Must sum to 1.0.
pub mod momentum_weights {
    pub const PRICE_ACTION: f64 = 0.35;
    pub const VOLUME_CONFIRMATION: f64 = 0.25;
    pub const TREND_CONSISTENCY: f64 = 0.20;
    pub const SENTIMENT_ALIGNMENT: f64 = 0.20;
}

/// Per-window trend contributions: (strong-move threshold %, strong weight, base weight).
pub mod trend_thresholds {
    pub const WINDOW_1H: (f64, f64, f64) = (2.0, 2.0, 1.0);
    pub const WINDOW_4H: (f64, f64, f64) = (4.0, 1.5, 0.75);
    pub const WINDOW_24H: (f64, f64, f64) = (8.0, 1.5, 0.75);
    pub const STRONG: f64 = 4.0;
    pub const MODERATE: f64 = 2.0;
    pub const MAX_ABS: f64 = 5.0;
}

/// Discovery score weights and bonuses.
pub mod discovery_weights {
    pub const MOMENTUM: f64 = 0.4;
    pub const RELATIVE_STRENGTH: f64 = 0.3;
    pub const SMALL_CAP_BONUS: f64 = 10.0;
    pub const OUTPERFORMER_BONUS: f64 = 10.0;
    pub const TREND_BONUS: f64 = 10.0;
    /// trend_score must exceed this for the trend bonus.
    pub const TREND_BONUS_MIN: f64 = 2.0;
}

/// Policy thresholds for anomaly and pump/dump classification.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalPolicy {
    /// |zscore| strictly above this is an anomaly (ANOMALY_ZSCORE).
    pub anomaly_zscore: f64,
    /// 1h change magnitude for the rule route (PUMP_CHANGE_1H_PCT).
    pub pump_change_1h_pct: f64,
    /// volume_ratio must exceed this for the rule route (PUMP_VOLUME_RATIO).
    pub pump_volume_ratio: f64,
    /// 24h volume must exceed this for the rule route (PUMP_MIN_VOLUME_24H).
    pub pump_min_volume_24h: f64,
    /// zscore magnitude for the anomaly route (PUMP_ZSCORE).
    pub pump_zscore: f64,
    /// momentum_score at or above this counts as high momentum (HIGH_MOMENTUM_SCORE).
    pub high_momentum_score: i64,
    /// coin_id whose 24h change is the relative-strength benchmark (BENCHMARK_COIN_ID).
    pub benchmark_coin_id: String,
}

impl Default for SignalPolicy {
    fn default() -> Self {
        Self {
            anomaly_zscore: 2.5,
            pump_change_1h_pct: 3.0,
            pump_volume_ratio: 2.0,
            pump_min_volume_24h: 100_000.0,
            pump_zscore: 2.0,
            high_momentum_score: 70,
            benchmark_coin_id: DEFAULT_BENCHMARK_COIN_ID.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    pub db_path: String,
    /// Seconds between runs; 0 runs once and exits (DISCOVERY_INTERVAL_SECS)
    pub run_interval_secs: u64,
    /// Max assets loaded per run (DISCOVERY_UNIVERSE_SIZE)
    pub universe_size: usize,
    /// Rows per persistence transaction (PERSIST_BATCH_SIZE)
    pub persist_batch_size: usize,
    /// Minimum 24h volume for ranked queries (LIQUIDITY_FLOOR_USD)
    pub liquidity_floor_usd: f64,
    pub policy: SignalPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = SignalPolicy::default();
        let persist_batch_size = env_parse("PERSIST_BATCH_SIZE", DEFAULT_PERSIST_BATCH_SIZE)?;
        if persist_batch_size == 0 {
            return Err(AppError::Config("PERSIST_BATCH_SIZE must be at least 1".to_string()));
        }

        Ok(Self {
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            db_path: std::env::var("DB_PATH").unwrap_or_else(|_| "discovery.db".to_string()),
            run_interval_secs: env_parse("DISCOVERY_INTERVAL_SECS", DEFAULT_RUN_INTERVAL_SECS)?,
            universe_size: env_parse("DISCOVERY_UNIVERSE_SIZE", DEFAULT_UNIVERSE_SIZE)?,
            persist_batch_size,
            liquidity_floor_usd: env_parse("LIQUIDITY_FLOOR_USD", DEFAULT_LIQUIDITY_FLOOR_USD)?,
            policy: SignalPolicy {
                anomaly_zscore: env_parse("ANOMALY_ZSCORE", defaults.anomaly_zscore)?,
                pump_change_1h_pct: env_parse("PUMP_CHANGE_1H_PCT", defaults.pump_change_1h_pct)?,
                pump_volume_ratio: env_parse("PUMP_VOLUME_RATIO", defaults.pump_volume_ratio)?,
                pump_min_volume_24h: env_parse("PUMP_MIN_VOLUME_24H", defaults.pump_min_volume_24h)?,
                pump_zscore: env_parse("PUMP_ZSCORE", defaults.pump_zscore)?,
                high_momentum_score: env_parse("HIGH_MOMENTUM_SCORE", defaults.high_momentum_score)?,
                benchmark_coin_id: std::env::var("BENCHMARK_COIN_ID")
                    .unwrap_or(defaults.benchmark_coin_id),
            },
        })
    }
}

/// Reads `key` from the environment, falling back to `default` when unset.
/// A set but unparseable value is a configuration error rather than a silent default.
fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| AppError::Config(format!("{key} has an invalid value: {raw:?}"))),
        Err(_) => Ok(default),
    }
}
