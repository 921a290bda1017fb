use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Source rows
// ---------------------------------------------------------------------------

/// One current market row per asset, as supplied by the market snapshot source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AssetMarketRow {
    pub coin_id: String,
    pub symbol: String,
    pub name: String,
    pub image: Option<String>,
    #[serde(serialize_with = "round6::value")]
    pub price: f64,
    #[serde(serialize_with = "round6::option")]
    pub change_1h: Option<f64>,
    #[serde(serialize_with = "round6::option")]
    pub change_24h: Option<f64>,
    #[serde(serialize_with = "round6::option")]
    pub change_7d: Option<f64>,
    #[serde(serialize_with = "round6::option")]
    pub volume_24h: Option<f64>,
    #[serde(serialize_with = "round6::option")]
    pub market_cap: Option<f64>,
    pub market_cap_rank: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candle {
    pub open_time: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Candles for one asset, ordered by `open_time` ascending.
pub type CandleSeries = Vec<Candle>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct SentimentRecord {
    pub symbol: String,
    pub asi_score: f64,
    pub signal: Option<String>,
}

// ---------------------------------------------------------------------------
// Signal labels
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TrendLabel {
    StrongUp,
    Up,
    #[default]
    Neutral,
    Down,
    StrongDown,
}

impl TrendLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendLabel::StrongUp => "STRONG_UP",
            TrendLabel::Up => "UP",
            TrendLabel::Neutral => "NEUTRAL",
            TrendLabel::Down => "DOWN",
            TrendLabel::StrongDown => "STRONG_DOWN",
        }
    }

    pub fn is_strong(&self) -> bool {
        matches!(self, TrendLabel::StrongUp | TrendLabel::StrongDown)
    }
}

impl std::fmt::Display for TrendLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TrendLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "STRONG_UP" => Ok(TrendLabel::StrongUp),
            "UP" => Ok(TrendLabel::Up),
            "NEUTRAL" => Ok(TrendLabel::Neutral),
            "DOWN" => Ok(TrendLabel::Down),
            "STRONG_DOWN" => Ok(TrendLabel::StrongDown),
            other => Err(format!("unknown trend label: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AnomalyType {
    /// zscore above the anomaly threshold
    PriceSpike,
    /// zscore below the negative anomaly threshold
    PriceCrash,
}

impl AnomalyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnomalyType::PriceSpike => "PRICE_SPIKE",
            AnomalyType::PriceCrash => "PRICE_CRASH",
        }
    }
}

impl std::fmt::Display for AnomalyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AnomalyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PRICE_SPIKE" => Ok(AnomalyType::PriceSpike),
            "PRICE_CRASH" => Ok(AnomalyType::PriceCrash),
            other => Err(format!("unknown anomaly type: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Query parameters
// ---------------------------------------------------------------------------

/// Change window selectable by gainer/loser queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Timeframe {
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "4h")]
    FourHours,
    #[serde(rename = "24h")]
    OneDay,
    #[serde(rename = "7d")]
    SevenDays,
}

impl Timeframe {
    /// Snapshot column holding the change for this window.
    pub fn column(&self) -> &'static str {
        match self {
            Timeframe::OneHour => "change_1h",
            Timeframe::FourHours => "change_4h",
            Timeframe::OneDay => "change_24h",
            Timeframe::SevenDays => "change_7d",
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Timeframe::OneHour => "1h",
            Timeframe::FourHours => "4h",
            Timeframe::OneDay => "24h",
            Timeframe::SevenDays => "7d",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "1h" => Ok(Timeframe::OneHour),
            "4h" => Ok(Timeframe::FourHours),
            "24h" | "1d" => Ok(Timeframe::OneDay),
            "7d" => Ok(Timeframe::SevenDays),
            other => Err(format!("unsupported timeframe: {other} (expected 1h, 4h, 24h or 7d)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    Up,
    Down,
}

// ---------------------------------------------------------------------------
// Computed signals and snapshot rows
// ---------------------------------------------------------------------------

/// Every derived value for one asset in one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComputedSignals {
    #[serde(serialize_with = "round6::value")]
    pub change_4h: f64,
    #[serde(serialize_with = "round6::value")]
    pub volume_1h: f64,
    #[serde(serialize_with = "round6::value")]
    pub avg_volume_1h: f64,
    #[serde(serialize_with = "round6::value")]
    pub volume_ratio: f64,
    #[serde(serialize_with = "round6::value")]
    pub volume_change_pct: f64,
    #[serde(serialize_with = "round6::value")]
    pub price_action_score: f64,
    #[serde(serialize_with = "round6::value")]
    pub volume_score: f64,
    #[serde(serialize_with = "round6::value")]
    pub trend_consistency_score: f64,
    #[serde(serialize_with = "round6::value")]
    pub sentiment_alignment_score: f64,
    pub momentum_score: i64,
    #[serde(serialize_with = "round6::value")]
    pub trend_score: f64,
    pub trend_label: TrendLabel,
    #[serde(serialize_with = "round6::value")]
    pub rs_vs_benchmark: f64,
    #[serde(serialize_with = "round6::value")]
    pub rs_vs_market: f64,
    pub rs_score: i64,
    pub is_outperformer: bool,
    #[serde(serialize_with = "round6::option")]
    pub price_zscore: Option<f64>,
    pub is_anomaly: bool,
    pub anomaly_type: Option<AnomalyType>,
    pub is_sudden_pump: bool,
    pub is_sudden_dump: bool,
    pub discovery_score: i64,
}

/// Persisted unit: market row, computed signals and merged sentiment for one coin_id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoverySnapshotRow {
    #[serde(flatten)]
    pub market: AssetMarketRow,
    #[serde(flatten)]
    pub signals: ComputedSignals,
    #[serde(serialize_with = "round6::option")]
    pub asi_score: Option<f64>,
    pub asi_signal: Option<String>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Run result
// ---------------------------------------------------------------------------

/// Structured outcome of one `run_update`. Never an `Err`: failures set
/// `success = false` and carry the message in `error`.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
pub struct RunSummary {
    pub success: bool,
    pub started_at: DateTime<Utc>,
    pub coins_processed: i64,
    pub coins_upserted: i64,
    pub coins_failed: i64,
    pub pumps_detected: i64,
    pub dumps_detected: i64,
    pub high_momentum_coins: i64,
    pub strong_trends: i64,
    pub anomalies_detected: i64,
    pub sentiment_matched: i64,
    pub sentiment_ambiguous: i64,
    #[serde(serialize_with = "round6::value")]
    pub elapsed_seconds: f64,
    pub error: Option<String>,
}

impl RunSummary {
    pub fn failed(started_at: DateTime<Utc>, elapsed_seconds: f64, error: impl Into<String>) -> Self {
        Self {
            success: false,
            started_at,
            coins_processed: 0,
            coins_upserted: 0,
            coins_failed: 0,
            pumps_detected: 0,
            dumps_detected: 0,
            high_momentum_coins: 0,
            strong_trends: 0,
            anomalies_detected: 0,
            sentiment_matched: 0,
            sentiment_ambiguous: 0,
            elapsed_seconds,
            error: Some(error.into()),
        }
    }
}

/// Aggregate counts over the persisted snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotSummary {
    pub total_coins: i64,
    pub liquid_coins: i64,
    pub sudden_pumps: i64,
    pub sudden_dumps: i64,
    pub anomalies: i64,
    pub outperformers: i64,
    pub last_updated_at: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Serialization helpers
// ---------------------------------------------------------------------------

/// Floats leave the crate rounded to 6 decimals.
pub(crate) mod round6 {
    use serde::Serializer;

    pub fn round(v: f64) -> f64 {
        (v * 1_000_000.0).round() / 1_000_000.0
    }

    pub fn value<S: Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(round(*v))
    }

    pub fn option<S: Serializer>(v: &Option<f64>, s: S) -> Result<S::Ok, S::Error> {
        match v {
            Some(v) => s.serialize_some(&round(*v)),
            None => s.serialize_none(),
        }
    }
}
