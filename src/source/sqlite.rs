use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::{CandleSeriesSource, MarketSnapshotSource, SentimentSource};
use crate::error::Result;
use crate::types::{AssetMarketRow, Candle, CandleSeries, SentimentRecord};

/// Reads the source tables that the ingestion side keeps current
/// (`coin_markets`, `ohlcv_candles`, `sentiment_scores`).
#[derive(Clone)]
pub struct SqliteSource {
    pool: sqlx::SqlitePool,
}

impl SqliteSource {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct CandleRecord {
    coin_id: String,
    /// Unix seconds.
    open_time: i64,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

#[async_trait]
impl MarketSnapshotSource for SqliteSource {
    async fn get_market_rows(&self, limit: usize) -> Result<Vec<AssetMarketRow>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = sqlx::query_as::<_, AssetMarketRow>(
            r#"
            SELECT coin_id, symbol, name, image, price,
                   change_1h, change_24h, change_7d,
                   volume_24h, market_cap, market_cap_rank
            FROM coin_markets
            WHERE price > 0
            ORDER BY market_cap DESC NULLS LAST, coin_id ASC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(rows = rows.len(), "loaded market rows");
        Ok(rows)
    }
}

#[async_trait]
impl CandleSeriesSource for SqliteSource {
    async fn get_recent_candles(&self, since: DateTime<Utc>) -> Result<HashMap<String, CandleSeries>> {
        let since = since.timestamp();
        let records = sqlx::query_as::<_, CandleRecord>(
            r#"
            SELECT coin_id, open_time, open, high, low, close, volume
            FROM ohlcv_candles
            WHERE open_time >= ?
            ORDER BY coin_id ASC, open_time ASC
            "#,
        )
        .bind(since)
        .fetch_all(&self.pool)
        .await?;

        let mut series: HashMap<String, CandleSeries> = HashMap::new();
        let mut skipped = 0usize;
        for r in records {
            let Some(open_time) = DateTime::<Utc>::from_timestamp(r.open_time, 0) else {
                skipped += 1;
                continue;
            };
            series.entry(r.coin_id).or_default().push(Candle {
                open_time,
                open: r.open,
                high: r.high,
                low: r.low,
                close: r.close,
                volume: r.volume,
            });
        }
        if skipped > 0 {
            warn!(skipped, "candles with out-of-range open_time ignored");
        }

        debug!(assets = series.len(), "loaded candle series");
        Ok(series)
    }
}

#[async_trait]
impl SentimentSource for SqliteSource {
    async fn get_sentiment(&self) -> Result<Vec<SentimentRecord>> {
        let records = sqlx::query_as::<_, SentimentRecord>(
            "SELECT symbol, asi_score, signal FROM sentiment_scores ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }
}
