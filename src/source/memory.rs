use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::{CandleSeriesSource, MarketSnapshotSource, SentimentSource};
use crate::error::{AppError, Result};
use crate::types::{AssetMarketRow, CandleSeries, SentimentRecord};

#[derive(Default)]
struct Fixture {
    rows: Vec<AssetMarketRow>,
    candles: HashMap<String, CandleSeries>,
    sentiment: Vec<SentimentRecord>,
    /// Simulated outages, by source name.
    failing: Vec<&'static str>,
}

/// In-memory implementation of all three sources, for embedding and tests.
///
/// Applies the same `price > 0`, market-cap ordering, limit and candle `since`
/// contract as the SQLite source.
#[derive(Clone, Default)]
pub struct StaticSource {
    inner: Arc<RwLock<Fixture>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_rows(&self, rows: Vec<AssetMarketRow>) {
        if let Ok(mut f) = self.inner.write() {
            f.rows = rows;
        }
    }

    pub fn set_candles(&self, coin_id: &str, series: CandleSeries) {
        if let Ok(mut f) = self.inner.write() {
            f.candles.insert(coin_id.to_string(), series);
        }
    }

    pub fn set_sentiment(&self, records: Vec<SentimentRecord>) {
        if let Ok(mut f) = self.inner.write() {
            f.sentiment = records;
        }
    }

    /// Make the named source (`"market"`, `"candles"`, `"sentiment"`) return an error.
    pub fn fail(&self, source_name: &'static str) {
        if let Ok(mut f) = self.inner.write() {
            f.failing.push(source_name);
        }
    }

    fn read<T>(&self, source_name: &'static str, pick: impl FnOnce(&Fixture) -> T) -> Result<T> {
        let f = self
            .inner
            .read()
            .map_err(|_| AppError::source_failure(source_name, "fixture lock poisoned"))?;
        if f.failing.contains(&source_name) {
            return Err(AppError::source_failure(source_name, "simulated outage"));
        }
        Ok(pick(&f))
    }
}

#[async_trait]
impl MarketSnapshotSource for StaticSource {
    async fn get_market_rows(&self, limit: usize) -> Result<Vec<AssetMarketRow>> {
        self.read("market", |f| {
            let mut rows: Vec<AssetMarketRow> = f.rows.iter().filter(|r| r.price > 0.0).cloned().collect();
            rows.sort_by(|a, b| {
                let a_cap = a.market_cap.unwrap_or(f64::NEG_INFINITY);
                let b_cap = b.market_cap.unwrap_or(f64::NEG_INFINITY);
                b_cap.total_cmp(&a_cap).then_with(|| a.coin_id.cmp(&b.coin_id))
            });
            rows.truncate(limit);
            rows
        })
    }
}

#[async_trait]
impl CandleSeriesSource for StaticSource {
    async fn get_recent_candles(&self, since: DateTime<Utc>) -> Result<HashMap<String, CandleSeries>> {
        self.read("candles", |f| {
            f.candles
                .iter()
                .map(|(coin_id, series)| {
                    let recent: CandleSeries = series.iter().filter(|c| c.open_time >= since).copied().collect();
                    (coin_id.clone(), recent)
                })
                .filter(|(_, series)| !series.is_empty())
                .collect()
        })
    }
}

#[async_trait]
impl SentimentSource for StaticSource {
    async fn get_sentiment(&self) -> Result<Vec<SentimentRecord>> {
        self.read("sentiment", |f| f.sentiment.clone())
    }
}
