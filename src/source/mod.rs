//! Upstream collaborators. The engine only sees these traits; ingestion, exchange
//! clients and sentiment providers live outside the crate and fill whatever backs them.

pub mod memory;
pub mod sqlite;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::types::{AssetMarketRow, CandleSeries, SentimentRecord};

pub use memory::StaticSource;
pub use sqlite::SqliteSource;

#[async_trait]
pub trait MarketSnapshotSource: Send + Sync {
    /// Current rows with `price > 0`, largest market cap first, at most `limit`.
    async fn get_market_rows(&self, limit: usize) -> Result<Vec<AssetMarketRow>>;
}

#[async_trait]
pub trait CandleSeriesSource: Send + Sync {
    /// Candles opened at or after `since`, keyed by coin_id, oldest first.
    async fn get_recent_candles(&self, since: DateTime<Utc>) -> Result<HashMap<String, CandleSeries>>;
}

#[async_trait]
pub trait SentimentSource: Send + Sync {
    async fn get_sentiment(&self) -> Result<Vec<SentimentRecord>>;
}
