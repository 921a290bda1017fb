use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use tracing::{error, info, warn};

use crate::config::{windows, SignalPolicy};
use crate::db::writer::SnapshotPersister;
use crate::error::AppError;
use crate::run_state::RunState;
use crate::signals::{self, SignalInputs};
use crate::source::{CandleSeriesSource, MarketSnapshotSource, SentimentSource};
use crate::types::{CandleSeries, ComputedSignals, DiscoverySnapshotRow, RunSummary, SentimentRecord};

/// Runs the discovery pipeline: load, compute, persist.
///
/// Sources, persister and policy are injected. The engine owns its run guard, so two
/// overlapping `run_update` calls never write the snapshot at the same time.
pub struct DiscoveryEngine {
    markets: Arc<dyn MarketSnapshotSource>,
    candles: Arc<dyn CandleSeriesSource>,
    sentiment: Arc<dyn SentimentSource>,
    persister: SnapshotPersister,
    policy: SignalPolicy,
    universe_size: usize,
    state: Arc<RunState>,
    /// Clock, replaceable in tests.
    now_fn: Box<dyn Fn() -> DateTime<Utc> + Send + Sync>,
}

impl DiscoveryEngine {
    pub fn new(
        markets: Arc<dyn MarketSnapshotSource>,
        candles: Arc<dyn CandleSeriesSource>,
        sentiment: Arc<dyn SentimentSource>,
        persister: SnapshotPersister,
        policy: SignalPolicy,
        universe_size: usize,
    ) -> Self {
        Self {
            markets,
            candles,
            sentiment,
            persister,
            policy,
            universe_size,
            state: Arc::new(RunState::new()),
            now_fn: Box::new(Utc::now),
        }
    }

    pub fn with_clock(mut self, now_fn: Box<dyn Fn() -> DateTime<Utc> + Send + Sync>) -> Self {
        self.now_fn = now_fn;
        self
    }

    pub fn state(&self) -> Arc<RunState> {
        Arc::clone(&self.state)
    }

    /// One full run. Never returns an error: failures come back as
    /// `success = false` with the message in `error`.
    pub async fn run_update(&self) -> RunSummary {
        let started_at = (self.now_fn)();
        let timer = Instant::now();

        let Some(_guard) = self.state.try_begin() else {
            warn!("Discovery run skipped: previous run still in progress");
            return RunSummary::failed(started_at, 0.0, AppError::RunInProgress.to_string());
        };

        let summary = self.run_locked(started_at, timer).await;

        if let Err(e) = self.persister.record_run(&summary).await {
            error!("Failed to record discovery run: {e}");
        }
        self.state.record_finished(started_at.timestamp_millis(), summary.success);
        summary
    }

    async fn run_locked(&self, started_at: DateTime<Utc>, timer: Instant) -> RunSummary {
        let elapsed = || timer.elapsed().as_secs_f64();

        let rows = match self.markets.get_market_rows(self.universe_size).await {
            Ok(rows) if rows.is_empty() => {
                warn!("Market source returned no rows, nothing to compute");
                return RunSummary::failed(started_at, elapsed(), "market source returned no rows");
            }
            Ok(rows) => rows,
            Err(e) => {
                error!("Market source failed: {e}");
                return RunSummary::failed(started_at, elapsed(), e.to_string());
            }
        };

        let candles = self.load_candles(started_at).await;
        let sentiment = self.load_sentiment().await;

        let computed = signals::compute(
            &SignalInputs {
                rows: &rows,
                candles: &candles,
                sentiment: &sentiment,
                now: started_at,
            },
            &self.policy,
        );

        if computed.benchmark_change_24h.is_none() {
            warn!(
                benchmark = %self.policy.benchmark_coin_id,
                "Benchmark asset missing from run, relative strength measured against 0"
            );
        }

        let outcome = self.persister.upsert_all(&computed.rows).await;
        if outcome.failed > 0 {
            warn!(
                failed = outcome.failed,
                coin_ids = %outcome.failed_coin_ids.join(","),
                "Some snapshot rows were not persisted"
            );
        }
        let persist_error = (outcome.written == 0 && outcome.failed > 0)
            .then(|| format!("persisted 0 of {} rows", computed.rows.len()));

        let rows = &computed.rows;
        let summary = RunSummary {
            success: persist_error.is_none(),
            started_at,
            coins_processed: rows.len() as i64,
            coins_upserted: outcome.written as i64,
            coins_failed: outcome.failed as i64,
            pumps_detected: count_where(rows, |s| s.is_sudden_pump),
            dumps_detected: count_where(rows, |s| s.is_sudden_dump),
            high_momentum_coins: count_where(rows, |s| s.momentum_score >= self.policy.high_momentum_score),
            strong_trends: count_where(rows, |s| s.trend_label.is_strong()),
            anomalies_detected: count_where(rows, |s| s.is_anomaly),
            sentiment_matched: computed.sentiment_matched as i64,
            sentiment_ambiguous: computed.sentiment_ambiguous as i64,
            elapsed_seconds: elapsed(),
            error: persist_error,
        };

        info!(
            coins = summary.coins_processed,
            upserted = summary.coins_upserted,
            failed = summary.coins_failed,
            pumps = summary.pumps_detected,
            dumps = summary.dumps_detected,
            high_momentum = summary.high_momentum_coins,
            strong_trends = summary.strong_trends,
            anomalies = summary.anomalies_detected,
            sentiment_matched = summary.sentiment_matched,
            market_mean_24h = computed.market_mean_24h,
            zscore_stddev = computed.population.stddev,
            elapsed_s = summary.elapsed_seconds,
            "Discovery run complete"
        );
        summary
    }

    async fn load_candles(&self, now: DateTime<Utc>) -> HashMap<String, CandleSeries> {
        let since = now - Duration::seconds(windows::VOLUME_BASELINE_SECS);
        match self.candles.get_recent_candles(since).await {
            Ok(series) => series,
            Err(e) => {
                warn!("Candle source failed, using fallbacks for every asset: {e}");
                HashMap::new()
            }
        }
    }

    async fn load_sentiment(&self) -> Vec<SentimentRecord> {
        match self.sentiment.get_sentiment().await {
            Ok(records) => records,
            Err(e) => {
                warn!("Sentiment source failed, continuing without sentiment: {e}");
                Vec::new()
            }
        }
    }
}

fn count_where(rows: &[DiscoverySnapshotRow], pred: impl Fn(&ComputedSignals) -> bool) -> i64 {
    rows.iter().filter(|r| pred(&r.signals)).count() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::queries::DiscoveryQueryService;
    use crate::db::test_pool;
    use crate::source::StaticSource;
    use crate::types::{AssetMarketRow, Candle, SentimentRecord, TrendLabel};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn row(coin_id: &str, symbol: &str, change_1h: f64, change_24h: f64, cap: f64, rank: i64) -> AssetMarketRow {
        AssetMarketRow {
            coin_id: coin_id.to_string(),
            symbol: symbol.to_string(),
            name: coin_id.to_string(),
            image: None,
            price: 100.0,
            change_1h: Some(change_1h),
            change_24h: Some(change_24h),
            change_7d: Some(1.0),
            volume_24h: Some(5_000_000.0),
            market_cap: Some(cap),
            market_cap_rank: Some(rank),
        }
    }

    fn fixture() -> StaticSource {
        let source = StaticSource::new();
        source.set_rows(vec![
            row("bitcoin", "btc", 0.2, 1.0, 1e12, 1),
            row("ethereum", "eth", -0.4, -2.0, 4e11, 2),
            row("alpha", "alp", 5.0, 6.0, 1e8, 150),
        ]);
        let at = |minutes: i64| now() - Duration::minutes(minutes);
        let candle = |open_time, close, volume| Candle { open_time, open: close, high: close, low: close, close, volume };
        source.set_candles(
            "alpha",
            vec![candle(at(220), 96.0, 100.0), candle(at(130), 98.0, 100.0), candle(at(70), 99.0, 100.0), candle(at(10), 100.0, 900.0)],
        );
        source.set_sentiment(vec![SentimentRecord { symbol: "ALP".to_string(), asi_score: 80.0, signal: Some("BULLISH".to_string()) }]);
        source
    }

    async fn engine_over(source: &StaticSource) -> (DiscoveryEngine, sqlx::SqlitePool) {
        let pool = test_pool().await;
        let shared = Arc::new(source.clone());
        let engine = DiscoveryEngine::new(
            shared.clone(),
            shared.clone(),
            shared,
            SnapshotPersister::new(pool.clone(), 2),
            SignalPolicy::default(),
            1000,
        )
        .with_clock(Box::new(now));
        (engine, pool)
    }

    async fn run_count(pool: &sqlx::SqlitePool) -> i64 {
        sqlx::query_scalar("SELECT COUNT(*) FROM discovery_runs").fetch_one(pool).await.unwrap()
    }

    #[tokio::test]
    async fn full_run_persists_every_asset() {
        let source = fixture();
        let (engine, pool) = engine_over(&source).await;

        let summary = engine.run_update().await;
        assert!(summary.success, "{:?}", summary.error);
        assert_eq!(summary.coins_processed, 3);
        assert_eq!(summary.coins_upserted, 3);
        assert_eq!(summary.coins_failed, 0);
        assert_eq!(summary.sentiment_matched, 1);
        assert_eq!(summary.started_at, now());
        assert_eq!(run_count(&pool).await, 1);
        assert_eq!(engine.state().runs_succeeded(), 1);

        // alpha: +5% in 1h on 3x hourly volume, trend 2 + 1.5 + 0.75 = 4.25 -> 4.3.
        // momentum: alpha 84, bitcoin 58, ethereum 42.
        assert_eq!(summary.pumps_detected, 1);
        assert_eq!(summary.dumps_detected, 0);
        assert_eq!(summary.high_momentum_coins, 1);
        assert_eq!(summary.strong_trends, 1);
        assert_eq!(summary.anomalies_detected, 0);

        let queries = DiscoveryQueryService::new(pool, 100_000.0);
        let alpha = queries.coin("alpha").await.unwrap().expect("alpha persisted");
        assert_eq!(alpha.asi_score, Some(80.0));
        assert_eq!(alpha.asi_signal.as_deref(), Some("BULLISH"));
        assert!((alpha.signals.change_4h - 100.0 * (100.0 / 96.0 - 1.0)).abs() < 1e-9);
        assert!((alpha.signals.volume_ratio - 3.0).abs() < 1e-9);
        assert!(alpha.signals.is_sudden_pump);
        assert_eq!(alpha.signals.momentum_score, 84);
        assert_eq!(alpha.signals.trend_label, TrendLabel::StrongUp);
        assert_eq!(alpha.updated_at, now());

        let bitcoin = queries.coin("bitcoin").await.unwrap().expect("bitcoin persisted");
        assert_eq!(bitcoin.signals.momentum_score, 58);
        assert_eq!(bitcoin.signals.trend_label, TrendLabel::Up);
    }

    #[tokio::test]
    async fn run_that_persists_nothing_is_a_failure() {
        let source = fixture();
        let (engine, pool) = engine_over(&source).await;
        sqlx::query(
            "CREATE TRIGGER reject_all BEFORE INSERT ON discovery_snapshot \
             BEGIN SELECT RAISE(ABORT, 'snapshot locked'); END",
        )
        .execute(&pool)
        .await
        .unwrap();

        let summary = engine.run_update().await;
        assert!(!summary.success);
        assert_eq!(summary.coins_processed, 3);
        assert_eq!(summary.coins_upserted, 0);
        assert_eq!(summary.coins_failed, 3);
        assert_eq!(summary.error.as_deref(), Some("persisted 0 of 3 rows"));

        let (success, error): (bool, Option<String>) = sqlx::query_as("SELECT success, error FROM discovery_runs")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert!(!success);
        assert_eq!(error.as_deref(), Some("persisted 0 of 3 rows"));
        assert_eq!(engine.state().runs_failed(), 1);
    }

    #[tokio::test]
    async fn partial_persistence_still_succeeds() {
        let source = fixture();
        let (engine, pool) = engine_over(&source).await;
        sqlx::query(
            "CREATE TRIGGER reject_eth BEFORE INSERT ON discovery_snapshot \
             WHEN NEW.coin_id = 'ethereum' BEGIN SELECT RAISE(ROLLBACK, 'rejected'); END",
        )
        .execute(&pool)
        .await
        .unwrap();

        let summary = engine.run_update().await;
        assert!(summary.success, "{:?}", summary.error);
        assert_eq!(summary.coins_upserted, 2);
        assert_eq!(summary.coins_failed, 1);
    }

    #[tokio::test]
    async fn candles_are_loaded_relative_to_the_run_clock() {
        let pool = test_pool().await;
        sqlx::query("INSERT INTO coin_markets (coin_id, symbol, name, price, change_1h, change_24h, volume_24h, market_cap, market_cap_rank) VALUES ('alpha', 'ALP', 'alpha', 100.0, 5.0, 6.0, 5000000.0, 100000000.0, 150)")
            .execute(&pool)
            .await
            .unwrap();
        // The run clock sits well before wall-clock time; these candles are only
        // visible when the lookback is taken from the run clock.
        for (minutes, close, volume) in [(220, 96.0, 100.0), (130, 98.0, 100.0), (70, 99.0, 100.0), (10, 100.0, 900.0)] {
            sqlx::query("INSERT INTO ohlcv_candles (coin_id, open_time, open, high, low, close, volume) VALUES ('alpha', ?, ?, ?, ?, ?, ?)")
                .bind((now() - Duration::minutes(minutes)).timestamp())
                .bind(close)
                .bind(close)
                .bind(close)
                .bind(close)
                .bind(volume)
                .execute(&pool)
                .await
                .unwrap();
        }

        let source = Arc::new(crate::source::SqliteSource::new(pool.clone()));
        let engine = DiscoveryEngine::new(
            source.clone(),
            source.clone(),
            source,
            SnapshotPersister::new(pool.clone(), 10),
            SignalPolicy::default(),
            1000,
        )
        .with_clock(Box::new(now));

        assert!(engine.run_update().await.success);
        let alpha = DiscoveryQueryService::new(pool, 0.0).coin("alpha").await.unwrap().unwrap();
        assert!((alpha.signals.volume_ratio - 3.0).abs() < 1e-9);
        assert!((alpha.signals.change_4h - 100.0 * (100.0 / 96.0 - 1.0)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn overlapping_run_is_rejected_without_side_effects() {
        let source = fixture();
        let (engine, pool) = engine_over(&source).await;

        let state = engine.state();
        let held = state.try_begin().expect("guard free");
        let summary = engine.run_update().await;
        drop(held);

        assert!(!summary.success);
        assert_eq!(summary.error.as_deref(), Some("run already in progress"));
        assert_eq!(run_count(&pool).await, 0);
        let snapshot: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM discovery_snapshot")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(snapshot, 0);

        assert!(engine.run_update().await.success, "guard released after rejection");
    }

    #[tokio::test]
    async fn empty_market_source_fails_and_writes_nothing() {
        let source = StaticSource::new();
        let (engine, pool) = engine_over(&source).await;

        let summary = engine.run_update().await;
        assert!(!summary.success);
        assert_eq!(summary.coins_processed, 0);
        assert!(summary.error.is_some());
        assert_eq!(run_count(&pool).await, 1, "failed runs are still logged");
        assert_eq!(engine.state().runs_failed(), 1);
    }

    #[tokio::test]
    async fn market_outage_is_reported() {
        let source = fixture();
        source.fail("market");
        let (engine, _pool) = engine_over(&source).await;

        let summary = engine.run_update().await;
        assert!(!summary.success);
        assert!(summary.error.unwrap().contains("market"));
    }

    #[tokio::test]
    async fn candle_and_sentiment_outages_fall_back_to_defaults() {
        let source = fixture();
        source.fail("candles");
        source.fail("sentiment");
        let (engine, pool) = engine_over(&source).await;

        let summary = engine.run_update().await;
        assert!(summary.success);
        assert_eq!(summary.coins_upserted, 3);
        assert_eq!(summary.sentiment_matched, 0);

        let alpha = DiscoveryQueryService::new(pool, 0.0).coin("alpha").await.unwrap().unwrap();
        assert_eq!(alpha.signals.volume_ratio, 1.0);
        assert!((alpha.signals.change_4h - 1.0).abs() < 1e-9, "24h/6 fallback");
        assert_eq!(alpha.signals.sentiment_alignment_score, 50.0);
        assert_eq!(alpha.asi_score, None);
    }

    #[tokio::test]
    async fn repeated_runs_over_unchanged_inputs_are_identical() {
        let source = fixture();
        let (engine, pool) = engine_over(&source).await;
        let queries = DiscoveryQueryService::new(pool, 0.0);

        let first = engine.run_update().await;
        let before = queries.top_discovery(10).await.unwrap();
        let second = engine.run_update().await;
        let after = queries.top_discovery(10).await.unwrap();

        assert_eq!(before, after);
        assert_eq!(first.pumps_detected, second.pumps_detected);
        assert_eq!(first.high_momentum_coins, second.high_momentum_coins);
        assert_eq!(engine.state().runs_succeeded(), 2);
    }

    #[tokio::test]
    async fn conflicting_sentiment_is_counted_and_dropped() {
        let source = fixture();
        source.set_sentiment(vec![
            SentimentRecord { symbol: "alp".to_string(), asi_score: 80.0, signal: None },
            SentimentRecord { symbol: "ALP".to_string(), asi_score: 20.0, signal: None },
        ]);
        let (engine, _pool) = engine_over(&source).await;

        let summary = engine.run_update().await;
        assert_eq!(summary.sentiment_matched, 0);
        assert_eq!(summary.sentiment_ambiguous, 1);
    }
}
