use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::db::models::{SnapshotRecord, SNAPSHOT_COLUMNS};
use crate::error::Result;
use crate::latency::{LatencyPercentiles, LatencyStats};
use crate::types::{DiscoverySnapshotRow, RunSummary, SnapshotSummary, Timeframe, TrendDirection};

/// Read-only ranked views over `discovery_snapshot`.
///
/// Every ranked query applies the liquidity floor (`volume_24h > floor`) before
/// ordering and breaks ties on `coin_id ASC`, so equal sort keys always come back in
/// the same order. Reads never take the run guard.
#[derive(Clone)]
pub struct DiscoveryQueryService {
    pool: sqlx::SqlitePool,
    liquidity_floor: f64,
    latency: Arc<LatencyStats>,
}

#[derive(sqlx::FromRow)]
struct SummaryRecord {
    total_coins: i64,
    liquid_coins: i64,
    sudden_pumps: i64,
    sudden_dumps: i64,
    anomalies: i64,
    outperformers: i64,
    last_updated_at: Option<DateTime<Utc>>,
}

impl DiscoveryQueryService {
    pub fn new(pool: sqlx::SqlitePool, liquidity_floor: f64) -> Self {
        Self {
            pool,
            liquidity_floor,
            latency: Arc::new(LatencyStats::new()),
        }
    }

    // -----------------------------------------------------------------------
    // Core ranked queries
    // -----------------------------------------------------------------------

    pub async fn top_gainers(&self, timeframe: Timeframe, limit: usize) -> Result<Vec<DiscoverySnapshotRow>> {
        let col = timeframe.column();
        self.ranked(&format!("{col} IS NOT NULL"), &format!("{col} DESC"), None, limit).await
    }

    pub async fn top_losers(&self, timeframe: Timeframe, limit: usize) -> Result<Vec<DiscoverySnapshotRow>> {
        let col = timeframe.column();
        self.ranked(&format!("{col} IS NOT NULL"), &format!("{col} ASC"), None, limit).await
    }

    pub async fn sudden_pumps(&self, limit: usize) -> Result<Vec<DiscoverySnapshotRow>> {
        self.ranked("is_sudden_pump = 1 AND change_1h IS NOT NULL", "change_1h DESC", None, limit)
            .await
    }

    pub async fn sudden_dumps(&self, limit: usize) -> Result<Vec<DiscoverySnapshotRow>> {
        self.ranked("is_sudden_dump = 1 AND change_1h IS NOT NULL", "change_1h ASC", None, limit)
            .await
    }

    pub async fn most_traded(&self, limit: usize) -> Result<Vec<DiscoverySnapshotRow>> {
        self.ranked("1 = 1", "volume_24h DESC", None, limit).await
    }

    // -----------------------------------------------------------------------
    // Signal views
    // -----------------------------------------------------------------------

    pub async fn top_discovery(&self, limit: usize) -> Result<Vec<DiscoverySnapshotRow>> {
        self.ranked("1 = 1", "discovery_score DESC", None, limit).await
    }

    pub async fn high_momentum(&self, min_score: i64, limit: usize) -> Result<Vec<DiscoverySnapshotRow>> {
        self.ranked("momentum_score >= ?", "momentum_score DESC", Some(min_score), limit)
            .await
    }

    pub async fn outperformers(&self, limit: usize) -> Result<Vec<DiscoverySnapshotRow>> {
        self.ranked("is_outperformer = 1", "rs_score DESC", None, limit).await
    }

    pub async fn anomalies(&self, limit: usize) -> Result<Vec<DiscoverySnapshotRow>> {
        self.ranked("is_anomaly = 1", "ABS(price_zscore) DESC", None, limit).await
    }

    pub async fn trending(&self, direction: TrendDirection, limit: usize) -> Result<Vec<DiscoverySnapshotRow>> {
        let order = match direction {
            TrendDirection::Up => "trend_score DESC",
            TrendDirection::Down => "trend_score ASC",
        };
        let filter = match direction {
            TrendDirection::Up => "trend_label IN ('UP', 'STRONG_UP')",
            TrendDirection::Down => "trend_label IN ('DOWN', 'STRONG_DOWN')",
        };
        self.ranked(filter, order, None, limit).await
    }

    /// Single coin lookup. Not subject to the liquidity floor.
    pub async fn coin(&self, coin_id: &str) -> Result<Option<DiscoverySnapshotRow>> {
        let started = Instant::now();
        let sql = format!("SELECT {SNAPSHOT_COLUMNS} FROM discovery_snapshot WHERE coin_id = ?");
        let record = sqlx::query_as::<_, SnapshotRecord>(&sql)
            .bind(coin_id)
            .fetch_optional(&self.pool)
            .await?;
        self.latency.record(started.elapsed());
        Ok(record.map(DiscoverySnapshotRow::from))
    }

    pub async fn summary(&self) -> Result<SnapshotSummary> {
        let started = Instant::now();
        let r = sqlx::query_as::<_, SummaryRecord>(
            r#"
            SELECT
                COUNT(*) AS total_coins,
                COALESCE(SUM(CASE WHEN volume_24h > ? THEN 1 ELSE 0 END), 0) AS liquid_coins,
                COALESCE(SUM(is_sudden_pump), 0) AS sudden_pumps,
                COALESCE(SUM(is_sudden_dump), 0) AS sudden_dumps,
                COALESCE(SUM(is_anomaly), 0) AS anomalies,
                COALESCE(SUM(is_outperformer), 0) AS outperformers,
                MAX(updated_at) AS last_updated_at
            FROM discovery_snapshot
            "#,
        )
        .bind(self.liquidity_floor)
        .fetch_one(&self.pool)
        .await?;
        self.latency.record(started.elapsed());

        Ok(SnapshotSummary {
            total_coins: r.total_coins,
            liquid_coins: r.liquid_coins,
            sudden_pumps: r.sudden_pumps,
            sudden_dumps: r.sudden_dumps,
            anomalies: r.anomalies,
            outperformers: r.outperformers,
            last_updated_at: r.last_updated_at,
        })
    }

    /// Run log entries, newest first.
    pub async fn recent_runs(&self, limit: usize) -> Result<Vec<RunSummary>> {
        let started = Instant::now();
        let runs = sqlx::query_as::<_, RunSummary>(
            r#"
            SELECT success, started_at, coins_processed, coins_upserted, coins_failed,
                   pumps_detected, dumps_detected, high_momentum_coins, strong_trends,
                   anomalies_detected, sentiment_matched, sentiment_ambiguous,
                   elapsed_seconds, error
            FROM discovery_runs
            ORDER BY id DESC
            LIMIT ?
            "#,
        )
        .bind(sql_limit(limit))
        .fetch_all(&self.pool)
        .await?;
        self.latency.record(started.elapsed());
        Ok(runs)
    }

    pub fn latency(&self) -> LatencyPercentiles {
        self.latency.percentiles()
    }

    /// `filter` may hold at most one `?`, bound to `param`.
    async fn ranked(
        &self,
        filter: &str,
        order: &str,
        param: Option<i64>,
        limit: usize,
    ) -> Result<Vec<DiscoverySnapshotRow>> {
        let started = Instant::now();
        let sql = format!(
            "SELECT {SNAPSHOT_COLUMNS} FROM discovery_snapshot \
             WHERE volume_24h > ? AND ({filter}) \
             ORDER BY {order}, coin_id ASC LIMIT ?"
        );

        let mut query = sqlx::query_as::<_, SnapshotRecord>(&sql).bind(self.liquidity_floor);
        if let Some(p) = param {
            query = query.bind(p);
        }
        let records = query.bind(sql_limit(limit)).fetch_all(&self.pool).await?;

        let elapsed = started.elapsed();
        self.latency.record(elapsed);
        debug!(order, rows = records.len(), elapsed_us = elapsed.as_micros() as u64, "snapshot query");

        Ok(records.into_iter().map(DiscoverySnapshotRow::from).collect())
    }
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::db::testing::snapshot_row;
    use crate::db::writer::SnapshotPersister;
    use crate::types::{AnomalyType, TrendLabel};
    use chrono::TimeZone;

    const FLOOR: f64 = 100_000.0;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    async fn service_with(rows: Vec<DiscoverySnapshotRow>) -> DiscoveryQueryService {
        let pool = test_pool().await;
        let outcome = SnapshotPersister::new(pool.clone(), 100).upsert_all(&rows).await;
        assert_eq!(outcome.failed, 0);
        DiscoveryQueryService::new(pool, FLOOR)
    }

    fn ids(rows: &[DiscoverySnapshotRow]) -> Vec<&str> {
        rows.iter().map(|r| r.market.coin_id.as_str()).collect()
    }

    fn pump(coin_id: &str, change_1h: f64) -> DiscoverySnapshotRow {
        let mut row = snapshot_row(coin_id, 1.0, t0());
        row.market.change_1h = Some(change_1h);
        row.signals.is_sudden_pump = true;
        row
    }

    #[tokio::test]
    async fn sudden_pumps_returns_only_qualifying_rows_by_change_1h() {
        let mut quiet = snapshot_row("quiet", 1.0, t0());
        quiet.market.change_1h = Some(50.0);
        let service = service_with(vec![pump("a", 4.0), pump("b", 9.0), quiet, pump("c", 6.5)]).await;

        let rows = service.sudden_pumps(5).await.unwrap();
        assert_eq!(ids(&rows), ["b", "c", "a"]);
    }

    #[tokio::test]
    async fn liquidity_floor_is_strict_and_excludes_null_volume() {
        let mut at_floor = pump("at_floor", 10.0);
        at_floor.market.volume_24h = Some(FLOOR);
        let mut no_volume = pump("no_volume", 10.0);
        no_volume.market.volume_24h = None;
        let service = service_with(vec![at_floor, no_volume, pump("liquid", 5.0)]).await;

        assert_eq!(ids(&service.sudden_pumps(10).await.unwrap()), ["liquid"]);
        assert_eq!(ids(&service.most_traded(10).await.unwrap()), ["liquid"]);
    }

    #[tokio::test]
    async fn ties_break_on_coin_id() {
        let service = service_with(vec![pump("zeta", 5.0), pump("alpha", 5.0), pump("mid", 5.0)]).await;
        let first = service.sudden_pumps(10).await.unwrap();
        let second = service.sudden_pumps(10).await.unwrap();
        assert_eq!(ids(&first), ["alpha", "mid", "zeta"]);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn gainers_and_losers_skip_null_changes() {
        let mut up = snapshot_row("up", 1.0, t0());
        up.market.change_7d = Some(30.0);
        let mut down = snapshot_row("down", 1.0, t0());
        down.market.change_7d = Some(-12.0);
        let mut unknown = snapshot_row("unknown", 1.0, t0());
        unknown.market.change_7d = None;
        let service = service_with(vec![up, down, unknown]).await;

        assert_eq!(ids(&service.top_gainers(Timeframe::SevenDays, 10).await.unwrap()), ["up", "down"]);
        assert_eq!(ids(&service.top_losers(Timeframe::SevenDays, 1).await.unwrap()), ["down"]);
    }

    #[tokio::test]
    async fn change_4h_gainers_use_computed_column() {
        let mut a = snapshot_row("a", 1.0, t0());
        a.signals.change_4h = 1.5;
        let mut b = snapshot_row("b", 1.0, t0());
        b.signals.change_4h = 3.0;
        let service = service_with(vec![a, b]).await;
        assert_eq!(ids(&service.top_gainers(Timeframe::FourHours, 10).await.unwrap()), ["b", "a"]);
    }

    #[tokio::test]
    async fn most_traded_orders_by_volume() {
        let mut small = snapshot_row("small", 1.0, t0());
        small.market.volume_24h = Some(200_000.0);
        let mut big = snapshot_row("big", 1.0, t0());
        big.market.volume_24h = Some(9_000_000.0);
        let service = service_with(vec![small, big]).await;
        assert_eq!(ids(&service.most_traded(10).await.unwrap()), ["big", "small"]);
    }

    #[tokio::test]
    async fn signal_views_filter_and_order() {
        let mut hot = snapshot_row("hot", 1.0, t0());
        hot.signals.momentum_score = 82;
        hot.signals.discovery_score = 90;
        hot.signals.trend_score = 4.5;
        hot.signals.trend_label = TrendLabel::StrongUp;
        let mut warm = snapshot_row("warm", 1.0, t0());
        warm.signals.momentum_score = 71;
        warm.signals.is_outperformer = true;
        warm.signals.rs_score = 66;
        warm.signals.trend_score = -2.5;
        warm.signals.trend_label = TrendLabel::Down;
        let mut crash = snapshot_row("crash", 1.0, t0());
        crash.signals.is_anomaly = true;
        crash.signals.price_zscore = Some(-3.4);
        crash.signals.anomaly_type = Some(AnomalyType::PriceCrash);
        let mut spike = snapshot_row("spike", 1.0, t0());
        spike.signals.is_anomaly = true;
        spike.signals.price_zscore = Some(2.8);
        spike.signals.anomaly_type = Some(AnomalyType::PriceSpike);
        let service = service_with(vec![hot, warm, crash, spike]).await;

        assert_eq!(ids(&service.high_momentum(70, 10).await.unwrap()), ["hot", "warm"]);
        assert_eq!(ids(&service.top_discovery(1).await.unwrap()), ["hot"]);
        assert_eq!(ids(&service.outperformers(10).await.unwrap()), ["warm"]);
        assert_eq!(ids(&service.trending(TrendDirection::Up, 10).await.unwrap()), ["hot"]);
        assert_eq!(ids(&service.trending(TrendDirection::Down, 10).await.unwrap()), ["warm"]);

        let anomalies = service.anomalies(10).await.unwrap();
        assert_eq!(ids(&anomalies), ["crash", "spike"]);
        assert_eq!(anomalies[0].signals.anomaly_type, Some(AnomalyType::PriceCrash));
    }

    #[tokio::test]
    async fn coin_lookup_ignores_floor() {
        let mut illiquid = snapshot_row("tiny", 0.5, t0());
        illiquid.market.volume_24h = Some(10.0);
        let service = service_with(vec![illiquid.clone()]).await;

        assert_eq!(service.coin("tiny").await.unwrap(), Some(illiquid));
        assert_eq!(service.coin("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn summary_counts_snapshot() {
        let mut illiquid = snapshot_row("tiny", 0.5, t0());
        illiquid.market.volume_24h = Some(10.0);
        let later = t0() + chrono::Duration::minutes(5);
        let mut dump = snapshot_row("dump", 1.0, later);
        dump.signals.is_sudden_dump = true;
        let service = service_with(vec![illiquid, pump("p", 5.0), dump]).await;

        let s = service.summary().await.unwrap();
        assert_eq!(s.total_coins, 3);
        assert_eq!(s.liquid_coins, 2);
        assert_eq!(s.sudden_pumps, 1);
        assert_eq!(s.sudden_dumps, 1);
        assert_eq!(s.anomalies, 0);
        assert_eq!(s.last_updated_at, Some(later));
    }

    #[tokio::test]
    async fn empty_snapshot_summary() {
        let service = service_with(vec![]).await;
        let s = service.summary().await.unwrap();
        assert_eq!(s.total_coins, 0);
        assert_eq!(s.last_updated_at, None);
    }

    #[tokio::test]
    async fn recent_runs_newest_first() {
        let pool = test_pool().await;
        let persister = SnapshotPersister::new(pool.clone(), 10);
        persister.record_run(&RunSummary::failed(t0(), 0.1, "first")).await.unwrap();
        persister
            .record_run(&RunSummary::failed(t0() + chrono::Duration::minutes(5), 0.1, "second"))
            .await
            .unwrap();

        let service = DiscoveryQueryService::new(pool, FLOOR);
        let runs = service.recent_runs(10).await.unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].error.as_deref(), Some("second"));
        assert!(service.latency().samples >= 1);
    }

    #[tokio::test]
    async fn serialized_rows_round_floats_and_keep_iso_timestamps() {
        let mut row = pump("p", 5.123456789);
        row.signals.volume_ratio = 2.0000004;
        let service = service_with(vec![row]).await;

        let rows = service.sudden_pumps(1).await.unwrap();
        let json = serde_json::to_value(&rows[0]).unwrap();
        assert_eq!(json["change_1h"], 5.123457);
        assert_eq!(json["volume_ratio"], 2.0);
        assert_eq!(json["is_sudden_pump"], true);
        assert_eq!(json["trend_label"], "NEUTRAL");
        assert_eq!(json["updated_at"], "2026-03-01T12:00:00Z");
    }
}
