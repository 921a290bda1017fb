use sqlx::SqliteConnection;
use tracing::{debug, error, info, warn};

use crate::error::Result;
use crate::types::{DiscoverySnapshotRow, RunSummary};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistOutcome {
    pub written: usize,
    pub failed: usize,
    pub failed_coin_ids: Vec<String>,
}

/// Upserts computed snapshot rows into `discovery_snapshot` and appends run outcomes
/// to `discovery_runs`.
///
/// Rows go in batches of `batch_size`, one transaction per batch. A row that fails is
/// logged and counted, the batch transaction is rolled back and the remaining rows of
/// the batch are re-applied in a fresh transaction. A batch whose commit fails counts
/// all of its rows as failed.
#[derive(Clone)]
pub struct SnapshotPersister {
    pool: sqlx::SqlitePool,
    batch_size: usize,
}

impl SnapshotPersister {
    pub fn new(pool: sqlx::SqlitePool, batch_size: usize) -> Self {
        Self {
            pool,
            batch_size: batch_size.max(1),
        }
    }

    pub async fn upsert_all(&self, rows: &[DiscoverySnapshotRow]) -> PersistOutcome {
        let mut outcome = PersistOutcome::default();
        if rows.is_empty() {
            warn!("No snapshot rows to persist");
            return outcome;
        }

        let mut conn = match self.pool.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                error!(rows = rows.len(), "Failed to acquire connection for snapshot: {e}");
                outcome.record_failures(rows);
                return outcome;
            }
        };

        for (batch_no, batch) in rows.chunks(self.batch_size).enumerate() {
            let mut pending: Vec<&DiscoverySnapshotRow> = batch.iter().collect();
            while !pending.is_empty() {
                match write_batch(&mut conn, &pending).await {
                    Ok(()) => {
                        outcome.written += pending.len();
                        break;
                    }
                    Err(BatchError::Row(idx, e)) => {
                        let row = pending.remove(idx);
                        error!(batch = batch_no, coin_id = %row.market.coin_id, "Snapshot upsert failed: {e}");
                        outcome.record_failures([row]);
                    }
                    Err(BatchError::Transaction(e)) => {
                        error!(batch = batch_no, rows = pending.len(), "Snapshot batch transaction failed: {e}");
                        outcome.record_failures(pending.drain(..));
                    }
                }
            }
        }

        info!(written = outcome.written, failed = outcome.failed, "Snapshot persisted");
        outcome
    }

    pub async fn record_run(&self, summary: &RunSummary) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO discovery_runs (
                started_at, success, coins_processed, coins_upserted, coins_failed,
                pumps_detected, dumps_detected, high_momentum_coins, strong_trends,
                anomalies_detected, sentiment_matched, sentiment_ambiguous,
                elapsed_seconds, error
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(summary.started_at)
        .bind(summary.success)
        .bind(summary.coins_processed)
        .bind(summary.coins_upserted)
        .bind(summary.coins_failed)
        .bind(summary.pumps_detected)
        .bind(summary.dumps_detected)
        .bind(summary.high_momentum_coins)
        .bind(summary.strong_trends)
        .bind(summary.anomalies_detected)
        .bind(summary.sentiment_matched)
        .bind(summary.sentiment_ambiguous)
        .bind(summary.elapsed_seconds)
        .bind(summary.error.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

impl PersistOutcome {
    fn record_failures<'a>(&mut self, rows: impl IntoIterator<Item = &'a DiscoverySnapshotRow>) {
        for row in rows {
            self.failed += 1;
            self.failed_coin_ids.push(row.market.coin_id.clone());
        }
    }
}

enum BatchError {
    /// Row at this index of the batch failed; nothing of the batch is committed.
    Row(usize, sqlx::Error),
    Transaction(sqlx::Error),
}

/// Writes `rows` in one transaction, stopping at the first failing row.
///
/// The transaction is driven with plain statements: a trigger or constraint can end
/// it from inside SQLite, and a trailing `ROLLBACK` then finds nothing to undo.
async fn write_batch(conn: &mut SqliteConnection, rows: &[&DiscoverySnapshotRow]) -> std::result::Result<(), BatchError> {
    sqlx::query("BEGIN IMMEDIATE")
        .execute(&mut *conn)
        .await
        .map_err(BatchError::Transaction)?;

    for (idx, row) in rows.iter().enumerate() {
        if let Err(e) = upsert_row(conn, row).await {
            rollback(conn).await;
            return Err(BatchError::Row(idx, e));
        }
    }

    if let Err(e) = sqlx::query("COMMIT").execute(&mut *conn).await {
        rollback(conn).await;
        return Err(BatchError::Transaction(e));
    }
    Ok(())
}

async fn rollback(conn: &mut SqliteConnection) {
    // Fails with "no transaction is active" when SQLite already rolled back.
    if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
        debug!("Snapshot rollback: {e}");
    }
}

async fn upsert_row(conn: &mut SqliteConnection, row: &DiscoverySnapshotRow) -> std::result::Result<(), sqlx::Error> {
    let m = &row.market;
    let s = &row.signals;

    sqlx::query(
        r#"
        INSERT INTO discovery_snapshot (
            coin_id, symbol, name, image, price,
            change_1h, change_4h, change_24h, change_7d,
            volume_24h, market_cap, market_cap_rank,
            volume_1h, avg_volume_1h, volume_ratio, volume_change_pct,
            price_action_score, volume_score, trend_consistency_score, sentiment_alignment_score,
            momentum_score, trend_score, trend_label,
            rs_vs_benchmark, rs_vs_market, rs_score, is_outperformer,
            price_zscore, is_anomaly, anomaly_type, is_sudden_pump, is_sudden_dump,
            discovery_score, asi_score, asi_signal, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?,
                  ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(coin_id) DO UPDATE SET
            symbol = excluded.symbol,
            name = excluded.name,
            image = excluded.image,
            price = excluded.price,
            change_1h = excluded.change_1h,
            change_4h = excluded.change_4h,
            change_24h = excluded.change_24h,
            change_7d = excluded.change_7d,
            volume_24h = excluded.volume_24h,
            market_cap = excluded.market_cap,
            market_cap_rank = excluded.market_cap_rank,
            volume_1h = excluded.volume_1h,
            avg_volume_1h = excluded.avg_volume_1h,
            volume_ratio = excluded.volume_ratio,
            volume_change_pct = excluded.volume_change_pct,
            price_action_score = excluded.price_action_score,
            volume_score = excluded.volume_score,
            trend_consistency_score = excluded.trend_consistency_score,
            sentiment_alignment_score = excluded.sentiment_alignment_score,
            momentum_score = excluded.momentum_score,
            trend_score = excluded.trend_score,
            trend_label = excluded.trend_label,
            rs_vs_benchmark = excluded.rs_vs_benchmark,
            rs_vs_market = excluded.rs_vs_market,
            rs_score = excluded.rs_score,
            is_outperformer = excluded.is_outperformer,
            price_zscore = excluded.price_zscore,
            is_anomaly = excluded.is_anomaly,
            anomaly_type = excluded.anomaly_type,
            is_sudden_pump = excluded.is_sudden_pump,
            is_sudden_dump = excluded.is_sudden_dump,
            discovery_score = excluded.discovery_score,
            asi_score = excluded.asi_score,
            asi_signal = excluded.asi_signal,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&m.coin_id)
    .bind(&m.symbol)
    .bind(&m.name)
    .bind(m.image.as_deref())
    .bind(m.price)
    .bind(m.change_1h)
    .bind(s.change_4h)
    .bind(m.change_24h)
    .bind(m.change_7d)
    .bind(m.volume_24h)
    .bind(m.market_cap)
    .bind(m.market_cap_rank)
    .bind(s.volume_1h)
    .bind(s.avg_volume_1h)
    .bind(s.volume_ratio)
    .bind(s.volume_change_pct)
    .bind(s.price_action_score)
    .bind(s.volume_score)
    .bind(s.trend_consistency_score)
    .bind(s.sentiment_alignment_score)
    .bind(s.momentum_score)
    .bind(s.trend_score)
    .bind(s.trend_label.as_str())
    .bind(s.rs_vs_benchmark)
    .bind(s.rs_vs_market)
    .bind(s.rs_score)
    .bind(s.is_outperformer)
    .bind(s.price_zscore)
    .bind(s.is_anomaly)
    .bind(s.anomaly_type.map(|t| t.as_str()))
    .bind(s.is_sudden_pump)
    .bind(s.is_sudden_dump)
    .bind(s.discovery_score)
    .bind(row.asi_score)
    .bind(row.asi_signal.as_deref())
    .bind(row.updated_at)
    .execute(&mut *conn)
    .await?;

    Ok(())
}
