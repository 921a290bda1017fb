//! Command-line reader over the discovery snapshot. Prints one query result as JSON.
//!
//! ```text
//! discovery_query gainers|losers <1h|4h|24h|7d> [limit]
//! discovery_query pumps|dumps|traded|discovery|outperformers|anomalies [limit]
//! discovery_query momentum [min_score] [limit]
//! discovery_query trending <up|down> [limit]
//! discovery_query coin <coin_id>
//! discovery_query summary
//! discovery_query runs [limit]
//! ```

use std::io::Write;

use serde::Serialize;

use market_discovery::config::Config;
use market_discovery::db::{self, queries::DiscoveryQueryService};
use market_discovery::error::{AppError, Result};
use market_discovery::types::{Timeframe, TrendDirection};

const DEFAULT_LIMIT: usize = 20;

#[tokio::main]
async fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    // Logs go to stderr so stdout stays parseable JSON.
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&cfg.log_level))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(&cfg, &args).await {
        eprintln!("{e}");
        std::process::exit(1);
    }
}

async fn run(cfg: &Config, args: &[String]) -> Result<()> {
    let Some(command) = args.first().map(String::as_str) else {
        return Err(usage());
    };

    let pool = db::connect_read_only(&cfg.db_path).await?;
    let service = DiscoveryQueryService::new(pool, cfg.liquidity_floor_usd);
    let arg = |i: usize| args.get(i).map(String::as_str);

    match command {
        "gainers" | "losers" => {
            let timeframe: Timeframe = arg(1).ok_or_else(usage)?.parse().map_err(AppError::Config)?;
            let limit = parse_limit(arg(2))?;
            let rows = if command == "gainers" {
                service.top_gainers(timeframe, limit).await?
            } else {
                service.top_losers(timeframe, limit).await?
            };
            print_json(&rows)
        }
        "pumps" => print_json(&service.sudden_pumps(parse_limit(arg(1))?).await?),
        "dumps" => print_json(&service.sudden_dumps(parse_limit(arg(1))?).await?),
        "traded" => print_json(&service.most_traded(parse_limit(arg(1))?).await?),
        "discovery" => print_json(&service.top_discovery(parse_limit(arg(1))?).await?),
        "outperformers" => print_json(&service.outperformers(parse_limit(arg(1))?).await?),
        "anomalies" => print_json(&service.anomalies(parse_limit(arg(1))?).await?),
        "momentum" => {
            let min_score = match arg(1) {
                Some(s) => s
                    .parse::<i64>()
                    .map_err(|_| AppError::Config(format!("invalid min_score: {s}")))?,
                None => cfg.policy.high_momentum_score,
            };
            print_json(&service.high_momentum(min_score, parse_limit(arg(2))?).await?)
        }
        "trending" => {
            let direction = match arg(1) {
                Some("up") => TrendDirection::Up,
                Some("down") => TrendDirection::Down,
                _ => return Err(usage()),
            };
            print_json(&service.trending(direction, parse_limit(arg(2))?).await?)
        }
        "coin" => {
            let coin_id = arg(1).ok_or_else(usage)?;
            print_json(&service.coin(coin_id).await?)
        }
        "summary" => print_json(&service.summary().await?),
        "runs" => print_json(&service.recent_runs(parse_limit(arg(1))?).await?),
        _ => Err(usage()),
    }?;

    tracing::debug!(latency = ?service.latency(), "query latency");
    Ok(())
}

fn parse_limit(raw: Option<&str>) -> Result<usize> {
    match raw {
        None => Ok(DEFAULT_LIMIT),
        Some(s) => s
            .parse::<usize>()
            .map_err(|_| AppError::Config(format!("invalid limit: {s}"))),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let body = serde_json::to_string_pretty(value)?;
    let mut out = std::io::stdout().lock();
    writeln!(out, "{body}")?;
    Ok(())
}

fn usage() -> AppError {
    AppError::Config(
        "usage: discovery_query <gainers|losers <tf>|pumps|dumps|traded|discovery|outperformers|\
         anomalies|momentum [min]|trending <up|down>|coin <id>|summary|runs> [limit]"
            .to_string(),
    )
}
