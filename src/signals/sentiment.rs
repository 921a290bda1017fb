use std::collections::HashMap;

use tracing::{debug, warn};

use crate::types::{AssetMarketRow, SentimentRecord};

/// Sentiment keyed by upper-cased symbol.
///
/// Several records for one symbol are kept only when they agree; disagreeing records
/// make the symbol ambiguous and every asset carrying it gets no sentiment.
#[derive(Debug, Default)]
pub struct SentimentIndex {
    by_symbol: HashMap<String, SentimentRecord>,
    ambiguous: Vec<String>,
}

impl SentimentIndex {
    pub fn build(records: &[SentimentRecord]) -> Self {
        let mut by_symbol: HashMap<String, SentimentRecord> = HashMap::new();
        let mut ambiguous: Vec<String> = Vec::new();

        for record in records {
            let key = normalize(&record.symbol);
            if ambiguous.contains(&key) {
                continue;
            }
            match by_symbol.get(&key) {
                None => {
                    by_symbol.insert(key, record.clone());
                }
                Some(existing) if agrees(existing, record) => {}
                Some(_) => {
                    by_symbol.remove(&key);
                    ambiguous.push(key);
                }
            }
        }

        ambiguous.sort();
        for symbol in &ambiguous {
            warn!(symbol = %symbol, "conflicting sentiment records for symbol, leaving it unmatched");
        }

        Self { by_symbol, ambiguous }
    }

    pub fn lookup(&self, symbol: &str) -> Option<&SentimentRecord> {
        self.by_symbol.get(&normalize(symbol))
    }

    /// Symbols dropped because their records disagreed.
    pub fn ambiguous(&self) -> &[String] {
        &self.ambiguous
    }

    pub fn len(&self) -> usize {
        self.by_symbol.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_symbol.is_empty()
    }
}

/// Matched `(asi_score, signal)` per row, in row order. Unmatched rows get `None`.
pub fn merge(rows: &[AssetMarketRow], index: &SentimentIndex) -> Vec<Option<SentimentRecord>> {
    let mut symbol_owners: HashMap<String, usize> = HashMap::new();
    for row in rows {
        *symbol_owners.entry(normalize(&row.symbol)).or_insert(0) += 1;
    }

    rows.iter()
        .map(|row| {
            let matched = index.lookup(&row.symbol).cloned();
            if matched.is_some() {
                let owners = symbol_owners.get(&normalize(&row.symbol)).copied().unwrap_or(0);
                if owners > 1 {
                    debug!(
                        coin_id = %row.coin_id,
                        symbol = %row.symbol,
                        owners,
                        "sentiment symbol shared by several assets"
                    );
                }
            }
            matched
        })
        .collect()
}

fn normalize(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

fn agrees(a: &SentimentRecord, b: &SentimentRecord) -> bool {
    a.asi_score == b.asi_score && a.signal == b.signal
}
