use crate::types::AnomalyType;

/// Cross-sectional mean and population standard deviation of 24h change.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PopulationStats {
    pub count: usize,
    pub mean: f64,
    pub stddev: f64,
}

impl PopulationStats {
    pub fn from_changes(changes: impl IntoIterator<Item = f64>) -> Self {
        let values: Vec<f64> = changes.into_iter().collect();
        if values.is_empty() {
            return Self::default();
        }
        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
        Self {
            count,
            mean,
            stddev: variance.sqrt(),
        }
    }

    /// None when the asset has no 24h change; 0 for everyone when stddev is 0.
    pub fn zscore(&self, change_24h: Option<f64>) -> Option<f64> {
        let change = change_24h?;
        if self.stddev > 0.0 {
            Some((change - self.mean) / self.stddev)
        } else {
            Some(0.0)
        }
    }
}

/// `(is_anomaly, anomaly_type)` for a z-score against a strict `threshold`.
pub fn classify(zscore: Option<f64>, threshold: f64) -> (bool, Option<AnomalyType>) {
    match zscore {
        Some(z) if z > threshold => (true, Some(AnomalyType::PriceSpike)),
        Some(z) if z < -threshold => (true, Some(AnomalyType::PriceCrash)),
        _ => (false, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_asset_population_has_zero_zscore() {
        let stats = PopulationStats::from_changes([0.0]);
        assert_eq!(stats.stddev, 0.0);
        let z = stats.zscore(Some(0.0));
        assert_eq!(z, Some(0.0));
        assert_eq!(classify(z, 2.5), (false, None));
    }

    #[test]
    fn flat_population_never_divides_by_zero() {
        let stats = PopulationStats::from_changes([4.0, 4.0, 4.0]);
        assert_eq!(stats.zscore(Some(4.0)), Some(0.0));
    }

    #[test]
    fn outlier_is_flagged_with_direction() {
        // Twenty flat assets and one runaway.
        let mut changes = vec![0.0; 20];
        changes.push(50.0);
        let stats = PopulationStats::from_changes(changes);

        let z = stats.zscore(Some(50.0)).unwrap();
        assert!(z > 2.5, "z={z}");
        assert_eq!(classify(Some(z), 2.5), (true, Some(AnomalyType::PriceSpike)));
        assert_eq!(classify(Some(-z), 2.5), (true, Some(AnomalyType::PriceCrash)));

        let flat = stats.zscore(Some(0.0)).unwrap();
        assert_eq!(classify(Some(flat), 2.5), (false, None));
    }

    #[test]
    fn threshold_is_strict_and_missing_change_is_null() {
        assert_eq!(classify(Some(2.5), 2.5), (false, None));
        assert_eq!(classify(Some(-2.5), 2.5), (false, None));
        assert_eq!(PopulationStats::from_changes([1.0, 2.0]).zscore(None), None);
        assert_eq!(classify(None, 2.5), (false, None));
    }
}
