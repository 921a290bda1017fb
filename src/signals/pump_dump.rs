use crate::config::SignalPolicy;

/// Per-asset inputs the pump/dump rules look at.
#[derive(Debug, Clone, Copy)]
pub struct PumpDumpObservables {
    pub change_1h: f64,
    pub volume_ratio: f64,
    pub volume_24h: f64,
    pub is_anomaly: bool,
    pub zscore: Option<f64>,
}

/// Classify an asset as a sudden pump and/or dump.
/// Returns `(is_sudden_pump, is_sudden_dump)`.
///
/// Each flag is the OR of a volume-confirmed rule route and an anomaly route.
pub fn classify(obs: &PumpDumpObservables, policy: &SignalPolicy) -> (bool, bool) {
    let liquid_spike = obs.volume_ratio > policy.pump_volume_ratio
        && obs.volume_24h > policy.pump_min_volume_24h;
    let zscore = obs.zscore.unwrap_or(0.0);

    let rule_pump = obs.change_1h > policy.pump_change_1h_pct && liquid_spike;
    let rule_dump = obs.change_1h < -policy.pump_change_1h_pct && liquid_spike;

    let anomaly_pump = obs.is_anomaly && zscore > policy.pump_zscore;
    let anomaly_dump = obs.is_anomaly && zscore < -policy.pump_zscore;

    (rule_pump || anomaly_pump, rule_dump || anomaly_dump)
}
