//! Z-score anomaly detection over the daily history
//!
//! The latest row is compared with a trailing baseline of the rows before it.
//! Each monitored column has its own warning and critical bands. Moves in the
//! favorable direction for a column are capped at medium severity.

use chrono::Utc;

use crate::config::AnomalySettings;
use crate::models::alert::{Alert, Severity};
use crate::models::metrics::DailyRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    HigherIsBetter,
    LowerIsBetter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Spike,
    Drop,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Spike => "spike",
            Direction::Drop => "drop",
        }
    }
}

/// Daily columns the detector reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricColumn {
    TotalTransactions,
    ShieldedVolume,
    AvgFee,
    ActiveAddresses,
}

impl MetricColumn {
    pub fn name(&self) -> &'static str {
        match self {
            MetricColumn::TotalTransactions => "total_transactions",
            MetricColumn::ShieldedVolume => "shielded_volume_zec",
            MetricColumn::AvgFee => "avg_fee_zec",
            MetricColumn::ActiveAddresses => "active_addresses",
        }
    }

    pub fn value(&self, record: &DailyRecord) -> f64 {
        match self {
            MetricColumn::TotalTransactions => record.total_transactions as f64,
            MetricColumn::ShieldedVolume => record.shielded_volume_zec,
            MetricColumn::AvgFee => record.avg_fee_zec,
            MetricColumn::ActiveAddresses => record.active_addresses as f64,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MonitoredMetric {
    /// Prefix of the alert type, e.g. "fees" in "fees_spike"
    pub kind: &'static str,
    pub column: MetricColumn,
    pub polarity: Polarity,
    pub warning_z: f64,
    pub critical_z: f64,
}

pub const MONITORED_METRICS: [MonitoredMetric; 4] = [
    MonitoredMetric {
        kind: "transactions",
        column: MetricColumn::TotalTransactions,
        polarity: Polarity::HigherIsBetter,
        warning_z: 2.0,
        critical_z: 2.5,
    },
    MonitoredMetric {
        kind: "shielded_volume",
        column: MetricColumn::ShieldedVolume,
        polarity: Polarity::HigherIsBetter,
        warning_z: 2.5,
        critical_z: 3.0,
    },
    MonitoredMetric {
        kind: "fees",
        column: MetricColumn::AvgFee,
        polarity: Polarity::LowerIsBetter,
        warning_z: 2.0,
        critical_z: 2.5,
    },
    MonitoredMetric {
        kind: "addresses",
        column: MetricColumn::ActiveAddresses,
        polarity: Polarity::HigherIsBetter,
        warning_z: 2.0,
        critical_z: 2.5,
    },
];

/// Mean and sample standard deviation of a series
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BaselineStats {
    pub mean: f64,
    pub std: f64,
}

impl BaselineStats {
    /// `None` with fewer than two values. A series whose spread is only
    /// rounding noise reports a std of exactly zero.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let (first, rest) = values.split_first()?;
        if rest.is_empty() {
            return None;
        }
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        if rest.iter().all(|v| v == first) {
            return Some(Self { mean: *first, std: 0.0 });
        }

        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
        let std = variance.sqrt();
        Some(Self {
            mean,
            std: if std <= f64::EPSILON * mean.abs() { 0.0 } else { std },
        })
    }

    pub fn z_score(&self, value: f64) -> f64 {
        (value - self.mean) / self.std
    }
}

/// Result of scoring one value against its baseline
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Classification {
    pub z_score: f64,
    pub severity: Severity,
    pub direction: Direction,
    /// Move goes against the metric's polarity
    pub is_problem: bool,
}

/// Scores `current` against the baseline. `None` when the move stays within
/// the warning band or the baseline has no spread.
pub fn classify(metric: &MonitoredMetric, stats: BaselineStats, current: f64) -> Option<Classification> {
    if stats.std <= 0.0 || !stats.std.is_finite() {
        return None;
    }

    let z_score = stats.z_score(current);
    let mut severity = if z_score.abs() > metric.critical_z {
        Severity::High
    } else if z_score.abs() > metric.warning_z {
        Severity::Medium
    } else {
        return None;
    };

    let direction = if z_score > 0.0 { Direction::Spike } else { Direction::Drop };
    let is_problem = match metric.polarity {
        Polarity::HigherIsBetter => direction == Direction::Drop,
        Polarity::LowerIsBetter => direction == Direction::Spike,
    };

    if !is_problem && severity == Severity::High {
        severity = Severity::Medium;
    }

    Some(Classification {
        z_score,
        severity,
        direction,
        is_problem,
    })
}

/// "shielded_volume" -> "Shielded_Volume"
fn title_case(kind: &str) -> String {
    kind.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join("_")
}

fn alert_summary(kind: &str, direction: Direction, delta_percent: f64, severity: Severity) -> String {
    let (verb, side) = match direction {
        Direction::Spike => ("spiked", "above"),
        Direction::Drop => ("dropped", "below"),
    };
    format!(
        "{} {} {} {:.1}% {} normal",
        severity.icon(),
        title_case(kind),
        verb,
        delta_percent.abs(),
        side
    )
}

fn alert_explanation(kind: &str, classification: &Classification) -> String {
    let mut explanation = format!(
        "Statistical anomaly detected: {:.2} standard deviations from baseline. ",
        classification.z_score.abs()
    );

    let detail = match (kind, classification.direction) {
        ("transactions", Direction::Spike) => {
            "Unusual surge in network activity. Possible causes: exchange activity, airdrop, or network event."
        }
        ("transactions", Direction::Drop) => {
            "Network activity below normal. Monitor for continued decline."
        }
        ("shielded_volume", Direction::Spike) => {
            "Major increase in shielded transactions. Privacy adoption may be accelerating."
        }
        ("shielded_volume", Direction::Drop) => {
            "Shielded volume decreased. Transparent transactions dominating."
        }
        ("fees", Direction::Spike) => {
            "Fee pressure increasing. Possible mempool congestion or block size constraints."
        }
        ("fees", Direction::Drop) => "Fees unusually low. Network utilization may be decreasing.",
        ("addresses", Direction::Spike) => {
            "Significant increase in unique active addresses. Growing network participation."
        }
        ("addresses", Direction::Drop) => {
            "Fewer active addresses than normal. User engagement declining."
        }
        _ => "",
    };
    explanation.push_str(detail);

    if classification.is_problem {
        explanation.push_str(" **Action recommended**: Monitor trend.");
    }
    explanation
}

fn new_alert_id() -> String {
    let hex = uuid::Uuid::new_v4().simple().to_string();
    format!("alert-{}", &hex[..12])
}

/// A point from the whole-series scan
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Outlier {
    pub index: usize,
    pub value: f64,
    pub z_score: f64,
}

#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    zscore_threshold: f64,
    baseline_days: usize,
}

impl AnomalyDetector {
    pub fn new(settings: &AnomalySettings) -> Self {
        Self {
            zscore_threshold: settings.zscore_threshold,
            baseline_days: settings.baseline_days,
        }
    }

    /// Compares the last row of `history` (ascending by date) with the rows
    /// before it and returns at most one alert per monitored column.
    pub fn generate_alerts(&self, history: &[DailyRecord]) -> Vec<Alert> {
        let Some((latest, earlier)) = history.split_last() else {
            return Vec::new();
        };
        if earlier.is_empty() {
            tracing::debug!("Not enough history to generate alerts");
            return Vec::new();
        }

        let baseline = &earlier[earlier.len().saturating_sub(self.baseline_days)..];
        let now = Utc::now();
        let mut alerts = Vec::new();

        for metric in &MONITORED_METRICS {
            let values: Vec<f64> = baseline.iter().map(|r| metric.column.value(r)).collect();
            let Some(stats) = BaselineStats::from_values(&values) else {
                continue;
            };
            let current = metric.column.value(latest);
            let Some(classification) = classify(metric, stats, current) else {
                continue;
            };

            let delta_percent = if stats.mean != 0.0 {
                (current - stats.mean) / stats.mean * 100.0
            } else {
                0.0
            };
            let summary = alert_summary(
                metric.kind,
                classification.direction,
                delta_percent,
                classification.severity,
            );

            tracing::info!(
                metric = metric.column.name(),
                z_score = classification.z_score,
                "Generated {} alert: {}",
                classification.severity,
                summary
            );

            alerts.push(Alert {
                id: new_alert_id(),
                timestamp: now,
                alert_type: format!("{}_{}", metric.kind, classification.direction.as_str()),
                severity: classification.severity,
                metric: metric.column.name().to_string(),
                current_value: current,
                baseline_value: stats.mean,
                delta_percent,
                explanation: alert_explanation(metric.kind, &classification),
                summary,
            });
        }

        alerts
    }

    /// Every point of `series` further than the configured threshold from the
    /// series' own mean. Needs at least three points and non-zero spread.
    pub fn detect_outliers(&self, series: &[f64]) -> Vec<Outlier> {
        if series.len() < 3 {
            return Vec::new();
        }
        let Some(stats) = BaselineStats::from_values(series) else {
            return Vec::new();
        };
        if stats.std <= 0.0 || !stats.std.is_finite() {
            return Vec::new();
        }

        series
            .iter()
            .enumerate()
            .filter_map(|(index, &value)| {
                let z_score = stats.z_score(value);
                (z_score.abs() > self.zscore_threshold).then_some(Outlier {
                    index,
                    value,
                    z_score,
                })
            })
            .collect()
    }

    /// Runs the whole-series scan on each monitored column and logs what it finds
    pub fn log_historical_outliers(&self, history: &[DailyRecord]) -> usize {
        let mut found = 0;
        for metric in &MONITORED_METRICS {
            let series: Vec<f64> = history.iter().map(|r| metric.column.value(r)).collect();
            for outlier in self.detect_outliers(&series) {
                found += 1;
                tracing::debug!(
                    metric = metric.column.name(),
                    date = %history[outlier.index].date,
                    "Historical outlier: value={:.2}, z-score={:.2}σ",
                    outlier.value,
                    outlier.z_score
                );
            }
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::metrics::RawDailyMetrics;
    use chrono::{Duration, NaiveDate};

    const TRANSACTIONS: MonitoredMetric = MONITORED_METRICS[0];
    const FEES: MonitoredMetric = MONITORED_METRICS[2];

    fn detector() -> AnomalyDetector {
        AnomalyDetector::new(&AnomalySettings::default())
    }

    fn record(offset: i64, total: i64, fee: f64) -> DailyRecord {
        DailyRecord::try_from(RawDailyMetrics {
            total_transactions: total,
            shielded_transactions: total / 4,
            transparent_transactions: total - total / 4,
            shielded_volume_zec: 500.0,
            transparent_volume_zec: 1500.0,
            avg_fee_zec: fee,
            median_fee_zec: fee * 0.8,
            active_addresses: 1500,
            ..RawDailyMetrics::empty(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap() + Duration::days(offset))
        })
        .unwrap()
    }

    /// Alternating baseline with mean 1000 and sample std ~52
    fn baseline_history(days: i64) -> Vec<DailyRecord> {
        (0..days)
            .map(|i| record(i, if i % 2 == 0 { 950 } else { 1050 }, 0.0001))
            .collect()
    }

    #[test]
    fn test_sample_standard_deviation() {
        let stats = BaselineStats::from_values(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]).unwrap();
        assert_eq!(stats.mean, 5.0);
        assert!((stats.std - 2.138_089_935).abs() < 1e-9);
        assert!(BaselineStats::from_values(&[1.0]).is_none());
    }

    #[test]
    fn test_favorable_critical_move_is_downgraded() {
        let stats = BaselineStats { mean: 100.0, std: 10.0 };
        let result = classify(&TRANSACTIONS, stats, 135.0).unwrap();
        assert_eq!(result.z_score, 3.5);
        assert_eq!(result.direction, Direction::Spike);
        assert_eq!(result.severity, Severity::Medium);
        assert!(!result.is_problem);
    }

    #[test]
    fn test_unfavorable_critical_move_stays_high() {
        let stats = BaselineStats { mean: 100.0, std: 10.0 };
        let result = classify(&TRANSACTIONS, stats, 65.0).unwrap();
        assert_eq!(result.z_score, -3.5);
        assert_eq!(result.direction, Direction::Drop);
        assert_eq!(result.severity, Severity::High);
        assert!(result.is_problem);
    }

    #[test]
    fn test_fee_polarity_is_inverted() {
        let stats = BaselineStats { mean: 100.0, std: 10.0 };
        assert_eq!(classify(&FEES, stats, 135.0).unwrap().severity, Severity::High);
        assert_eq!(classify(&FEES, stats, 65.0).unwrap().severity, Severity::Medium);
    }

    #[test]
    fn test_within_band_and_zero_spread_produce_nothing() {
        let stats = BaselineStats { mean: 100.0, std: 10.0 };
        assert!(classify(&TRANSACTIONS, stats, 120.0).is_none());
        assert!(classify(&TRANSACTIONS, BaselineStats { mean: 100.0, std: 0.0 }, 500.0).is_none());
    }

    #[test]
    fn test_flat_baseline_never_alerts() {
        let mut history: Vec<DailyRecord> = (0..10).map(|i| record(i, 1000, 0.0001)).collect();
        history.push(record(10, 5000, 0.01));
        assert!(detector().generate_alerts(&history).is_empty());
    }

    #[test]
    fn test_repeated_float_baseline_has_zero_spread() {
        for value in [0.0001, 0.1, 12.3456] {
            let stats = BaselineStats::from_values(&[value; 30]).unwrap();
            assert_eq!(stats.std, 0.0);
            assert_eq!(stats.mean, value);
            assert!(classify(&FEES, stats, value * 100.0).is_none());
        }

        let stats = BaselineStats::from_values(&[1000.0; 10]).unwrap();
        assert!(classify(&TRANSACTIONS, stats, 5000.0).is_none());
    }

    #[test]
    fn test_flat_float_columns_never_alert() {
        let history: Vec<DailyRecord> = (0..11)
            .map(|i| {
                let fee = if i == 10 { 0.01 } else { 0.0001 };
                let volume = if i == 10 { 900.0 } else { 0.1 };
                DailyRecord::try_from(RawDailyMetrics {
                    total_transactions: 1000,
                    shielded_transactions: 250,
                    transparent_transactions: 750,
                    shielded_volume_zec: volume,
                    transparent_volume_zec: 10.0,
                    avg_fee_zec: fee,
                    active_addresses: 1500,
                    ..RawDailyMetrics::empty(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(i))
                })
                .unwrap()
            })
            .collect();
        assert!(detector().generate_alerts(&history).is_empty());
        assert!(detector().detect_outliers(&[0.1; 12]).is_empty());
    }

    #[test]
    fn test_short_history_produces_no_alerts() {
        assert!(detector().generate_alerts(&[]).is_empty());
        assert!(detector().generate_alerts(&[record(0, 1000, 0.0001)]).is_empty());
        // one baseline row has no sample deviation
        let history = vec![record(0, 1000, 0.0001), record(1, 9000, 0.0001)];
        assert!(detector().generate_alerts(&history).is_empty());
    }

    #[test]
    fn test_transaction_drop_alert_contents() {
        let mut history = baseline_history(10);
        history.push(record(10, 700, 0.0001));

        let alerts = detector().generate_alerts(&history);
        assert_eq!(alerts.len(), 1);

        let alert = &alerts[0];
        assert_eq!(alert.alert_type, "transactions_drop");
        assert_eq!(alert.metric, "total_transactions");
        assert_eq!(alert.severity, Severity::High);
        assert_eq!(alert.baseline_value, 1000.0);
        assert!((alert.delta_percent + 30.0).abs() < 1e-9);
        assert_eq!(alert.summary, "🔴 Transactions dropped 30.0% below normal");
        assert!(alert.explanation.starts_with("Statistical anomaly detected: 5.69"));
        assert!(alert.explanation.ends_with("**Action recommended**: Monitor trend."));
        assert!(alert.id.starts_with("alert-"));
        assert_eq!(alert.id.len(), "alert-".len() + 12);
    }

    #[test]
    fn test_baseline_window_is_trailing() {
        // old rows are far away and must be ignored with a 10-row window
        let mut history: Vec<DailyRecord> = (0..5).map(|i| record(i, 100_000, 0.0001)).collect();
        history.extend(baseline_history(10).into_iter().map(|mut r| {
            r.date += Duration::days(5);
            r
        }));
        history.push(record(15, 1010, 0.0001));

        let detector = AnomalyDetector::new(&AnomalySettings {
            baseline_days: 10,
            ..AnomalySettings::default()
        });
        assert!(detector.generate_alerts(&history).is_empty());
    }

    #[test]
    fn test_title_case_matches_alert_kinds() {
        assert_eq!(title_case("shielded_volume"), "Shielded_Volume");
        assert_eq!(title_case("fees"), "Fees");
    }

    #[test]
    fn test_detect_outliers_whole_series() {
        let mut series = vec![10.0; 20];
        series[7] = 40.0;
        let outliers = detector().detect_outliers(&series);
        assert_eq!(outliers.len(), 1);
        assert_eq!(outliers[0].index, 7);
        assert_eq!(outliers[0].value, 40.0);
        assert!(outliers[0].z_score > 2.5);

        assert!(detector().detect_outliers(&[1.0, 100.0]).is_empty());
        assert!(detector().detect_outliers(&[5.0, 5.0, 5.0]).is_empty());
    }
}
