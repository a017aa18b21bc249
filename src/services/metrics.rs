//! Derived metrics over the stored daily rows
//!
//! Every function here is pure: it takes an ascending slice of
//! [`DailyRecord`]s and returns a response model. Handlers load the rows and
//! call into this module on each request, nothing is cached.
//!
//! Rounding is part of the response contract: percentages use 2 decimals,
//! velocities 3, ratios 4 and fees 6.

use chrono::NaiveDate;

use crate::models::metrics::{
    ComponentScores, DailyRecord, HealthBreakdown, HealthStatus, KpiCard, MetricsSummary,
    MomentumResponse, NetworkHealthDetailed, PoolAdoptionTrend, PoolMigrationResponse,
    PrivacyMetricsResponse, PrivacyTrend, Trend,
};
use crate::services::insights;

/// Rows averaged for the short trailing baseline
pub const SHORT_WINDOW: usize = 7;
/// Rows used for long windows (summary, momentum, privacy, pool migration)
pub const LONG_WINDOW: usize = 30;

const MOMENTUM_TREND_BAND: f64 = 5.0;
const FORECAST_DAYS: f64 = 30.0;

/// Rounds half away from zero to `places` decimals
pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (count > 0).then(|| sum / count as f64)
}

fn tail<T>(items: &[T], n: usize) -> &[T] {
    &items[items.len().saturating_sub(n)..]
}

/// Latest row and the one before it
fn latest_pair(records: &[DailyRecord]) -> Option<(&DailyRecord, Option<&DailyRecord>)> {
    let (latest, rest) = records.split_last()?;
    Some((latest, rest.last()))
}

// ---------------------------------------------------------------------------
// KPI cards
// ---------------------------------------------------------------------------

/// Day-over-day relative change in percent
fn pct_change(current: f64, previous: Option<f64>) -> Option<f64> {
    match previous {
        Some(prev) if prev != 0.0 => Some(round_to((current - prev) / prev * 100.0, 2)),
        _ => None,
    }
}

/// Day-over-day change of a ratio, in percentage points
fn point_change(current: f64, previous: Option<f64>) -> Option<f64> {
    match previous {
        Some(prev) if prev != 0.0 => Some(round_to((current - prev) * 100.0, 2)),
        _ => None,
    }
}

pub fn trend(current: f64, previous: Option<f64>) -> Option<Trend> {
    let prev = previous?;
    Some(if current > prev {
        Trend::Up
    } else if current < prev {
        Trend::Down
    } else {
        Trend::Flat
    })
}

fn classify_drop(change: Option<f64>, critical_drop: f64) -> HealthStatus {
    match change {
        None => HealthStatus::Good,
        Some(c) if c >= -5.0 => HealthStatus::Good,
        Some(c) if c <= critical_drop => HealthStatus::Critical,
        Some(_) => HealthStatus::Warning,
    }
}

pub fn classify_total_transactions(change: Option<f64>) -> HealthStatus {
    classify_drop(change, -15.0)
}

pub fn classify_active_addresses(change: Option<f64>) -> HealthStatus {
    classify_drop(change, -20.0)
}

pub fn classify_shielded_share(ratio: f64) -> HealthStatus {
    if ratio >= 0.35 {
        HealthStatus::Good
    } else if ratio <= 0.2 {
        HealthStatus::Critical
    } else {
        HealthStatus::Warning
    }
}

pub fn classify_fee(fee: f64) -> HealthStatus {
    if fee <= 0.00025 {
        HealthStatus::Good
    } else if fee >= 0.0004 {
        HealthStatus::Critical
    } else {
        HealthStatus::Warning
    }
}

/// The four headline cards for the latest day. Empty when there are no rows.
pub fn kpi_cards(records: &[DailyRecord]) -> Vec<KpiCard> {
    let Some((latest, previous)) = latest_pair(records) else {
        return Vec::new();
    };

    let total = latest.total_transactions as f64;
    let prev_total = previous.map(|p| p.total_transactions as f64);
    let total_change = pct_change(total, prev_total);

    let share = latest.shielded_tx_ratio();
    let prev_share = previous.map(|p| p.shielded_tx_ratio());

    let fee = latest.avg_fee_zec;
    let prev_fee = previous.map(|p| p.avg_fee_zec);

    let addresses = latest.active_addresses as f64;
    let prev_addresses = previous.map(|p| p.active_addresses as f64);
    let address_change = pct_change(addresses, prev_addresses);

    vec![
        KpiCard {
            name: "Total Transactions".to_string(),
            value: total,
            unit: "tx".to_string(),
            delta_percent: total_change,
            trend: trend(total, prev_total),
            insight: Some(insights::describe_tx_change(latest, previous)),
            status: classify_total_transactions(total_change),
        },
        KpiCard {
            name: "Shielded Share".to_string(),
            value: round_to(share * 100.0, 2),
            unit: "%".to_string(),
            delta_percent: point_change(share, prev_share),
            trend: trend(share, prev_share),
            insight: Some(insights::describe_shielded_share(latest, previous)),
            status: classify_shielded_share(share),
        },
        KpiCard {
            name: "Average Fee".to_string(),
            value: fee,
            unit: "ZEC".to_string(),
            delta_percent: pct_change(fee, prev_fee),
            trend: trend(fee, prev_fee),
            insight: Some(insights::describe_fee_change(latest, previous)),
            status: classify_fee(fee),
        },
        KpiCard {
            name: "Active Addresses".to_string(),
            value: addresses,
            unit: "addresses".to_string(),
            delta_percent: address_change,
            trend: trend(addresses, prev_addresses),
            insight: Some(insights::describe_address_change(latest, previous)),
            status: classify_active_addresses(address_change),
        },
    ]
}

// ---------------------------------------------------------------------------
// Summary health
// ---------------------------------------------------------------------------

/// How far a value may drift from its trailing mean before it is flagged
#[derive(Debug, Clone, Copy)]
pub struct HealthThresholds {
    pub higher_is_better: bool,
    pub warning: f64,
    pub critical: f64,
}

pub const THROUGHPUT_THRESHOLDS: HealthThresholds = HealthThresholds {
    higher_is_better: true,
    warning: 0.1,
    critical: 0.2,
};
pub const PRIVACY_THRESHOLDS: HealthThresholds = HealthThresholds {
    higher_is_better: true,
    warning: 0.05,
    critical: 0.1,
};
pub const COST_THRESHOLDS: HealthThresholds = HealthThresholds {
    higher_is_better: false,
    warning: 0.15,
    critical: 0.3,
};
pub const PARTICIPATION_THRESHOLDS: HealthThresholds = HealthThresholds {
    higher_is_better: true,
    warning: 0.1,
    critical: 0.2,
};

pub fn compare_to_baseline(value: f64, baseline: f64, thresholds: HealthThresholds) -> HealthStatus {
    if baseline == 0.0 {
        return HealthStatus::Good;
    }
    let delta = (value - baseline) / baseline;
    let HealthThresholds { warning, critical, .. } = thresholds;

    if thresholds.higher_is_better {
        if delta >= warning {
            HealthStatus::Good
        } else if delta <= -critical {
            HealthStatus::Critical
        } else if delta <= -warning {
            HealthStatus::Warning
        } else {
            HealthStatus::Good
        }
    } else if delta <= -warning {
        HealthStatus::Good
    } else if delta >= critical {
        HealthStatus::Critical
    } else if delta >= warning {
        HealthStatus::Warning
    } else {
        HealthStatus::Good
    }
}

/// Trailing means and per-component health for the latest day
pub fn summarize(records: &[DailyRecord]) -> Option<MetricsSummary> {
    let latest = records.last()?;
    let window = tail(records, SHORT_WINDOW);

    let total_avg = mean(window.iter().map(|r| r.total_transactions as f64))?;
    let shielded_avg = mean(window.iter().map(|r| r.shielded_tx_ratio()))?;
    let fee_avg = mean(window.iter().map(|r| r.avg_fee_zec))?;
    let address_avg = mean(window.iter().map(|r| r.active_addresses as f64))?;

    let health = HealthBreakdown {
        throughput: compare_to_baseline(
            latest.total_transactions as f64,
            total_avg,
            THROUGHPUT_THRESHOLDS,
        ),
        privacy: compare_to_baseline(latest.shielded_tx_ratio(), shielded_avg, PRIVACY_THRESHOLDS),
        cost: compare_to_baseline(latest.avg_fee_zec, fee_avg, COST_THRESHOLDS),
        participation: compare_to_baseline(
            latest.active_addresses as f64,
            address_avg,
            PARTICIPATION_THRESHOLDS,
        ),
    };

    Some(MetricsSummary {
        latest_date: latest.date,
        total_transactions_7d_avg: round_to(total_avg, 2),
        shielded_tx_ratio_7d_avg: round_to(shielded_avg, 4),
        avg_fee_7d_avg: round_to(fee_avg, 6),
        active_addresses_7d_avg: round_to(address_avg, 2),
        health,
    })
}

// ---------------------------------------------------------------------------
// Privacy score
// ---------------------------------------------------------------------------

/// Weighted shielded adoption: 60% transaction share, 40% volume share, 0-100
pub fn privacy_score(record: &DailyRecord) -> f64 {
    (record.shielded_tx_ratio() * 0.6 + record.shielded_volume_ratio() * 0.4) * 100.0
}

pub fn privacy_grade(score: f64) -> &'static str {
    if score >= 45.0 {
        "Excellent"
    } else if score >= 35.0 {
        "Good"
    } else if score >= 25.0 {
        "Fair"
    } else {
        "Poor"
    }
}

pub fn privacy_metrics(records: &[DailyRecord]) -> Option<PrivacyMetricsResponse> {
    let trends: Vec<PrivacyTrend> = records
        .iter()
        .map(|row| PrivacyTrend {
            date: row.date,
            shielded_tx_pct: round_to(row.shielded_tx_ratio() * 100.0, 2),
            shielded_volume_pct: round_to(row.shielded_volume_ratio() * 100.0, 2),
            privacy_score: round_to(privacy_score(row), 2),
        })
        .collect();

    let latest_score = trends.last()?.privacy_score;
    let avg_7d = mean(tail(&trends, SHORT_WINDOW).iter().map(|t| t.privacy_score))?;

    Some(PrivacyMetricsResponse {
        latest_score,
        avg_7d_score: round_to(avg_7d, 2),
        privacy_grade: privacy_grade(avg_7d).to_string(),
        trends,
    })
}

// ---------------------------------------------------------------------------
// Network health
// ---------------------------------------------------------------------------

pub fn health_grade(overall: u32) -> &'static str {
    match overall {
        95.. => "A+",
        85..=94 => "A",
        70..=84 => "B",
        50..=69 => "C",
        30..=49 => "D",
        _ => "F",
    }
}

fn title_case(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

pub fn network_health(summary: &MetricsSummary) -> NetworkHealthDetailed {
    let health = &summary.health;
    let components = health.components();

    let total: u32 = components.iter().map(|(_, status)| status.score()).sum();
    let overall = total / components.len() as u32;

    let issues = components
        .iter()
        .filter(|(_, status)| *status != HealthStatus::Good)
        .map(|(name, _)| format!("{} needs attention", title_case(name)))
        .collect();

    NetworkHealthDetailed {
        overall_score: overall,
        component_scores: ComponentScores {
            throughput: health.throughput.score(),
            privacy: health.privacy.score(),
            cost: health.cost.score(),
            participation: health.participation.score(),
        },
        grade: health_grade(overall).to_string(),
        trend: "stable".to_string(),
        issues,
    }
}

// ---------------------------------------------------------------------------
// Momentum
// ---------------------------------------------------------------------------

/// (Δ shielded volume / Δ transparent volume) * 100 between the first and
/// last row of the window, clamped to [-100, 100].
pub fn momentum_score(window: &[DailyRecord]) -> f64 {
    let (Some(first), Some(last)) = (window.first(), window.last()) else {
        return 0.0;
    };
    if window.len() < 2 {
        return 0.0;
    }

    let delta_shielded = last.shielded_volume_zec - first.shielded_volume_zec;
    let delta_transparent = last.transparent_volume_zec - first.transparent_volume_zec;

    if delta_transparent == 0.0 {
        return if delta_shielded > 0.0 {
            100.0
        } else if delta_shielded < 0.0 {
            -100.0
        } else {
            0.0
        };
    }

    (delta_shielded / delta_transparent * 100.0).clamp(-100.0, 100.0)
}

pub fn momentum(records: &[DailyRecord]) -> MomentumResponse {
    let momentum_7d = momentum_score(tail(records, SHORT_WINDOW));
    let momentum_30d = momentum_score(tail(records, LONG_WINDOW));

    let trend = if momentum_7d > momentum_30d + MOMENTUM_TREND_BAND {
        "up"
    } else if momentum_7d < momentum_30d - MOMENTUM_TREND_BAND {
        "down"
    } else {
        "stable"
    };

    MomentumResponse {
        momentum_7d: round_to(momentum_7d, 2),
        momentum_30d: round_to(momentum_30d, 2),
        trend: trend.to_string(),
        interpretation: insights::describe_momentum(momentum_7d),
    }
}

// ---------------------------------------------------------------------------
// Pool migration
// ---------------------------------------------------------------------------

pub fn pool_migration(records: &[DailyRecord]) -> Option<PoolMigrationResponse> {
    let latest = records.last()?;

    let adoption: Vec<(NaiveDate, f64)> = records
        .iter()
        .map(|r| (r.date, r.shielded_tx_ratio() * 100.0))
        .collect();

    let velocities: Vec<f64> = adoption
        .iter()
        .enumerate()
        .map(|(i, (_, pct))| if i == 0 { 0.0 } else { pct - adoption[i - 1].1 })
        .collect();

    let trends = adoption
        .iter()
        .zip(&velocities)
        .map(|((date, pct), velocity)| PoolAdoptionTrend {
            date: *date,
            shielded_adoption_pct: round_to(*pct, 2),
            velocity: round_to(*velocity, 3),
        })
        .collect();

    let current_adoption = latest.shielded_tx_ratio() * 100.0;
    let avg_7d = mean(tail(records, SHORT_WINDOW).iter().map(|r| r.shielded_tx_ratio()))? * 100.0;
    let avg_velocity = mean(tail(&velocities, SHORT_WINDOW).iter().copied()).unwrap_or(0.0);
    let forecast = (current_adoption + avg_velocity * FORECAST_DAYS).clamp(0.0, 100.0);

    Some(PoolMigrationResponse {
        trends,
        current_adoption: round_to(current_adoption, 2),
        avg_7d_adoption: round_to(avg_7d, 2),
        adoption_velocity: round_to(avg_velocity, 3),
        forecast_30d: round_to(forecast, 2),
    })
}
