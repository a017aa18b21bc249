use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::entities::daily_metrics;

#[derive(Debug, Error, PartialEq)]
pub enum RecordError {
    #[error(
        "{date}: shielded ({shielded}) + transparent ({transparent}) transactions must equal total ({total})"
    )]
    InconsistentTransactions {
        date: NaiveDate,
        total: i64,
        shielded: i64,
        transparent: i64,
    },

    #[error("{date}: {field} must be a non-negative number, got {value}")]
    InvalidValue {
        date: NaiveDate,
        field: &'static str,
        value: f64,
    },

    #[error("{date}: {field} ratio {value} is outside [0, 1]")]
    RatioOutOfRange {
        date: NaiveDate,
        field: &'static str,
        value: f64,
    },
}

/// Daily aggregates as delivered by a data source, before validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDailyMetrics {
    pub date: NaiveDate,
    pub total_transactions: i64,
    pub shielded_transactions: i64,
    pub transparent_transactions: i64,
    pub shielded_volume_zec: f64,
    pub transparent_volume_zec: f64,
    pub avg_fee_zec: f64,
    pub median_fee_zec: f64,
    #[serde(default = "default_block_time")]
    pub avg_block_time_seconds: f64,
    pub active_addresses: i64,
    #[serde(default)]
    pub zec_price_usd: Option<f64>,
    #[serde(default)]
    pub market_cap_usd: Option<i64>,
    #[serde(default)]
    pub trading_volume_usd: Option<i64>,
}

fn default_block_time() -> f64 {
    75.0
}

impl RawDailyMetrics {
    /// A row for a date with no observed activity
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total_transactions: 0,
            shielded_transactions: 0,
            transparent_transactions: 0,
            shielded_volume_zec: 0.0,
            transparent_volume_zec: 0.0,
            avg_fee_zec: 0.0,
            median_fee_zec: 0.0,
            avg_block_time_seconds: default_block_time(),
            active_addresses: 0,
            zec_price_usd: None,
            market_cap_usd: None,
            trading_volume_usd: None,
        }
    }
}

/// Validated daily row. Construct through `TryFrom<RawDailyMetrics>` so the
/// transaction split and the derived ratios are always consistent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawDailyMetrics")]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub total_transactions: i64,
    pub shielded_transactions: i64,
    pub transparent_transactions: i64,
    pub shielded_volume_zec: f64,
    pub transparent_volume_zec: f64,
    pub avg_fee_zec: f64,
    pub median_fee_zec: f64,
    pub avg_block_time_seconds: f64,
    pub active_addresses: i64,
    pub zec_price_usd: Option<f64>,
    pub market_cap_usd: Option<i64>,
    pub trading_volume_usd: Option<i64>,
    shielded_tx_ratio: f64,
    shielded_volume_ratio: f64,
}

impl DailyRecord {
    /// Share of transactions that were shielded, in [0, 1]
    pub fn shielded_tx_ratio(&self) -> f64 {
        self.shielded_tx_ratio
    }

    /// Share of moved value that went through the shielded pool, in [0, 1]
    pub fn shielded_volume_ratio(&self) -> f64 {
        self.shielded_volume_ratio
    }

    /// Attach market data fetched after the on-chain aggregates
    pub fn with_price(mut self, price: Option<&PriceSnapshot>) -> Self {
        if let Some(price) = price {
            self.zec_price_usd = Some(price.price_usd);
            self.market_cap_usd = price.market_cap_usd;
            self.trading_volume_usd = price.trading_volume_usd;
        }
        self
    }

    pub fn to_raw(&self) -> RawDailyMetrics {
        RawDailyMetrics {
            date: self.date,
            total_transactions: self.total_transactions,
            shielded_transactions: self.shielded_transactions,
            transparent_transactions: self.transparent_transactions,
            shielded_volume_zec: self.shielded_volume_zec,
            transparent_volume_zec: self.transparent_volume_zec,
            avg_fee_zec: self.avg_fee_zec,
            median_fee_zec: self.median_fee_zec,
            avg_block_time_seconds: self.avg_block_time_seconds,
            active_addresses: self.active_addresses,
            zec_price_usd: self.zec_price_usd,
            market_cap_usd: self.market_cap_usd,
            trading_volume_usd: self.trading_volume_usd,
        }
    }
}

fn check_non_negative(date: NaiveDate, field: &'static str, value: f64) -> Result<f64, RecordError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(RecordError::InvalidValue { date, field, value })
    }
}

fn check_ratio(date: NaiveDate, field: &'static str, value: f64) -> Result<f64, RecordError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(RecordError::RatioOutOfRange { date, field, value })
    }
}

impl TryFrom<RawDailyMetrics> for DailyRecord {
    type Error = RecordError;

    fn try_from(raw: RawDailyMetrics) -> Result<Self, Self::Error> {
        let date = raw.date;

        if raw.shielded_transactions < 0
            || raw.transparent_transactions < 0
            || raw.shielded_transactions.checked_add(raw.transparent_transactions)
                != Some(raw.total_transactions)
        {
            return Err(RecordError::InconsistentTransactions {
                date,
                total: raw.total_transactions,
                shielded: raw.shielded_transactions,
                transparent: raw.transparent_transactions,
            });
        }

        check_non_negative(date, "active_addresses", raw.active_addresses as f64)?;
        let shielded_volume = check_non_negative(date, "shielded_volume_zec", raw.shielded_volume_zec)?;
        let transparent_volume =
            check_non_negative(date, "transparent_volume_zec", raw.transparent_volume_zec)?;
        check_non_negative(date, "avg_fee_zec", raw.avg_fee_zec)?;
        check_non_negative(date, "median_fee_zec", raw.median_fee_zec)?;
        check_non_negative(date, "avg_block_time_seconds", raw.avg_block_time_seconds)?;

        let tx_ratio = if raw.total_transactions > 0 {
            raw.shielded_transactions as f64 / raw.total_transactions as f64
        } else {
            0.0
        };
        let total_volume = shielded_volume + transparent_volume;
        let volume_ratio = if total_volume > 0.0 {
            shielded_volume / total_volume
        } else {
            0.0
        };

        Ok(Self {
            date,
            total_transactions: raw.total_transactions,
            shielded_transactions: raw.shielded_transactions,
            transparent_transactions: raw.transparent_transactions,
            shielded_volume_zec: shielded_volume,
            transparent_volume_zec: transparent_volume,
            avg_fee_zec: raw.avg_fee_zec,
            median_fee_zec: raw.median_fee_zec,
            avg_block_time_seconds: raw.avg_block_time_seconds,
            active_addresses: raw.active_addresses,
            zec_price_usd: raw.zec_price_usd,
            market_cap_usd: raw.market_cap_usd,
            trading_volume_usd: raw.trading_volume_usd,
            shielded_tx_ratio: check_ratio(date, "shielded_tx_ratio", tx_ratio)?,
            shielded_volume_ratio: check_ratio(date, "shielded_volume_ratio", volume_ratio)?,
        })
    }
}

impl TryFrom<daily_metrics::Model> for DailyRecord {
    type Error = RecordError;

    fn try_from(row: daily_metrics::Model) -> Result<Self, Self::Error> {
        RawDailyMetrics {
            date: row.date,
            total_transactions: row.total_transactions,
            shielded_transactions: row.shielded_transactions,
            transparent_transactions: row.transparent_transactions,
            shielded_volume_zec: row.shielded_volume_zec,
            transparent_volume_zec: row.transparent_volume_zec,
            avg_fee_zec: row.avg_fee_zec,
            median_fee_zec: row.median_fee_zec,
            avg_block_time_seconds: row.avg_block_time_seconds,
            active_addresses: row.active_addresses,
            zec_price_usd: row.zec_price_usd,
            market_cap_usd: row.market_cap_usd,
            trading_volume_usd: row.trading_volume_usd,
        }
        .try_into()
    }
}

/// Market data for one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub price_usd: f64,
    pub market_cap_usd: Option<i64>,
    pub trading_volume_usd: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Good,
    Warning,
    Critical,
}

impl HealthStatus {
    /// Component score used by the network health breakdown
    pub fn score(&self) -> u32 {
        match self {
            HealthStatus::Good => 100,
            HealthStatus::Warning => 60,
            HealthStatus::Critical => 20,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiCard {
    pub name: String,
    pub value: f64,
    pub unit: String,
    pub delta_percent: Option<f64>,
    pub trend: Option<Trend>,
    pub insight: Option<String>,
    pub status: HealthStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KpiResponse {
    pub cards: Vec<KpiCard>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsPayload {
    pub data: Vec<DailyRecord>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthBreakdown {
    pub throughput: HealthStatus,
    pub privacy: HealthStatus,
    pub cost: HealthStatus,
    pub participation: HealthStatus,
}

impl HealthBreakdown {
    pub fn components(&self) -> [(&'static str, HealthStatus); 4] {
        [
            ("throughput", self.throughput),
            ("privacy", self.privacy),
            ("cost", self.cost),
            ("participation", self.participation),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub latest_date: NaiveDate,
    pub total_transactions_7d_avg: f64,
    pub shielded_tx_ratio_7d_avg: f64,
    pub avg_fee_7d_avg: f64,
    pub active_addresses_7d_avg: f64,
    pub health: HealthBreakdown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivacyTrend {
    pub date: NaiveDate,
    pub shielded_tx_pct: f64,
    pub shielded_volume_pct: f64,
    pub privacy_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrivacyMetricsResponse {
    pub trends: Vec<PrivacyTrend>,
    pub latest_score: f64,
    pub avg_7d_score: f64,
    pub privacy_grade: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub throughput: u32,
    pub privacy: u32,
    pub cost: u32,
    pub participation: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkHealthDetailed {
    pub overall_score: u32,
    pub component_scores: ComponentScores,
    pub grade: String,
    pub trend: String,
    pub issues: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MomentumResponse {
    pub momentum_7d: f64,
    pub momentum_30d: f64,
    pub trend: String,
    pub interpretation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolAdoptionTrend {
    pub date: NaiveDate,
    pub shielded_adoption_pct: f64,
    pub velocity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolMigrationResponse {
    pub trends: Vec<PoolAdoptionTrend>,
    pub current_adoption: f64,
    pub avg_7d_adoption: f64,
    pub adoption_velocity: f64,
    pub forecast_30d: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataResponse {
    pub last_updated: DateTime<Utc>,
    pub data_source: String,
    pub next_refresh: Option<DateTime<Utc>>,
    pub total_records: u64,
    pub last_refresh_at: Option<DateTime<Utc>>,
    pub last_refresh_error: Option<String>,
}
