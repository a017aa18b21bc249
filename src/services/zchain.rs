//! Zchain explorer client
//!
//! The explorer has no per-day endpoint, so daily rows are built from the
//! most recent blocks. Active addresses are not exposed either and are
//! estimated from the transaction count.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::header::HeaderMap;
use serde::Deserialize;
use std::time::Duration;

use crate::models::metrics::RawDailyMetrics;
use crate::services::api_client::{ApiClient, RetryPolicy};
use crate::services::sources::DailyMetricsSource;

const LOOKBACK_BLOCKS: u32 = 150;
const DEFAULT_BLOCK_TIME_SECONDS: f64 = 75.0;
/// Placeholder until an address-level endpoint is available
const ADDRESSES_PER_TRANSACTION: f64 = 1.5;
const MEDIAN_FEE_FACTOR: f64 = 0.8;

#[derive(Debug, Clone, Deserialize)]
pub struct Block {
    /// ISO 8601, e.g. "2024-03-01T12:00:00Z"
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub transactions: i64,
    #[serde(default)]
    pub shielded_transactions: i64,
    #[serde(default)]
    pub shielded_volume: f64,
    #[serde(default)]
    pub transparent_volume: f64,
    #[serde(default)]
    pub total_fees: Option<f64>,
}

impl Block {
    fn time(&self) -> Option<DateTime<Utc>> {
        let raw = self.timestamp.as_deref()?;
        DateTime::parse_from_rfc3339(raw)
            .map(|t| t.with_timezone(&Utc))
            .ok()
    }
}

/// Sums the blocks that fall on `date` (UTC) into one daily row
pub fn aggregate_blocks(date: NaiveDate, blocks: &[Block]) -> RawDailyMetrics {
    let day_blocks: Vec<(&Block, DateTime<Utc>)> = blocks
        .iter()
        .filter_map(|block| block.time().map(|t| (block, t)))
        .filter(|(_, t)| t.date_naive() == date)
        .collect();

    if day_blocks.is_empty() {
        tracing::warn!("No blocks found for {}", date);
        return RawDailyMetrics::empty(date);
    }

    let total: i64 = day_blocks.iter().map(|(b, _)| b.transactions).sum();
    let shielded: i64 = day_blocks.iter().map(|(b, _)| b.shielded_transactions).sum();

    let fees: Vec<f64> = day_blocks
        .iter()
        .filter_map(|(b, _)| b.total_fees)
        .filter(|fee| *fee != 0.0)
        .collect();
    let avg_fee = if fees.is_empty() {
        0.0
    } else {
        fees.iter().sum::<f64>() / fees.len() as f64
    };

    let intervals: Vec<f64> = day_blocks
        .windows(2)
        .map(|pair| (pair[0].1 - pair[1].1).num_milliseconds().abs() as f64 / 1000.0)
        .collect();
    let avg_block_time = if intervals.is_empty() {
        DEFAULT_BLOCK_TIME_SECONDS
    } else {
        intervals.iter().sum::<f64>() / intervals.len() as f64
    };

    RawDailyMetrics {
        date,
        total_transactions: total,
        shielded_transactions: shielded,
        transparent_transactions: total - shielded,
        shielded_volume_zec: day_blocks.iter().map(|(b, _)| b.shielded_volume).sum(),
        transparent_volume_zec: day_blocks.iter().map(|(b, _)| b.transparent_volume).sum(),
        avg_fee_zec: avg_fee,
        median_fee_zec: avg_fee * MEDIAN_FEE_FACTOR,
        avg_block_time_seconds: avg_block_time,
        active_addresses: (total as f64 * ADDRESSES_PER_TRANSACTION) as i64,
        zec_price_usd: None,
        market_cap_usd: None,
        trading_volume_usd: None,
    }
}

pub struct ZchainClient {
    api: ApiClient,
}

impl ZchainClient {
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        // ~10 req/s allowed upstream, stay at 2
        let policy = RetryPolicy {
            min_interval: Duration::from_millis(500),
            ..RetryPolicy::default()
        };
        Ok(Self {
            api: ApiClient::new(base_url, policy)?,
        })
    }

    pub fn with_policy(base_url: &str, policy: RetryPolicy) -> Result<Self, reqwest::Error> {
        Ok(Self {
            api: ApiClient::new(base_url, policy)?,
        })
    }

    pub async fn fetch_network_stats(&self) -> Option<serde_json::Value> {
        let stats: serde_json::Value = self.api.get_json("statistics", &[], HeaderMap::new()).await?;
        tracing::info!("Fetched network stats: {} blocks", stats.get("blocks").unwrap_or(&serde_json::Value::Null));
        Some(stats)
    }

    pub async fn fetch_blocks(&self, limit: u32) -> Option<Vec<Block>> {
        let query = [
            ("limit", limit.to_string()),
            ("sort", "height".to_string()),
            ("direction", "descending".to_string()),
        ];
        let blocks: Vec<Block> = self.api.get_json("blocks", &query, HeaderMap::new()).await?;
        tracing::debug!("Fetched {} blocks", blocks.len());
        Some(blocks)
    }
}

#[async_trait]
impl DailyMetricsSource for ZchainClient {
    fn source_name(&self) -> &'static str {
        "zchain"
    }

    async fn test_connection(&self) -> bool {
        self.fetch_network_stats().await.is_some()
    }

    async fn daily_metrics(&self, date: NaiveDate) -> Option<RawDailyMetrics> {
        tracing::info!("Calculating daily metrics for {}", date);
        let blocks = self.fetch_blocks(LOOKBACK_BLOCKS).await?;
        Some(aggregate_blocks(date, &blocks))
    }
}
