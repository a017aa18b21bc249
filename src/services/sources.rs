//! Seams between ingestion and the upstream data providers

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::models::metrics::{PriceSnapshot, RawDailyMetrics};

/// On-chain daily aggregates
#[async_trait]
pub trait DailyMetricsSource: Send + Sync {
    /// Name used in log lines
    fn source_name(&self) -> &'static str;

    /// Cheap reachability check run before a batch of dates
    async fn test_connection(&self) -> bool;

    /// Aggregates for `date`. `None` means the fetch failed; a day with no
    /// activity is an all-zero row, not `None`.
    async fn daily_metrics(&self, date: NaiveDate) -> Option<RawDailyMetrics>;
}

/// Market data used to enrich daily rows
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn price_for_date(&self, date: NaiveDate) -> Option<PriceSnapshot>;
}
