//! Fetches daily aggregates from upstream and writes them to the store
//!
//! An empty store is backfilled for the configured number of days, otherwise
//! only today is refreshed. A failing date is logged and skipped; the
//! remaining dates are still written.

use chrono::{Duration, NaiveDate};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use thiserror::Error;

use crate::models::metrics::DailyRecord;
use crate::services::sources::{DailyMetricsSource, PriceSource};
use crate::services::store::{self, StoreError};

#[derive(Debug, Error)]
pub enum IngestionError {
    #[error("Failed to persist daily metrics: {0}")]
    Store(#[from] StoreError),
}

/// What a run achieved, inspected by the refresh cycle to decide on the
/// sample fallback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestionOutcome {
    /// Every requested date was written
    Live { attempted: usize, written: usize },
    /// Some dates were written, some failed
    Degraded {
        attempted: usize,
        written: usize,
        reason: String,
    },
    /// Nothing was written
    Failed { reason: String },
}

impl IngestionOutcome {
    pub fn written(&self) -> usize {
        match self {
            IngestionOutcome::Live { written, .. } | IngestionOutcome::Degraded { written, .. } => *written,
            IngestionOutcome::Failed { .. } => 0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            IngestionOutcome::Live { .. } => "live",
            IngestionOutcome::Degraded { .. } => "degraded",
            IngestionOutcome::Failed { .. } => "failed",
        }
    }
}

/// Dates to fetch: a backfill window ending today when the store is empty,
/// otherwise today only
pub fn dates_to_fetch(store_is_empty: bool, backfill_days: u32, today: NaiveDate) -> Vec<NaiveDate> {
    if !store_is_empty {
        return vec![today];
    }
    (0..backfill_days.max(1) as i64)
        .rev()
        .map(|back| today - Duration::days(back))
        .collect()
}

pub struct Ingestor {
    metrics_source: Arc<dyn DailyMetricsSource>,
    price_source: Option<Arc<dyn PriceSource>>,
    backfill_days: u32,
}

impl Ingestor {
    pub fn new(
        metrics_source: Arc<dyn DailyMetricsSource>,
        price_source: Option<Arc<dyn PriceSource>>,
        backfill_days: u32,
    ) -> Self {
        Self {
            metrics_source,
            price_source,
            backfill_days,
        }
    }

    async fn fetch_record(&self, date: NaiveDate) -> Result<DailyRecord, String> {
        let raw = self
            .metrics_source
            .daily_metrics(date)
            .await
            .ok_or_else(|| format!("{} returned no data", self.metrics_source.source_name()))?;
        let record = DailyRecord::try_from(raw).map_err(|e| e.to_string())?;

        let price = match &self.price_source {
            Some(source) => source.price_for_date(date).await,
            None => None,
        };
        Ok(record.with_price(price.as_ref()))
    }

    pub async fn run(&self, db: &DatabaseConnection, today: NaiveDate) -> Result<IngestionOutcome, IngestionError> {
        let store_is_empty = store::count_daily_records(db).await? == 0;
        let dates = dates_to_fetch(store_is_empty, self.backfill_days, today);
        if store_is_empty {
            tracing::info!(
                "Store is empty, backfilling {} days from {}",
                dates.len(),
                self.metrics_source.source_name()
            );
        }
        self.ingest_dates(db, &dates).await
    }

    /// Fetches and upserts each date in order, whatever the store holds
    pub async fn ingest_dates(
        &self,
        db: &DatabaseConnection,
        dates: &[NaiveDate],
    ) -> Result<IngestionOutcome, IngestionError> {
        let source = self.metrics_source.source_name();
        if !self.metrics_source.test_connection().await {
            tracing::warn!("{} API unreachable, skipping live ingestion", source);
            return Ok(IngestionOutcome::Failed {
                reason: format!("{} API unreachable", source),
            });
        }

        let mut written = 0;
        let mut failures = Vec::new();
        for date in dates {
            match self.fetch_record(*date).await {
                Ok(record) => {
                    store::upsert_daily_record(db, &record).await?;
                    written += 1;
                    tracing::debug!(
                        "Stored {}: {} tx ({} shielded)",
                        date,
                        record.total_transactions,
                        record.shielded_transactions
                    );
                }
                Err(e) => {
                    tracing::error!(%date, error = %e, "Failed to ingest day");
                    failures.push(format!("{}: {}", date, e));
                }
            }
        }

        let attempted = dates.len();
        tracing::info!("Ingestion complete: {}/{} days successful", written, attempted);

        Ok(if failures.is_empty() {
            IngestionOutcome::Live { attempted, written }
        } else if written == 0 {
            IngestionOutcome::Failed {
                reason: failures.join("; "),
            }
        } else {
            IngestionOutcome::Degraded {
                attempted,
                written,
                reason: failures.join("; "),
            }
        })
    }
}
