//! One refresh cycle: ingest, detect, persist alerts, notify
//!
//! Steps run sequentially. Ingestion results are committed before detection
//! starts, so a detection or notification problem never rolls back data.

use chrono::{NaiveDate, Utc};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

use crate::config::Settings;
use crate::models::alert::Alert;
use crate::models::metrics::RecordError;
use crate::services::anomaly::AnomalyDetector;
use crate::services::coingecko::CoinGeckoService;
use crate::services::ingestion::{IngestionError, IngestionOutcome, Ingestor};
use crate::services::notification::{DispatchReport, NotificationDispatcher, NotificationError};
use crate::services::sample_data::{self, SAMPLE_DAYS};
use crate::services::store::{self, StoreError};
use crate::services::sync_status::{self, jobs};
use crate::services::zchain::ZchainClient;

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Ingestion(#[from] IngestionError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Sample data generation failed: {0}")]
    SampleData(#[from] RecordError),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error(transparent)]
    Notification(#[from] NotificationError),
}

/// Summary of one completed cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    /// "live", "degraded", "sample" or "failed"
    pub data_source: String,
    pub records_written: usize,
    pub alerts_generated: usize,
    pub alerts_inserted: u64,
    /// Alerts whose type was already raised the same day
    pub alerts_suppressed: usize,
    pub notifications: DispatchReport,
    /// Why ingestion wrote nothing, when it did not
    pub ingestion_error: Option<String>,
}

/// Clears the in-flight flag when a cycle ends, including on early return
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct RefreshPipeline {
    db: DatabaseConnection,
    /// `None` in sample mode
    ingestor: Option<Ingestor>,
    detector: Option<AnomalyDetector>,
    dispatcher: NotificationDispatcher,
    baseline_days: usize,
    running: AtomicBool,
}

impl RefreshPipeline {
    pub fn new(
        db: DatabaseConnection,
        settings: &Settings,
        ingestor: Option<Ingestor>,
    ) -> Result<Self, RefreshError> {
        Ok(Self {
            db,
            ingestor,
            detector: settings
                .anomaly
                .enabled
                .then(|| AnomalyDetector::new(&settings.anomaly)),
            dispatcher: NotificationDispatcher::new(&settings.notifications)?,
            baseline_days: settings.anomaly.baseline_days,
            running: AtomicBool::new(false),
        })
    }

    /// Wires the Zchain and CoinGecko clients when live data is enabled
    pub fn from_settings(db: DatabaseConnection, settings: &Settings) -> Result<Self, RefreshError> {
        let ingestor = if settings.enable_live_data {
            let chain = ZchainClient::new(&settings.zchain_api_url)?;
            let prices = CoinGeckoService::new(&settings.coingecko_api_url, settings.coingecko_api_key.clone())?;
            Some(Ingestor::new(
                Arc::new(chain),
                Some(Arc::new(prices)),
                settings.backfill_days,
            ))
        } else {
            None
        };
        Self::new(db, settings, ingestor)
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Runs a cycle for `today`. Returns `Ok(None)` without doing anything
    /// when another cycle is still in progress.
    pub async fn run_cycle(&self, today: NaiveDate) -> Result<Option<RefreshReport>, RefreshError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::warn!("Previous refresh still running, skipping this tick");
            return Ok(None);
        }
        let _guard = InFlight(&self.running);

        match self.run_inner(today).await {
            Ok(report) => Ok(Some(report)),
            Err(e) => {
                if let Err(status_err) =
                    sync_status::record_failure(&self.db, jobs::METRICS_REFRESH, &e.to_string()).await
                {
                    tracing::error!("Failed to record refresh failure: {}", status_err);
                }
                Err(e)
            }
        }
    }

    async fn run_inner(&self, today: NaiveDate) -> Result<RefreshReport, RefreshError> {
        let started = Utc::now();
        let mut report = self.ingest(today).await?;

        if let Some(detector) = &self.detector {
            match self.detect(detector).await {
                Ok(alerts) => {
                    report.alerts_generated = alerts.len();
                    let alerts = match self.drop_repeats(alerts).await {
                        Ok(fresh) => fresh,
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to check earlier alerts");
                            Vec::new()
                        }
                    };
                    report.alerts_suppressed = report.alerts_generated - alerts.len();
                    match store::insert_alerts(&self.db, &alerts).await {
                        Ok(inserted) => report.alerts_inserted = inserted,
                        Err(e) => tracing::error!("Failed to persist alerts: {}", e),
                    }
                    report.notifications = self.dispatcher.dispatch(&alerts).await;
                }
                Err(e) => tracing::error!(error = %e, "Anomaly detection failed"),
            }
        }

        if let Some(reason) = &report.ingestion_error {
            sync_status::record_failure(&self.db, jobs::METRICS_REFRESH, reason)
                .await
                .map_err(StoreError::from)?;
        } else {
            sync_status::record_success(
                &self.db,
                jobs::METRICS_REFRESH,
                &report.data_source,
                report.records_written,
            )
            .await
            .map_err(StoreError::from)?;
        }

        tracing::info!(
            "Refresh finished in {}ms: source={}, rows={}, alerts={} ({} new, {} repeats)",
            (Utc::now() - started).num_milliseconds(),
            report.data_source,
            report.records_written,
            report.alerts_generated,
            report.alerts_inserted,
            report.alerts_suppressed
        );
        Ok(report)
    }

    async fn ingest(&self, today: NaiveDate) -> Result<RefreshReport, RefreshError> {
        let Some(ingestor) = &self.ingestor else {
            let written = self.load_sample(today).await?;
            return Ok(RefreshReport {
                data_source: "sample".to_string(),
                records_written: written,
                ..RefreshReport::default()
            });
        };

        let outcome = ingestor.run(&self.db, today).await?;
        if let IngestionOutcome::Failed { reason } = &outcome {
            tracing::warn!("Live ingestion failed: {}", reason);
            if store::count_daily_records(&self.db).await? == 0 {
                tracing::info!("Store is empty, falling back to sample data");
                let written = self.load_sample(today).await?;
                return Ok(RefreshReport {
                    data_source: "sample".to_string(),
                    records_written: written,
                    ..RefreshReport::default()
                });
            }
        }

        let data_source = outcome.label().to_string();
        let records_written = outcome.written();
        let ingestion_error = match outcome {
            IngestionOutcome::Failed { reason } => Some(reason),
            _ => None,
        };
        Ok(RefreshReport {
            data_source,
            records_written,
            ingestion_error,
            ..RefreshReport::default()
        })
    }

    async fn load_sample(&self, today: NaiveDate) -> Result<usize, RefreshError> {
        let records = sample_data::sample_records(today, SAMPLE_DAYS)?;
        for record in &records {
            store::upsert_daily_record(&self.db, record).await?;
        }
        tracing::info!("Loaded {} sample rows ending {}", records.len(), today);
        Ok(records.len())
    }

    /// Drops alerts whose type is already stored for the same day, so a
    /// condition is stored and notified once per day rather than every tick
    async fn drop_repeats(&self, alerts: Vec<Alert>) -> Result<Vec<Alert>, StoreError> {
        let Some(day) = alerts.first().map(|a| a.timestamp.date_naive()) else {
            return Ok(alerts);
        };
        let seen = store::alert_types_on(&self.db, day).await?;
        let (repeats, fresh): (Vec<Alert>, Vec<Alert>) = alerts
            .into_iter()
            .partition(|a| a.timestamp.date_naive() == day && seen.contains(&a.alert_type));
        if !repeats.is_empty() {
            tracing::info!("Skipping {} alerts already raised on {}", repeats.len(), day);
        }
        Ok(fresh)
    }

    async fn detect(&self, detector: &AnomalyDetector) -> Result<Vec<Alert>, StoreError> {
        let history = store::recent_daily_records(&self.db, self.baseline_days as u64 + 1).await?;
        let outliers = detector.log_historical_outliers(&history);
        if outliers > 0 {
            tracing::debug!("{} historical outliers in the baseline window", outliers);
        }

        let alerts = detector.generate_alerts(&history);
        if alerts.is_empty() {
            tracing::info!("No anomalies detected");
        } else {
            tracing::info!("Generated {} alerts", alerts.len());
        }
        Ok(alerts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;

    async fn memory_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        db
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 20).unwrap()
    }

    fn sample_settings() -> Settings {
        Settings {
            enable_live_data: false,
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn test_sample_mode_cycle_loads_dataset() {
        let db = memory_db().await;
        let pipeline = RefreshPipeline::from_settings(db.clone(), &sample_settings()).unwrap();

        let report = pipeline.run_cycle(today()).await.unwrap().unwrap();
        assert_eq!(report.data_source, "sample");
        assert_eq!(report.records_written, 45);
        assert_eq!(report.notifications, DispatchReport::default());
        assert!(!pipeline.is_running());

        let status = sync_status::latest(&db, jobs::METRICS_REFRESH).await.unwrap().unwrap();
        assert_eq!(status.last_outcome.as_deref(), Some("sample"));
        assert_eq!(status.records_written, 45);
    }

    #[tokio::test]
    async fn test_overlapping_cycle_is_skipped() {
        let db = memory_db().await;
        let pipeline = RefreshPipeline::from_settings(db, &sample_settings()).unwrap();

        pipeline.running.store(true, Ordering::Release);
        assert_eq!(pipeline.run_cycle(today()).await.unwrap(), None);
        // the skipped call must not clear the other cycle's flag
        assert!(pipeline.is_running());
    }
}
