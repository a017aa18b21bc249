mod common;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;

use common::{alert, date, record, seed_days, setup_test_db};
use zcash_pulse::config::Settings;
use zcash_pulse::models::metrics::RawDailyMetrics;
use zcash_pulse::services::ingestion::Ingestor;
use zcash_pulse::services::refresh::RefreshPipeline;
use zcash_pulse::services::sources::DailyMetricsSource;
use zcash_pulse::services::store;
use zcash_pulse::services::sync_status::{self, jobs};

/// Chain source returning a fixed transaction count for every date
struct StubChain {
    reachable: bool,
    total: i64,
}

#[async_trait]
impl DailyMetricsSource for StubChain {
    fn source_name(&self) -> &'static str {
        "stub"
    }

    async fn test_connection(&self) -> bool {
        self.reachable
    }

    async fn daily_metrics(&self, date: NaiveDate) -> Option<RawDailyMetrics> {
        Some(record(date, self.total, self.total / 4).to_raw())
    }
}

fn pipeline(db: sea_orm::DatabaseConnection, chain: StubChain) -> RefreshPipeline {
    let settings = Settings::default();
    let ingestor = Ingestor::new(Arc::new(chain), None, settings.backfill_days);
    RefreshPipeline::new(db, &settings, Some(ingestor)).unwrap()
}

fn today() -> NaiveDate {
    date(2024, 4, 30)
}

#[tokio::test]
async fn test_upsert_keeps_one_row_per_day() {
    let db = setup_test_db().await.unwrap();
    let day = date(2024, 4, 1);

    store::upsert_daily_record(&db, &record(day, 100, 10)).await.unwrap();
    store::upsert_daily_record(&db, &record(day, 200, 50)).await.unwrap();

    assert_eq!(store::count_daily_records(&db).await.unwrap(), 1);
    let rows = store::all_daily_records(&db).await.unwrap();
    assert_eq!(rows[0].total_transactions, 200);
    assert_eq!(rows[0].shielded_tx_ratio(), 0.25);
}

#[tokio::test]
async fn test_duplicate_alert_ids_are_ignored() {
    let db = setup_test_db().await.unwrap();
    let first = alert("alert-0123456789ab", today(), 3);

    assert_eq!(store::insert_alerts(&db, &[first.clone()]).await.unwrap(), 1);
    assert_eq!(store::insert_alerts(&db, &[first]).await.unwrap(), 0);
    assert_eq!(store::recent_alerts(&db, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_unreachable_source_on_empty_store_falls_back_to_sample() {
    let db = setup_test_db().await.unwrap();
    let pipeline = pipeline(
        db.clone(),
        StubChain {
            reachable: false,
            total: 1000,
        },
    );

    let report = pipeline.run_cycle(today()).await.unwrap().unwrap();
    assert_eq!(report.data_source, "sample");
    assert_eq!(report.records_written, 45);
    assert_eq!(store::count_daily_records(&db).await.unwrap(), 45);
}

#[tokio::test]
async fn test_unreachable_source_keeps_existing_data() {
    let db = setup_test_db().await.unwrap();
    seed_days(&db, today(), 5).await;
    let pipeline = pipeline(
        db.clone(),
        StubChain {
            reachable: false,
            total: 1000,
        },
    );

    let report = pipeline.run_cycle(today()).await.unwrap().unwrap();
    assert_eq!(report.data_source, "failed");
    assert_eq!(report.records_written, 0);
    assert_eq!(store::count_daily_records(&db).await.unwrap(), 5);

    let status = sync_status::latest(&db, jobs::METRICS_REFRESH).await.unwrap().unwrap();
    assert_eq!(status.last_outcome.as_deref(), Some("failed"));
    assert_eq!(status.last_error.as_deref(), Some("stub API unreachable"));
    assert_eq!(status.error_count, 1);
}

#[tokio::test]
async fn test_empty_store_is_backfilled_from_live_source() {
    let db = setup_test_db().await.unwrap();
    let pipeline = pipeline(
        db.clone(),
        StubChain {
            reachable: true,
            total: 1000,
        },
    );

    let report = pipeline.run_cycle(today()).await.unwrap().unwrap();
    assert_eq!(report.data_source, "live");
    assert_eq!(report.records_written, 7);

    let rows = store::all_daily_records(&db).await.unwrap();
    assert_eq!(rows.first().unwrap().date, date(2024, 4, 24));
    assert_eq!(rows.last().unwrap().date, today());
}

#[tokio::test]
async fn test_sudden_drop_raises_alert() {
    let db = setup_test_db().await.unwrap();
    seed_days(&db, date(2024, 4, 29), 30).await;
    let pipeline = pipeline(
        db.clone(),
        StubChain {
            reachable: true,
            total: 400,
        },
    );

    let report = pipeline.run_cycle(today()).await.unwrap().unwrap();
    assert_eq!(report.records_written, 1);
    assert!(report.alerts_generated >= 1);
    assert_eq!(report.alerts_inserted, report.alerts_generated as u64);

    let alerts = store::recent_alerts(&db, 10).await.unwrap();
    assert!(alerts.iter().any(|a| a.alert_type == "transactions_drop"));
}

#[tokio::test]
async fn test_repeated_cycle_does_not_duplicate_alerts() {
    let db = setup_test_db().await.unwrap();
    seed_days(&db, date(2024, 4, 29), 30).await;
    let pipeline = pipeline(
        db.clone(),
        StubChain {
            reachable: true,
            total: 400,
        },
    );

    let first = pipeline.run_cycle(today()).await.unwrap().unwrap();
    assert!(first.alerts_inserted >= 1);
    let stored = store::recent_alerts(&db, 100).await.unwrap().len();

    let second = pipeline.run_cycle(today()).await.unwrap().unwrap();
    assert_eq!(second.alerts_generated, first.alerts_generated);
    assert_eq!(second.alerts_inserted, 0);
    assert_eq!(second.alerts_suppressed, second.alerts_generated);
    assert_eq!(second.notifications.attempted, 0);
    assert_eq!(store::recent_alerts(&db, 100).await.unwrap().len(), stored);
}
