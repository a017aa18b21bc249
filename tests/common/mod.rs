#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, DatabaseConnection, DbErr};

use zcash_pulse::AppState;
use zcash_pulse::config::Settings;
use zcash_pulse::models::alert::{Alert, Severity};
use zcash_pulse::models::metrics::{DailyRecord, RawDailyMetrics};
use zcash_pulse::services::store;

/// Fresh in-memory database with every migration applied
pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    let db = Database::connect("sqlite::memory:").await?;
    Migrator::up(&db, None).await?;
    Ok(db)
}

pub fn test_state(db: DatabaseConnection, settings: Settings) -> AppState {
    AppState {
        db,
        settings: Arc::new(settings),
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// A consistent row: `total` transactions with `shielded` of them shielded
pub fn record(date: NaiveDate, total: i64, shielded: i64) -> DailyRecord {
    DailyRecord::try_from(RawDailyMetrics {
        total_transactions: total,
        shielded_transactions: shielded,
        transparent_transactions: total - shielded,
        shielded_volume_zec: shielded as f64 * 2.0,
        transparent_volume_zec: (total - shielded) as f64 * 2.0,
        avg_fee_zec: 0.0002,
        median_fee_zec: 0.00016,
        active_addresses: total * 3 / 2,
        ..RawDailyMetrics::empty(date)
    })
    .unwrap()
}

/// Upserts `days` consecutive rows ending at `end`
pub async fn seed_days(db: &DatabaseConnection, end: NaiveDate, days: i64) {
    for back in (0..days).rev() {
        let day = end - Duration::days(back);
        let shift = back % 2 * 20;
        store::upsert_daily_record(db, &record(day, 1000 + shift, 300 + shift / 2))
            .await
            .unwrap();
    }
}

pub fn alert(id: &str, day: NaiveDate, hour: u32) -> Alert {
    Alert {
        id: id.to_string(),
        timestamp: Utc
            .from_utc_datetime(&day.and_hms_opt(hour, 0, 0).unwrap()),
        alert_type: "transactions_drop".to_string(),
        severity: Severity::High,
        metric: "total_transactions".to_string(),
        current_value: 400.0,
        baseline_value: 1000.0,
        delta_percent: -60.0,
        summary: "🔴 Transactions dropped 60.0% below normal".to_string(),
        explanation: "Network activity declining.".to_string(),
    }
}
