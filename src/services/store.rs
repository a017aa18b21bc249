//! Persistence for daily rows and alerts
//!
//! Reads always return validated domain values; a stored row that no longer
//! passes validation surfaces as [`StoreError::InvalidRow`].

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use std::collections::HashSet;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use thiserror::Error;

use crate::entities::alerts::{self, Entity as Alerts};
use crate::entities::daily_metrics::{self, Entity as DailyMetrics};
use crate::models::alert::Alert;
use crate::models::metrics::DailyRecord;
use crate::models::query::DateRange;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    #[error("Stored row is invalid: {0}")]
    InvalidRow(String),
}

fn to_record(row: daily_metrics::Model) -> Result<DailyRecord, StoreError> {
    DailyRecord::try_from(row).map_err(|e| StoreError::InvalidRow(e.to_string()))
}

fn to_alert(row: alerts::Model) -> Result<Alert, StoreError> {
    let id = row.id.clone();
    Alert::try_from(row).map_err(|e| StoreError::InvalidRow(format!("alert {}: {}", id, e)))
}

fn daily_active_model(record: &DailyRecord) -> daily_metrics::ActiveModel {
    daily_metrics::ActiveModel {
        date: Set(record.date),
        total_transactions: Set(record.total_transactions),
        shielded_transactions: Set(record.shielded_transactions),
        transparent_transactions: Set(record.transparent_transactions),
        shielded_volume_zec: Set(record.shielded_volume_zec),
        transparent_volume_zec: Set(record.transparent_volume_zec),
        avg_fee_zec: Set(record.avg_fee_zec),
        median_fee_zec: Set(record.median_fee_zec),
        avg_block_time_seconds: Set(record.avg_block_time_seconds),
        active_addresses: Set(record.active_addresses),
        zec_price_usd: Set(record.zec_price_usd),
        market_cap_usd: Set(record.market_cap_usd),
        trading_volume_usd: Set(record.trading_volume_usd),
        updated_at: Set(Utc::now()),
    }
}

/// Insert or replace the row for `record.date`
pub async fn upsert_daily_record(db: &DatabaseConnection, record: &DailyRecord) -> Result<(), StoreError> {
    DailyMetrics::insert(daily_active_model(record))
        .on_conflict(
            OnConflict::column(daily_metrics::Column::Date)
                .update_columns([
                    daily_metrics::Column::TotalTransactions,
                    daily_metrics::Column::ShieldedTransactions,
                    daily_metrics::Column::TransparentTransactions,
                    daily_metrics::Column::ShieldedVolumeZec,
                    daily_metrics::Column::TransparentVolumeZec,
                    daily_metrics::Column::AvgFeeZec,
                    daily_metrics::Column::MedianFeeZec,
                    daily_metrics::Column::AvgBlockTimeSeconds,
                    daily_metrics::Column::ActiveAddresses,
                    daily_metrics::Column::ZecPriceUsd,
                    daily_metrics::Column::MarketCapUsd,
                    daily_metrics::Column::TradingVolumeUsd,
                    daily_metrics::Column::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(())
}

/// The `limit` most recent rows, returned oldest first
pub async fn recent_daily_records(db: &DatabaseConnection, limit: u64) -> Result<Vec<DailyRecord>, StoreError> {
    let mut rows = DailyMetrics::find()
        .order_by_desc(daily_metrics::Column::Date)
        .limit(limit)
        .all(db)
        .await?;
    rows.reverse();
    rows.into_iter().map(to_record).collect()
}

pub async fn all_daily_records(db: &DatabaseConnection) -> Result<Vec<DailyRecord>, StoreError> {
    DailyMetrics::find()
        .order_by_asc(daily_metrics::Column::Date)
        .all(db)
        .await?
        .into_iter()
        .map(to_record)
        .collect()
}

/// Rows inside the inclusive range, oldest first
pub async fn daily_records_between(
    db: &DatabaseConnection,
    range: &DateRange,
) -> Result<Vec<DailyRecord>, StoreError> {
    if range.is_empty() {
        return Ok(Vec::new());
    }

    let mut query = DailyMetrics::find();
    if let Some(start) = range.start {
        query = query.filter(daily_metrics::Column::Date.gte(start));
    }
    if let Some(end) = range.end {
        query = query.filter(daily_metrics::Column::Date.lte(end));
    }

    query
        .order_by_asc(daily_metrics::Column::Date)
        .all(db)
        .await?
        .into_iter()
        .map(to_record)
        .collect()
}

pub async fn count_daily_records(db: &DatabaseConnection) -> Result<u64, StoreError> {
    Ok(DailyMetrics::find().count(db).await?)
}

/// Inserts alerts, skipping ids that already exist. Returns the number of
/// new rows.
pub async fn insert_alerts(db: &DatabaseConnection, new_alerts: &[Alert]) -> Result<u64, StoreError> {
    if new_alerts.is_empty() {
        return Ok(0);
    }

    let models = new_alerts.iter().map(|alert| alerts::ActiveModel {
        id: Set(alert.id.clone()),
        timestamp: Set(alert.timestamp),
        alert_type: Set(alert.alert_type.clone()),
        severity: Set(alert.severity.as_str().to_string()),
        metric: Set(alert.metric.clone()),
        current_value: Set(alert.current_value),
        baseline_value: Set(alert.baseline_value),
        delta_percent: Set(alert.delta_percent),
        summary: Set(alert.summary.clone()),
        explanation: Set(alert.explanation.clone()),
    });

    let inserted = Alerts::insert_many(models)
        .on_conflict(OnConflict::column(alerts::Column::Id).do_nothing().to_owned())
        .exec_without_returning(db)
        .await?;
    Ok(inserted)
}

/// Newest first
pub async fn recent_alerts(db: &DatabaseConnection, limit: u64) -> Result<Vec<Alert>, StoreError> {
    Alerts::find()
        .order_by_desc(alerts::Column::Timestamp)
        .limit(limit)
        .all(db)
        .await?
        .into_iter()
        .map(to_alert)
        .collect()
}

/// Alerts whose UTC calendar date falls inside the range, newest first
pub async fn alerts_between(db: &DatabaseConnection, range: &DateRange) -> Result<Vec<Alert>, StoreError> {
    if range.is_empty() {
        return Ok(Vec::new());
    }

    let mut query = Alerts::find();
    if let Some(start) = range.start {
        let from = Utc.from_utc_datetime(&start.and_time(NaiveTime::MIN));
        query = query.filter(alerts::Column::Timestamp.gte(from));
    }
    if let Some(end) = range.end.and_then(|end| end.succ_opt()) {
        let until = Utc.from_utc_datetime(&end.and_time(NaiveTime::MIN));
        query = query.filter(alerts::Column::Timestamp.lt(until));
    }

    query
        .order_by_desc(alerts::Column::Timestamp)
        .all(db)
        .await?
        .into_iter()
        .map(to_alert)
        .collect()
}

/// Alert types already stored for a UTC calendar day
pub async fn alert_types_on(db: &DatabaseConnection, day: NaiveDate) -> Result<HashSet<String>, StoreError> {
    let range = DateRange {
        start: Some(day),
        end: Some(day),
    };
    Ok(alerts_between(db, &range)
        .await?
        .into_iter()
        .map(|alert| alert.alert_type)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::alert::Severity;
    use crate::models::metrics::RawDailyMetrics;
    use chrono::{DateTime, Duration, NaiveDate};
    use migration::{Migrator, MigratorTrait};
    use sea_orm::Database;

    async fn memory_db() -> DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        Migrator::up(&db, None).await.unwrap();
        db
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn record(d: u32, total: i64) -> DailyRecord {
        DailyRecord::try_from(RawDailyMetrics {
            total_transactions: total,
            shielded_transactions: total / 2,
            transparent_transactions: total - total / 2,
            shielded_volume_zec: 100.0,
            transparent_volume_zec: 300.0,
            avg_fee_zec: 0.0001,
            median_fee_zec: 0.00008,
            active_addresses: total,
            ..RawDailyMetrics::empty(day(d))
        })
        .unwrap()
    }

    fn alert(id: &str, timestamp: DateTime<Utc>) -> Alert {
        Alert {
            id: id.to_string(),
            timestamp,
            alert_type: "fees_spike".to_string(),
            severity: Severity::High,
            metric: "avg_fee_zec".to_string(),
            current_value: 0.0005,
            baseline_value: 0.0001,
            delta_percent: 400.0,
            summary: "🔴 Fees spiked 400.0% above normal".to_string(),
            explanation: "Statistical anomaly detected".to_string(),
        }
    }

    fn at(d: u32, hour: u32) -> DateTime<Utc> {
        Utc.from_utc_datetime(&day(d).and_hms_opt(hour, 0, 0).unwrap())
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_date() {
        let db = memory_db().await;
        upsert_daily_record(&db, &record(5, 1000)).await.unwrap();
        upsert_daily_record(&db, &record(5, 1200)).await.unwrap();

        assert_eq!(count_daily_records(&db).await.unwrap(), 1);
        let rows = all_daily_records(&db).await.unwrap();
        assert_eq!(rows[0].total_transactions, 1200);
        assert_eq!(rows[0].shielded_tx_ratio(), 0.5);
    }

    #[tokio::test]
    async fn test_recent_records_are_ascending() {
        let db = memory_db().await;
        for d in [3, 1, 4, 2, 5] {
            upsert_daily_record(&db, &record(d, 1000 + d as i64)).await.unwrap();
        }

        let dates: Vec<NaiveDate> = recent_daily_records(&db, 3)
            .await
            .unwrap()
            .iter()
            .map(|r| r.date)
            .collect();
        assert_eq!(dates, vec![day(3), day(4), day(5)]);
    }

    #[tokio::test]
    async fn test_range_queries_are_inclusive() {
        let db = memory_db().await;
        for d in 1..=6 {
            upsert_daily_record(&db, &record(d, 1000)).await.unwrap();
        }

        let range = DateRange { start: Some(day(2)), end: Some(day(4)) };
        let dates: Vec<NaiveDate> = daily_records_between(&db, &range)
            .await
            .unwrap()
            .iter()
            .map(|r| r.date)
            .collect();
        assert_eq!(dates, vec![day(2), day(3), day(4)]);

        let inverted = DateRange { start: Some(day(5)), end: Some(day(1)) };
        assert!(daily_records_between(&db, &inverted).await.unwrap().is_empty());

        let open = DateRange { start: None, end: None };
        assert_eq!(daily_records_between(&db, &open).await.unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_duplicate_alert_ids_are_ignored() {
        let db = memory_db().await;
        let first = vec![alert("alert-aaaaaaaaaaaa", at(2, 9))];
        assert_eq!(insert_alerts(&db, &first).await.unwrap(), 1);

        let second = vec![
            alert("alert-aaaaaaaaaaaa", at(2, 9)),
            alert("alert-bbbbbbbbbbbb", at(3, 9)),
        ];
        assert_eq!(insert_alerts(&db, &second).await.unwrap(), 1);
        assert_eq!(insert_alerts(&db, &[]).await.unwrap(), 0);

        let ids: Vec<String> = recent_alerts(&db, 10).await.unwrap().into_iter().map(|a| a.id).collect();
        assert_eq!(ids, vec!["alert-bbbbbbbbbbbb", "alert-aaaaaaaaaaaa"]);
    }

    #[tokio::test]
    async fn test_alert_range_covers_whole_end_day() {
        let db = memory_db().await;
        let alerts = vec![
            alert("alert-000000000001", at(1, 23)),
            alert("alert-000000000002", at(2, 0)),
            alert("alert-000000000003", at(2, 23)),
            alert("alert-000000000004", at(3, 0)),
        ];
        insert_alerts(&db, &alerts).await.unwrap();

        let range = DateRange { start: Some(day(2)), end: Some(day(2)) };
        let found = alerts_between(&db, &range).await.unwrap();
        let ids: Vec<&str> = found.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["alert-000000000003", "alert-000000000002"]);

        let limited = recent_alerts(&db, 2).await.unwrap();
        assert_eq!(limited.len(), 2);
        assert_eq!(limited[0].timestamp, at(2, 0) + Duration::hours(24));
    }

    #[tokio::test]
    async fn test_alert_types_on_day() {
        let db = memory_db().await;
        let noon = Utc.from_utc_datetime(&day(5).and_hms_opt(12, 0, 0).unwrap());
        insert_alerts(&db, &[alert("alert-00000000000f", noon)]).await.unwrap();

        let types = alert_types_on(&db, day(5)).await.unwrap();
        assert!(types.contains("fees_spike"));
        assert!(alert_types_on(&db, day(6)).await.unwrap().is_empty());
    }
}
