//! Outcome tracking for background jobs
//!
//! One row per job name. The metadata endpoint reads it to report when the
//! last refresh ran and why it last failed.

use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, Set};

use crate::entities::sync_status::{self, Entity as SyncStatus};

/// Job names for tracking sync status
pub mod jobs {
    pub const METRICS_REFRESH: &str = "metrics_refresh";
    pub const METRICS_BACKFILL: &str = "metrics_backfill";
}

/// Current status row for a job, if it has ever run
pub async fn latest(
    db: &DatabaseConnection,
    job_name: &str,
) -> Result<Option<sync_status::Model>, DbErr> {
    SyncStatus::find_by_id(job_name.to_string()).one(db).await
}

/// Record a completed run. `outcome` is a short label such as "live" or "sample".
pub async fn record_success(
    db: &DatabaseConnection,
    job_name: &str,
    outcome: &str,
    records_written: usize,
) -> Result<(), DbErr> {
    let now = Utc::now();
    let written = i32::try_from(records_written).unwrap_or(i32::MAX);

    match latest(db, job_name).await? {
        Some(record) => {
            let success_count = record.success_count;
            let mut active_model: sync_status::ActiveModel = record.into();
            active_model.last_success_at = Set(Some(now));
            active_model.last_attempt_at = Set(Some(now));
            active_model.last_error = Set(None);
            active_model.last_outcome = Set(Some(outcome.to_string()));
            active_model.records_written = Set(written);
            active_model.success_count = Set(success_count + 1);
            active_model.update(db).await?;
        }
        None => {
            let new_record = sync_status::ActiveModel {
                job_name: Set(job_name.to_string()),
                last_success_at: Set(Some(now)),
                last_attempt_at: Set(Some(now)),
                last_error: Set(None),
                last_outcome: Set(Some(outcome.to_string())),
                records_written: Set(written),
                success_count: Set(1),
                error_count: Set(0),
            };
            new_record.insert(db).await?;
        }
    }

    tracing::debug!("[{}] Recorded successful run ({}, {} rows)", job_name, outcome, records_written);
    Ok(())
}

/// Record a failed run attempt
pub async fn record_failure(
    db: &DatabaseConnection,
    job_name: &str,
    error: &str,
) -> Result<(), DbErr> {
    let now = Utc::now();

    match latest(db, job_name).await? {
        Some(record) => {
            let error_count = record.error_count;
            let mut active_model: sync_status::ActiveModel = record.into();
            active_model.last_attempt_at = Set(Some(now));
            active_model.last_error = Set(Some(error.to_string()));
            active_model.last_outcome = Set(Some("failed".to_string()));
            active_model.records_written = Set(0);
            active_model.error_count = Set(error_count + 1);
            active_model.update(db).await?;
        }
        None => {
            let new_record = sync_status::ActiveModel {
                job_name: Set(job_name.to_string()),
                last_success_at: Set(None),
                last_attempt_at: Set(Some(now)),
                last_error: Set(Some(error.to_string())),
                last_outcome: Set(Some("failed".to_string())),
                records_written: Set(0),
                success_count: Set(0),
                error_count: Set(1),
            };
            new_record.insert(db).await?;
        }
    }

    tracing::debug!("[{}] Recorded failed run: {}", job_name, error);
    Ok(())
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

    #[tokio::test]
    async fn test_success_then_failure_keeps_counts() {
        let db = memory_db().await;
        assert!(latest(&db, jobs::METRICS_REFRESH).await.unwrap().is_none());

        record_success(&db, jobs::METRICS_REFRESH, "live", 7).await.unwrap();
        record_success(&db, jobs::METRICS_REFRESH, "sample", 45).await.unwrap();
        record_failure(&db, jobs::METRICS_REFRESH, "store unavailable").await.unwrap();

        let status = latest(&db, jobs::METRICS_REFRESH).await.unwrap().unwrap();
        assert_eq!(status.success_count, 2);
        assert_eq!(status.error_count, 1);
        assert_eq!(status.last_error.as_deref(), Some("store unavailable"));
        assert_eq!(status.last_outcome.as_deref(), Some("failed"));
        assert!(status.last_success_at.is_some());
    }

    #[tokio::test]
    async fn test_success_clears_previous_error() {
        let db = memory_db().await;
        record_failure(&db, jobs::METRICS_REFRESH, "timeout").await.unwrap();
        record_success(&db, jobs::METRICS_REFRESH, "live", 1).await.unwrap();

        let status = latest(&db, jobs::METRICS_REFRESH).await.unwrap().unwrap();
        assert!(status.last_error.is_none());
        assert_eq!(status.records_written, 1);
        assert_eq!(status.last_outcome.as_deref(), Some("live"));
    }
}
