//! `SeaORM` entity prelude

pub use super::alerts::Entity as Alerts;
pub use super::daily_metrics::Entity as DailyMetrics;
pub use super::sync_status::Entity as SyncStatus;
