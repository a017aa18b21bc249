pub use sea_orm_migration::prelude::*;

mod m20251101_000001_create_daily_metrics;
mod m20251101_000002_create_alerts;
mod m20251101_000003_create_sync_status;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251101_000001_create_daily_metrics::Migration),
            Box::new(m20251101_000002_create_alerts::Migration),
            Box::new(m20251101_000003_create_sync_status::Migration),
        ]
    }
}
