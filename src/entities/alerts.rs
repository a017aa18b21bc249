//! `SeaORM` Entity for alerts table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "alerts")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub timestamp: DateTimeUtc,
    /// Metric + direction, e.g. "transactions_spike"
    #[sea_orm(column_name = "type")]
    pub alert_type: String,
    /// "low", "medium" or "high"
    pub severity: String,
    pub metric: String,
    pub current_value: f64,
    pub baseline_value: f64,
    pub delta_percent: f64,
    #[sea_orm(column_type = "Text")]
    pub summary: String,
    #[sea_orm(column_type = "Text")]
    pub explanation: String,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
