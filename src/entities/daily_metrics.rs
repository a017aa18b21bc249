//! `SeaORM` Entity for daily_metrics table

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "daily_metrics")]
pub struct Model {
    /// UTC calendar date, one row per day
    #[sea_orm(primary_key, auto_increment = false)]
    pub date: Date,
    pub total_transactions: i64,
    pub shielded_transactions: i64,
    pub transparent_transactions: i64,
    pub shielded_volume_zec: f64,
    pub transparent_volume_zec: f64,
    pub avg_fee_zec: f64,
    pub median_fee_zec: f64,
    pub avg_block_time_seconds: f64,
    pub active_addresses: i64,
    /// Price enrichment, absent when the market data source was unavailable
    pub zec_price_usd: Option<f64>,
    pub market_cap_usd: Option<i64>,
    pub trading_volume_usd: Option<i64>,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
