use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // One row per UTC calendar date, replaced on re-ingestion
        manager
            .create_table(
                Table::create()
                    .table(DailyMetrics::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(DailyMetrics::Date)
                            .date()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(DailyMetrics::TotalTransactions)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(DailyMetrics::ShieldedTransactions)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(DailyMetrics::TransparentTransactions)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(DailyMetrics::ShieldedVolumeZec)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(DailyMetrics::TransparentVolumeZec)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(DailyMetrics::AvgFeeZec)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(DailyMetrics::MedianFeeZec)
                            .double()
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(DailyMetrics::AvgBlockTimeSeconds)
                            .double()
                            .not_null()
                            .default(75.0),
                    )
                    .col(
                        ColumnDef::new(DailyMetrics::ActiveAddresses)
                            .big_integer()
                            .not_null()
                            .default(0),
                    )
                    .col(ColumnDef::new(DailyMetrics::ZecPriceUsd).double().null())
                    .col(ColumnDef::new(DailyMetrics::MarketCapUsd).big_integer().null())
                    .col(
                        ColumnDef::new(DailyMetrics::TradingVolumeUsd)
                            .big_integer()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(DailyMetrics::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(SimpleExpr::Keyword(Keyword::CurrentTimestamp)),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(DailyMetrics::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum DailyMetrics {
    Table,
    Date,
    TotalTransactions,
    ShieldedTransactions,
    TransparentTransactions,
    ShieldedVolumeZec,
    TransparentVolumeZec,
    AvgFeeZec,
    MedianFeeZec,
    AvgBlockTimeSeconds,
    ActiveAddresses,
    ZecPriceUsd,
    MarketCapUsd,
    TradingVolumeUsd,
    UpdatedAt,
}
