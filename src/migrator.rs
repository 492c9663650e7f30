use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_stock_batches_table::Migration),
            Box::new(m20240301_000002_create_stock_adjustments_table::Migration),
            Box::new(m20240301_000003_create_stock_allocations_table::Migration),
            Box::new(m20240301_000004_create_audit_log_entries_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240301_000001_create_stock_batches_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_stock_batches_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // SQLite cannot express numeric(19, 4): sea-query panics on any
            // decimal precision above 16 for that backend, so fall back to an
            // unconstrained decimal there. The cost columns are carried but
            // never computed on, so the constraint only matters on Postgres.
            let cost_column = |name: StockBatches| {
                let mut col = ColumnDef::new(name);
                if manager.get_database_backend() == sea_orm::DbBackend::Sqlite {
                    col.decimal();
                } else {
                    col.decimal_len(19, 4);
                }
                col.null();
                col
            };

            manager
                .create_table(
                    Table::create()
                        .table(StockBatches::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockBatches::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockBatches::ProductId).uuid().not_null())
                        .col(ColumnDef::new(StockBatches::WarehouseId).uuid().not_null())
                        .col(ColumnDef::new(StockBatches::SupplierId).uuid().null())
                        .col(
                            ColumnDef::new(StockBatches::RecordedQuantity)
                                .big_integer()
                                .not_null(),
                        )
                        .col(&mut cost_column(StockBatches::UnitCost))
                        .col(&mut cost_column(StockBatches::TotalCost))
                        .col(
                            ColumnDef::new(StockBatches::ReceivedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockBatches::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockBatches::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_batches_product_id")
                        .table(StockBatches::Table)
                        .col(StockBatches::ProductId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_batches_warehouse_id")
                        .table(StockBatches::Table)
                        .col(StockBatches::WarehouseId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockBatches::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum StockBatches {
        Table,
        Id,
        ProductId,
        WarehouseId,
        SupplierId,
        RecordedQuantity,
        UnitCost,
        TotalCost,
        ReceivedAt,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000002_create_stock_adjustments_table {
    use sea_orm_migration::prelude::*;

    use super::m20240301_000001_create_stock_batches_table::StockBatches;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_stock_adjustments_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockAdjustments::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockAdjustments::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAdjustments::StockBatchId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAdjustments::QuantityDelta)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAdjustments::AdjustmentType)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockAdjustments::Status).string().not_null())
                        .col(ColumnDef::new(StockAdjustments::Reason).string().not_null())
                        .col(
                            ColumnDef::new(StockAdjustments::RequestedBy)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockAdjustments::ApprovedBy).uuid().null())
                        .col(
                            ColumnDef::new(StockAdjustments::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAdjustments::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_adjustments_stock_batch_id")
                                .from(StockAdjustments::Table, StockAdjustments::StockBatchId)
                                .to(StockBatches::Table, StockBatches::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_adjustments_stock_batch_id")
                        .table(StockAdjustments::Table)
                        .col(StockAdjustments::StockBatchId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_adjustments_status")
                        .table(StockAdjustments::Table)
                        .col(StockAdjustments::Status)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockAdjustments::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum StockAdjustments {
        Table,
        Id,
        StockBatchId,
        QuantityDelta,
        AdjustmentType,
        Status,
        Reason,
        RequestedBy,
        ApprovedBy,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000003_create_stock_allocations_table {
    use sea_orm_migration::prelude::*;

    use super::m20240301_000001_create_stock_batches_table::StockBatches;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_stock_allocations_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockAllocations::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockAllocations::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAllocations::StockBatchId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAllocations::StorefrontId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAllocations::Quantity)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAllocations::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockAllocations::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_allocations_stock_batch_id")
                                .from(StockAllocations::Table, StockAllocations::StockBatchId)
                                .to(StockBatches::Table, StockBatches::Id)
                                .on_delete(ForeignKeyAction::Cascade)
                                .on_update(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_allocations_stock_batch_id")
                        .table(StockAllocations::Table)
                        .col(StockAllocations::StockBatchId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_allocations_storefront_id")
                        .table(StockAllocations::Table)
                        .col(StockAllocations::StorefrontId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockAllocations::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum StockAllocations {
        Table,
        Id,
        StockBatchId,
        StorefrontId,
        Quantity,
        CreatedAt,
        UpdatedAt,
    }
}

mod m20240301_000004_create_audit_log_entries_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_audit_log_entries_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // No FK to stock_batches: audit rows must survive any future
            // archival of their subject.
            manager
                .create_table(
                    Table::create()
                        .table(AuditLogEntries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(AuditLogEntries::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(AuditLogEntries::BatchId).uuid().not_null())
                        .col(
                            ColumnDef::new(AuditLogEntries::SubjectTable)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(AuditLogEntries::SubjectId)
                                .uuid()
                                .not_null(),
                        )
                        .col(ColumnDef::new(AuditLogEntries::Action).string().not_null())
                        .col(ColumnDef::new(AuditLogEntries::OldValue).json().null())
                        .col(ColumnDef::new(AuditLogEntries::NewValue).json().null())
                        .col(ColumnDef::new(AuditLogEntries::ActorId).uuid().not_null())
                        .col(ColumnDef::new(AuditLogEntries::Metadata).json().null())
                        .col(
                            ColumnDef::new(AuditLogEntries::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_audit_log_entries_batch_id")
                        .table(AuditLogEntries::Table)
                        .col(AuditLogEntries::BatchId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_audit_log_entries_subject")
                        .table(AuditLogEntries::Table)
                        .col(AuditLogEntries::SubjectTable)
                        .col(AuditLogEntries::SubjectId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_audit_log_entries_created_at")
                        .table(AuditLogEntries::Table)
                        .col(AuditLogEntries::CreatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(AuditLogEntries::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum AuditLogEntries {
        Table,
        Id,
        BatchId,
        SubjectTable,
        SubjectId,
        Action,
        OldValue,
        NewValue,
        ActorId,
        Metadata,
        CreatedAt,
    }
}
