use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240301_000001_create_catalog_tables::Migration),
            Box::new(m20240301_000002_create_procurement_tables::Migration),
            Box::new(m20240301_000003_create_stock_tables::Migration),
            Box::new(m20240301_000004_create_minimum_stocks_table::Migration),
            Box::new(m20240301_000005_create_notification_outbox_table::Migration),
        ]
    }
}

mod m20240301_000001_create_catalog_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Warehouses::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Warehouses::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Warehouses::Name).string().not_null())
                        .col(
                            ColumnDef::new(Warehouses::Kind)
                                .string_len(32)
                                .not_null()
                                .unique_key(),
                        )
                        .to_owned(),
                )
                .await?;

            // the two well-known warehouses every other table hangs off
            let mut seed = Query::insert();
            seed.into_table(Warehouses::Table).columns([
                Warehouses::Id,
                Warehouses::Name,
                Warehouses::Kind,
            ]);
            for (id, name, kind) in [
                (1i64, "Raw material warehouse", "raw-material"),
                (2i64, "Finished goods warehouse", "finished-goods"),
            ] {
                seed.values([id.into(), name.into(), kind.into()])
                    .map_err(|e| DbErr::Custom(e.to_string()))?;
            }
            manager.exec_stmt(seed).await?;

            manager
                .create_table(
                    Table::create()
                        .table(Materials::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Materials::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Materials::WarehouseId).big_integer().not_null())
                        .col(ColumnDef::new(Materials::Category).string_len(32).not_null())
                        .col(
                            ColumnDef::new(Materials::IsStandard)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(ColumnDef::new(Materials::MaterialType).string().null())
                        .col(ColumnDef::new(Materials::Size).string().null())
                        .col(ColumnDef::new(Materials::Color).string().null())
                        .col(ColumnDef::new(Materials::ArtworkUrl).string().null())
                        .col(
                            ColumnDef::new(Materials::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_materials_warehouse")
                                .from(Materials::Table, Materials::WarehouseId)
                                .to(Warehouses::Table, Warehouses::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_materials_identity")
                        .table(Materials::Table)
                        .col(Materials::WarehouseId)
                        .col(Materials::Category)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Qualities::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Qualities::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Qualities::Absorbency).decimal_len(10, 4).null())
                        .col(ColumnDef::new(Qualities::Whiteness).decimal_len(10, 4).null())
                        .col(ColumnDef::new(Qualities::InkDensity).decimal_len(10, 4).null())
                        .col(ColumnDef::new(Qualities::Viscosity).decimal_len(10, 4).null())
                        .col(ColumnDef::new(Qualities::ColorDelta).decimal_len(10, 4).null())
                        .col(
                            ColumnDef::new(Qualities::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Qualities::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Materials::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Warehouses::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Warehouses {
        Table,
        Id,
        Name,
        Kind,
    }

    #[derive(DeriveIden)]
    enum Materials {
        Table,
        Id,
        WarehouseId,
        Category,
        IsStandard,
        MaterialType,
        Size,
        Color,
        ArtworkUrl,
        CreatedAt,
    }

    #[derive(DeriveIden)]
    enum Qualities {
        Table,
        Id,
        Absorbency,
        Whiteness,
        InkDensity,
        Viscosity,
        ColorDelta,
        CreatedAt,
    }
}

mod m20240301_000002_create_procurement_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000002_create_procurement_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(MaterialOrders::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(MaterialOrders::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(MaterialOrders::SupplierId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MaterialOrders::MaterialId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(MaterialOrders::Quantity).integer().not_null())
                        .col(ColumnDef::new(MaterialOrders::Status).string_len(16).not_null())
                        .col(
                            ColumnDef::new(MaterialOrders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MaterialOrders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_material_orders_material")
                                .from(MaterialOrders::Table, MaterialOrders::MaterialId)
                                .to(Materials::Table, Materials::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(InboundDeliveries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InboundDeliveries::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(InboundDeliveries::MaterialId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InboundDeliveries::MaterialOrderId)
                                .big_integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(InboundDeliveries::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InboundDeliveries::Status)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InboundDeliveries::QualityId)
                                .big_integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(InboundDeliveries::DeliveryDate)
                                .date()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InboundDeliveries::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InboundDeliveries::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inbound_deliveries_material")
                                .from(InboundDeliveries::Table, InboundDeliveries::MaterialId)
                                .to(Materials::Table, Materials::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inbound_deliveries_order")
                                .from(
                                    InboundDeliveries::Table,
                                    InboundDeliveries::MaterialOrderId,
                                )
                                .to(MaterialOrders::Table, MaterialOrders::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_inbound_deliveries_quality")
                                .from(InboundDeliveries::Table, InboundDeliveries::QualityId)
                                .to(Qualities::Table, Qualities::Id),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inbound_deliveries_status")
                        .table(InboundDeliveries::Table)
                        .col(InboundDeliveries::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Complaints::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Complaints::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Complaints::InboundDeliveryId)
                                .big_integer()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Complaints::Quantity).integer().not_null())
                        .col(ColumnDef::new(Complaints::Status).string_len(16).not_null())
                        .col(ColumnDef::new(Complaints::Reason).text().null())
                        .col(
                            ColumnDef::new(Complaints::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_complaints_inbound_delivery")
                                .from(Complaints::Table, Complaints::InboundDeliveryId)
                                .to(InboundDeliveries::Table, InboundDeliveries::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Complaints::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(InboundDeliveries::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(MaterialOrders::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Materials {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Qualities {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum MaterialOrders {
        Table,
        Id,
        SupplierId,
        MaterialId,
        Quantity,
        Status,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum InboundDeliveries {
        Table,
        Id,
        MaterialId,
        MaterialOrderId,
        Quantity,
        Status,
        QualityId,
        DeliveryDate,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Complaints {
        Table,
        Id,
        InboundDeliveryId,
        Quantity,
        Status,
        Reason,
        CreatedAt,
    }
}

mod m20240301_000003_create_stock_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000003_create_stock_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockLots::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockLots::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(StockLots::WarehouseId).big_integer().not_null())
                        .col(ColumnDef::new(StockLots::MaterialId).big_integer().not_null())
                        .col(ColumnDef::new(StockLots::QualityId).big_integer().null())
                        .col(ColumnDef::new(StockLots::IntakeId).big_integer().null())
                        .col(
                            ColumnDef::new(StockLots::Quantity)
                                .integer()
                                .not_null()
                                .default(0)
                                .check(Expr::col(StockLots::Quantity).gte(0)),
                        )
                        .col(
                            ColumnDef::new(StockLots::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockLots::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_lots_warehouse")
                                .from(StockLots::Table, StockLots::WarehouseId)
                                .to(Warehouses::Table, Warehouses::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_lots_material")
                                .from(StockLots::Table, StockLots::MaterialId)
                                .to(Materials::Table, Materials::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_lots_quality")
                                .from(StockLots::Table, StockLots::QualityId)
                                .to(Qualities::Table, Qualities::Id),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_lots_intake")
                                .from(StockLots::Table, StockLots::IntakeId)
                                .to(InboundDeliveries::Table, InboundDeliveries::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_lots_material_warehouse")
                        .table(StockLots::Table)
                        .col(StockLots::MaterialId)
                        .col(StockLots::WarehouseId)
                        .to_owned(),
                )
                .await?;

            // no foreign keys: tasks outlive the lots and materials they point at
            manager
                .create_table(
                    Table::create()
                        .table(Tasks::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Tasks::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Tasks::MaterialId).big_integer().not_null())
                        .col(ColumnDef::new(Tasks::WarehouseId).big_integer().not_null())
                        .col(ColumnDef::new(Tasks::StockLotId).big_integer().null())
                        .col(
                            ColumnDef::new(Tasks::Quantity)
                                .integer()
                                .not_null()
                                .check(Expr::col(Tasks::Quantity).gt(0)),
                        )
                        .col(ColumnDef::new(Tasks::Direction).string_len(16).not_null())
                        .col(ColumnDef::new(Tasks::Requester).string_len(32).not_null())
                        .col(ColumnDef::new(Tasks::OrderLineRef).string().null())
                        .col(ColumnDef::new(Tasks::Status).string_len(32).not_null())
                        .col(
                            ColumnDef::new(Tasks::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Tasks::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Tasks::CompletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_tasks_lot_status")
                        .table(Tasks::Table)
                        .col(Tasks::StockLotId)
                        .col(Tasks::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_tasks_status_requester")
                        .table(Tasks::Table)
                        .col(Tasks::Status)
                        .col(Tasks::Requester)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Tasks::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StockLots::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Warehouses {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Materials {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum Qualities {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum InboundDeliveries {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum StockLots {
        Table,
        Id,
        WarehouseId,
        MaterialId,
        QualityId,
        IntakeId,
        Quantity,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum Tasks {
        Table,
        Id,
        MaterialId,
        WarehouseId,
        StockLotId,
        Quantity,
        Direction,
        Requester,
        OrderLineRef,
        Status,
        CreatedAt,
        UpdatedAt,
        CompletedAt,
    }
}

mod m20240301_000004_create_minimum_stocks_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000004_create_minimum_stocks_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(MinimumStocks::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(MinimumStocks::MaterialId)
                                .big_integer()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(MinimumStocks::MinimumQuantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(MinimumStocks::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_minimum_stocks_material")
                                .from(MinimumStocks::Table, MinimumStocks::MaterialId)
                                .to(Materials::Table, Materials::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(MinimumStocks::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Materials {
        Table,
        Id,
    }

    #[derive(DeriveIden)]
    enum MinimumStocks {
        Table,
        MaterialId,
        MinimumQuantity,
        UpdatedAt,
    }
}

mod m20240301_000005_create_notification_outbox_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240301_000005_create_notification_outbox_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(NotificationOutbox::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(NotificationOutbox::Id)
                                .uuid()
                                .not_null()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(NotificationOutbox::MessageType)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(NotificationOutbox::Payload).text().not_null())
                        .col(
                            ColumnDef::new(NotificationOutbox::Status)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(NotificationOutbox::Attempts)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(NotificationOutbox::LastError).text().null())
                        .col(
                            ColumnDef::new(NotificationOutbox::AvailableAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(NotificationOutbox::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(NotificationOutbox::DeliveredAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_notification_outbox_due")
                        .table(NotificationOutbox::Table)
                        .col(NotificationOutbox::Status)
                        .col(NotificationOutbox::AvailableAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(NotificationOutbox::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum NotificationOutbox {
        Table,
        Id,
        MessageType,
        Payload,
        Status,
        Attempts,
        LastError,
        AvailableAt,
        CreatedAt,
        DeliveredAt,
    }
}
