//! Initial schema migration - creates all tables from scratch.
//!
//! Consolidated schema for the mineral registry:
//!
//! - `units`: measurement units
//! - `minerals`: tradeable minerals, priced per unit
//! - `vehicle_types` / `vehicles`: transport fleet
//! - `companies`: licensed traders
//! - `company_vehicles`: many-to-many company/vehicle links
//! - `scales`: weighbridge stations
//! - `purchases` / `weighings`: ledger events
//! - `balances`: running (company, mineral) amounts
//! - `tracked_relationships`: links severed by cascades
//!
//! Every soft-deletable table carries the same four lifecycle columns,
//! declared through the shared `Lifecycle` identifiers.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

// ─────────────────────────────────────────────────────────────────────────────
// Table identifiers
// ─────────────────────────────────────────────────────────────────────────────

/// Column names shared by every soft-deletable table.
#[derive(Iden)]
enum Lifecycle {
    CreatedAt,
    DeletedAt,
    DeletedByKind,
    DeletedById,
}

#[derive(Iden)]
enum Units {
    Table,
    Id,
    Name,
    WeighingPrice,
}

#[derive(Iden)]
enum Minerals {
    Table,
    Id,
    Name,
    UnitPrice,
    UnitId,
}

#[derive(Iden)]
enum VehicleTypes {
    Table,
    Id,
    Name,
    AxleCount,
    AllowedWeight,
}

#[derive(Iden)]
enum Vehicles {
    Table,
    Id,
    PlateNumber,
    DriverName,
    EmptyWeight,
    VehicleTypeId,
}

#[derive(Iden)]
enum Companies {
    Table,
    Id,
    Name,
    LeaderName,
    LicenseNumber,
    TinNumber,
    CompanyType,
}

#[derive(Iden)]
enum CompanyVehicles {
    Table,
    CompanyId,
    VehicleId,
    CreatedAt,
}

#[derive(Iden)]
enum Scales {
    Table,
    Id,
    Name,
    Location,
    Province,
}

#[derive(Iden)]
enum Purchases {
    Table,
    Id,
    Area,
    Quantity,
    UnitPrice,
    RoyaltyReceiptNumber,
    Applied,
    CompanyId,
    MineralId,
    ScaleId,
}

#[derive(Iden)]
enum Weighings {
    Table,
    Id,
    Quantity,
    BillNumber,
    DischargePlace,
    Applied,
    PurchaseId,
    MineralId,
    VehicleId,
    ScaleId,
}

#[derive(Iden)]
enum Balances {
    Table,
    Id,
    Amount,
    CompanyId,
    MineralId,
    CompanyType,
}

#[derive(Iden)]
enum TrackedRelationships {
    Table,
    Id,
    OwnerKind,
    OwnerId,
    DependentKind,
    DependentId,
    SeveredAt,
}

fn add_lifecycle(table: &mut TableCreateStatement) -> &mut TableCreateStatement {
    table
        .col(ColumnDef::new(Lifecycle::CreatedAt).timestamp().not_null())
        .col(ColumnDef::new(Lifecycle::DeletedAt).timestamp())
        .col(ColumnDef::new(Lifecycle::DeletedByKind).string())
        .col(ColumnDef::new(Lifecycle::DeletedById).string())
}

// ─────────────────────────────────────────────────────────────────────────────
// Migration implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ───────────────────────────────────────────────────────────────────
        // 1. Units
        // ───────────────────────────────────────────────────────────────────
        let mut units = Table::create();
        units
            .table(Units::Table)
            .if_not_exists()
            .col(ColumnDef::new(Units::Id).string().not_null().primary_key())
            .col(ColumnDef::new(Units::Name).string().not_null())
            .col(
                ColumnDef::new(Units::WeighingPrice)
                    .big_integer()
                    .not_null(),
            );
        add_lifecycle(&mut units);
        manager.create_table(units.to_owned()).await?;

        // ───────────────────────────────────────────────────────────────────
        // 2. Minerals
        // ───────────────────────────────────────────────────────────────────
        let mut minerals = Table::create();
        minerals
            .table(Minerals::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(Minerals::Id)
                    .string()
                    .not_null()
                    .primary_key(),
            )
            .col(ColumnDef::new(Minerals::Name).string().not_null())
            .col(ColumnDef::new(Minerals::UnitPrice).big_integer().not_null())
            .col(ColumnDef::new(Minerals::UnitId).string().not_null())
            .foreign_key(
                ForeignKey::create()
                    .name("fk-minerals-unit_id")
                    .from(Minerals::Table, Minerals::UnitId)
                    .to(Units::Table, Units::Id),
            );
        add_lifecycle(&mut minerals);
        manager.create_table(minerals.to_owned()).await?;

        // ───────────────────────────────────────────────────────────────────
        // 3. Vehicle types and vehicles
        // ───────────────────────────────────────────────────────────────────
        let mut vehicle_types = Table::create();
        vehicle_types
            .table(VehicleTypes::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(VehicleTypes::Id)
                    .string()
                    .not_null()
                    .primary_key(),
            )
            .col(ColumnDef::new(VehicleTypes::Name).string().not_null())
            .col(
                ColumnDef::new(VehicleTypes::AxleCount)
                    .integer()
                    .not_null(),
            )
            .col(
                ColumnDef::new(VehicleTypes::AllowedWeight)
                    .big_integer()
                    .not_null(),
            );
        add_lifecycle(&mut vehicle_types);
        manager.create_table(vehicle_types.to_owned()).await?;

        let mut vehicles = Table::create();
        vehicles
            .table(Vehicles::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(Vehicles::Id)
                    .string()
                    .not_null()
                    .primary_key(),
            )
            .col(ColumnDef::new(Vehicles::PlateNumber).string().not_null())
            .col(ColumnDef::new(Vehicles::DriverName).string().not_null())
            .col(ColumnDef::new(Vehicles::EmptyWeight).big_integer().not_null())
            .col(ColumnDef::new(Vehicles::VehicleTypeId).string().not_null())
            .foreign_key(
                ForeignKey::create()
                    .name("fk-vehicles-vehicle_type_id")
                    .from(Vehicles::Table, Vehicles::VehicleTypeId)
                    .to(VehicleTypes::Table, VehicleTypes::Id),
            );
        add_lifecycle(&mut vehicles);
        manager.create_table(vehicles.to_owned()).await?;

        // ───────────────────────────────────────────────────────────────────
        // 4. Companies and vehicle links
        // ───────────────────────────────────────────────────────────────────
        let mut companies = Table::create();
        companies
            .table(Companies::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(Companies::Id)
                    .string()
                    .not_null()
                    .primary_key(),
            )
            .col(ColumnDef::new(Companies::Name).string().not_null())
            .col(ColumnDef::new(Companies::LeaderName).string().not_null())
            .col(ColumnDef::new(Companies::LicenseNumber).string().not_null())
            .col(
                ColumnDef::new(Companies::TinNumber)
                    .string()
                    .not_null()
                    .unique_key(),
            )
            .col(
                ColumnDef::new(Companies::CompanyType)
                    .string()
                    .not_null()
                    .default("General"),
            );
        add_lifecycle(&mut companies);
        manager.create_table(companies.to_owned()).await?;

        manager
            .create_table(
                Table::create()
                    .table(CompanyVehicles::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(CompanyVehicles::CompanyId).string().not_null())
                    .col(ColumnDef::new(CompanyVehicles::VehicleId).string().not_null())
                    .col(
                        ColumnDef::new(CompanyVehicles::CreatedAt)
                            .timestamp()
                            .not_null(),
                    )
                    .primary_key(
                        Index::create()
                            .col(CompanyVehicles::CompanyId)
                            .col(CompanyVehicles::VehicleId),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-company_vehicles-company_id")
                            .from(CompanyVehicles::Table, CompanyVehicles::CompanyId)
                            .to(Companies::Table, Companies::Id),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-company_vehicles-vehicle_id")
                            .from(CompanyVehicles::Table, CompanyVehicles::VehicleId)
                            .to(Vehicles::Table, Vehicles::Id),
                    )
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 5. Scales
        // ───────────────────────────────────────────────────────────────────
        let mut scales = Table::create();
        scales
            .table(Scales::Table)
            .if_not_exists()
            .col(ColumnDef::new(Scales::Id).string().not_null().primary_key())
            .col(ColumnDef::new(Scales::Name).string().not_null())
            .col(ColumnDef::new(Scales::Location).string().not_null())
            .col(ColumnDef::new(Scales::Province).string().not_null());
        add_lifecycle(&mut scales);
        manager.create_table(scales.to_owned()).await?;

        // ───────────────────────────────────────────────────────────────────
        // 6. Purchases
        // ───────────────────────────────────────────────────────────────────
        let mut purchases = Table::create();
        purchases
            .table(Purchases::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(Purchases::Id)
                    .string()
                    .not_null()
                    .primary_key(),
            )
            .col(ColumnDef::new(Purchases::Area).string().not_null())
            .col(ColumnDef::new(Purchases::Quantity).big_integer().not_null())
            .col(ColumnDef::new(Purchases::UnitPrice).big_integer().not_null())
            .col(
                ColumnDef::new(Purchases::RoyaltyReceiptNumber)
                    .string()
                    .not_null(),
            )
            .col(ColumnDef::new(Purchases::Applied).boolean().not_null())
            .col(ColumnDef::new(Purchases::CompanyId).string().not_null())
            .col(ColumnDef::new(Purchases::MineralId).string().not_null())
            .col(ColumnDef::new(Purchases::ScaleId).string().not_null())
            .foreign_key(
                ForeignKey::create()
                    .name("fk-purchases-company_id")
                    .from(Purchases::Table, Purchases::CompanyId)
                    .to(Companies::Table, Companies::Id),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk-purchases-mineral_id")
                    .from(Purchases::Table, Purchases::MineralId)
                    .to(Minerals::Table, Minerals::Id),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk-purchases-scale_id")
                    .from(Purchases::Table, Purchases::ScaleId)
                    .to(Scales::Table, Scales::Id),
            );
        add_lifecycle(&mut purchases);
        manager.create_table(purchases.to_owned()).await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-purchases-company_id-deleted_at")
                    .table(Purchases::Table)
                    .col(Purchases::CompanyId)
                    .col(Lifecycle::DeletedAt)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 7. Weighings
        // ───────────────────────────────────────────────────────────────────
        let mut weighings = Table::create();
        weighings
            .table(Weighings::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(Weighings::Id)
                    .string()
                    .not_null()
                    .primary_key(),
            )
            .col(ColumnDef::new(Weighings::Quantity).big_integer().not_null())
            .col(ColumnDef::new(Weighings::BillNumber).string().not_null())
            .col(ColumnDef::new(Weighings::DischargePlace).string().not_null())
            .col(ColumnDef::new(Weighings::Applied).boolean().not_null())
            .col(ColumnDef::new(Weighings::PurchaseId).string().not_null())
            .col(ColumnDef::new(Weighings::MineralId).string().not_null())
            .col(ColumnDef::new(Weighings::VehicleId).string().not_null())
            .col(ColumnDef::new(Weighings::ScaleId).string().not_null())
            .foreign_key(
                ForeignKey::create()
                    .name("fk-weighings-purchase_id")
                    .from(Weighings::Table, Weighings::PurchaseId)
                    .to(Purchases::Table, Purchases::Id),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk-weighings-mineral_id")
                    .from(Weighings::Table, Weighings::MineralId)
                    .to(Minerals::Table, Minerals::Id),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk-weighings-vehicle_id")
                    .from(Weighings::Table, Weighings::VehicleId)
                    .to(Vehicles::Table, Vehicles::Id),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk-weighings-scale_id")
                    .from(Weighings::Table, Weighings::ScaleId)
                    .to(Scales::Table, Scales::Id),
            );
        add_lifecycle(&mut weighings);
        manager.create_table(weighings.to_owned()).await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-weighings-purchase_id-deleted_at")
                    .table(Weighings::Table)
                    .col(Weighings::PurchaseId)
                    .col(Lifecycle::DeletedAt)
                    .to_owned(),
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 8. Balances
        // ───────────────────────────────────────────────────────────────────
        let mut balances = Table::create();
        balances
            .table(Balances::Table)
            .if_not_exists()
            .col(
                ColumnDef::new(Balances::Id)
                    .string()
                    .not_null()
                    .primary_key(),
            )
            .col(ColumnDef::new(Balances::Amount).big_integer().not_null())
            .col(ColumnDef::new(Balances::CompanyId).string().not_null())
            .col(ColumnDef::new(Balances::MineralId).string().not_null())
            .col(ColumnDef::new(Balances::CompanyType).string().not_null())
            .foreign_key(
                ForeignKey::create()
                    .name("fk-balances-company_id")
                    .from(Balances::Table, Balances::CompanyId)
                    .to(Companies::Table, Companies::Id),
            )
            .foreign_key(
                ForeignKey::create()
                    .name("fk-balances-mineral_id")
                    .from(Balances::Table, Balances::MineralId)
                    .to(Minerals::Table, Minerals::Id),
            );
        add_lifecycle(&mut balances);
        manager.create_table(balances.to_owned()).await?;

        // One active row per (company, mineral). The query builder cannot
        // express a partial index, so raw SQL it is.
        manager
            .get_connection()
            .execute_unprepared(
                "CREATE UNIQUE INDEX IF NOT EXISTS \"idx-balances-pair-active\" \
                 ON \"balances\" (\"company_id\", \"mineral_id\") \
                 WHERE \"deleted_at\" IS NULL;",
            )
            .await?;

        // ───────────────────────────────────────────────────────────────────
        // 9. Tracked relationships
        // ───────────────────────────────────────────────────────────────────
        manager
            .create_table(
                Table::create()
                    .table(TrackedRelationships::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(TrackedRelationships::Id)
                            .string()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(TrackedRelationships::OwnerKind)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TrackedRelationships::OwnerId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TrackedRelationships::DependentKind)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TrackedRelationships::DependentId)
                            .string()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(TrackedRelationships::SeveredAt)
                            .timestamp()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-tracked_relationships-owner")
                    .table(TrackedRelationships::Table)
                    .col(TrackedRelationships::OwnerKind)
                    .col(TrackedRelationships::OwnerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TrackedRelationships::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Balances::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Weighings::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Purchases::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Scales::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(CompanyVehicles::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Companies::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Vehicles::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(VehicleTypes::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Minerals::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Units::Table).to_owned())
            .await?;
        Ok(())
    }
}
