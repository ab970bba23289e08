//! Weighbridge passages drawing down a purchase.
//!
//! The debited company is the one on the weighing's purchase; a weighing has
//! no company column of its own. `applied` mirrors the purchase-side flag:
//! true while the debit is posted to the balance.

use sea_orm::entity::prelude::*;

use crate::lifecycle::impl_soft_deletable;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "weighings")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Net mineral weight in the mineral's unit, after tare.
    pub quantity: i64,
    pub bill_number: String,
    pub discharge_place: String,
    pub applied: bool,
    pub purchase_id: String,
    pub mineral_id: String,
    pub vehicle_id: String,
    pub scale_id: String,
    pub created_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
    pub deleted_by_kind: Option<String>,
    pub deleted_by_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::purchases::Entity",
        from = "Column::PurchaseId",
        to = "super::purchases::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Purchases,
    #[sea_orm(
        belongs_to = "super::minerals::Entity",
        from = "Column::MineralId",
        to = "super::minerals::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Minerals,
    #[sea_orm(
        belongs_to = "super::vehicles::Entity",
        from = "Column::VehicleId",
        to = "super::vehicles::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Vehicles,
    #[sea_orm(
        belongs_to = "super::scales::Entity",
        from = "Column::ScaleId",
        to = "super::scales::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Scales,
}

impl Related<super::purchases::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Purchases.def()
    }
}

impl Related<super::minerals::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Minerals.def()
    }
}

impl Related<super::vehicles::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Vehicles.def()
    }
}

impl Related<super::scales::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Scales.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl_soft_deletable!(Weighing);
