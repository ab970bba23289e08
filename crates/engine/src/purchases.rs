//! Mineral purchases.
//!
//! A purchase credits the (company, mineral) balance with its quantity. The
//! `applied` flag records whether that credit is currently posted, so the
//! ledger effect is applied and reversed exactly once no matter how many
//! times a cascade passes over the row.

use sea_orm::entity::prelude::*;

use crate::lifecycle::impl_soft_deletable;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "purchases")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub area: String,
    /// Purchased quantity in the mineral's unit.
    pub quantity: i64,
    /// Agreed price per unit, in minor currency.
    pub unit_price: i64,
    pub royalty_receipt_number: String,
    pub applied: bool,
    pub company_id: String,
    pub mineral_id: String,
    pub scale_id: String,
    pub created_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
    pub deleted_by_kind: Option<String>,
    pub deleted_by_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::companies::Entity",
        from = "Column::CompanyId",
        to = "super::companies::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Companies,
    #[sea_orm(
        belongs_to = "super::minerals::Entity",
        from = "Column::MineralId",
        to = "super::minerals::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Minerals,
    #[sea_orm(
        belongs_to = "super::scales::Entity",
        from = "Column::ScaleId",
        to = "super::scales::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    Scales,
    #[sea_orm(has_many = "super::weighings::Entity")]
    Weighings,
}

impl Related<super::companies::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Companies.def()
    }
}

impl Related<super::minerals::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Minerals.def()
    }
}

impl Related<super::scales::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Scales.def()
    }
}

impl Related<super::weighings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Weighings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl_soft_deletable!(Purchase);
