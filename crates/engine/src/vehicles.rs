//! Registered transport vehicles.
//!
//! A vehicle belongs to one type but may be linked to several companies at
//! once (see [`crate::company_vehicles`]), which is why its lifecycle is the
//! one shared-owner case in the cascade policy.

use sea_orm::entity::prelude::*;

use crate::lifecycle::impl_soft_deletable;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "vehicles")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub plate_number: String,
    pub driver_name: String,
    /// Tare weight in kilograms, subtracted at the scale.
    pub empty_weight: i64,
    pub vehicle_type_id: String,
    pub created_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
    pub deleted_by_kind: Option<String>,
    pub deleted_by_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::vehicle_types::Entity",
        from = "Column::VehicleTypeId",
        to = "super::vehicle_types::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    VehicleTypes,
    #[sea_orm(has_many = "super::weighings::Entity")]
    Weighings,
    #[sea_orm(has_many = "super::company_vehicles::Entity")]
    CompanyVehicles,
}

impl Related<super::vehicle_types::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::VehicleTypes.def()
    }
}

impl Related<super::weighings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Weighings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl_soft_deletable!(Vehicle);
