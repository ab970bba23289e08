//! Weighbridge stations.

use sea_orm::entity::prelude::*;

use crate::lifecycle::impl_soft_deletable;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "scales")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub location: String,
    pub province: String,
    pub created_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
    pub deleted_by_kind: Option<String>,
    pub deleted_by_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::purchases::Entity")]
    Purchases,
    #[sea_orm(has_many = "super::weighings::Entity")]
    Weighings,
}

impl Related<super::purchases::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Purchases.def()
    }
}

impl Related<super::weighings::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Weighings.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl_soft_deletable!(Scale);
