//! Measurement units (ton, cubic meter, ...). Root of the mineral branch of
//! the cascade graph.

use sea_orm::entity::prelude::*;

use crate::lifecycle::impl_soft_deletable;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "units")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    /// Fee charged per weighing expressed in this unit, in minor currency.
    pub weighing_price: i64,
    pub created_at: DateTimeUtc,
    pub deleted_at: Option<DateTimeUtc>,
    pub deleted_by_kind: Option<String>,
    pub deleted_by_id: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::minerals::Entity")]
    Minerals,
}

impl Related<super::minerals::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Minerals.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl_soft_deletable!(Unit);
