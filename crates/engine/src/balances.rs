//! Running (company, mineral) balances.
//!
//! At most one active row per pair, enforced by a partial unique index over
//! `(company_id, mineral_id) WHERE deleted_at IS NULL`. Soft-deleted rows
//! fall outside the index, so a pair can accumulate deleted history without
//! blocking a fresh active row.

use sea_orm::entity::prelude::*;

use crate::lifecycle::impl_soft_deletable;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "balances")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    /// Remaining quantity in the mineral's unit. May go negative only
    /// through reversal anomalies, never through `apply_weighing`.
    pub amount: i64,
    pub company_id: String,
    pub mineral_id: String,
    /// Snapshot of the company's type when the row was created.
    pub company_type: String,
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

impl ActiveModelBehavior for ActiveModel {}

impl_soft_deletable!(Balance);
