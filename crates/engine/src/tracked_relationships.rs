//! Severed-relationship bookkeeping.
//!
//! When a cascade severs a many-to-many link (today: company to vehicle) the
//! link row is deleted, so something else must remember it existed. Rows in
//! this table are that memory; restore consumes them to rebuild the links.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::Serialize;

use crate::{EngineError, lifecycle::EntityKind};

/// A severed link as the engine hands it out, with kinds parsed into
/// [`EntityKind`] instead of raw strings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TrackedLink {
    pub owner_kind: EntityKind,
    pub owner_id: String,
    pub dependent_kind: EntityKind,
    pub dependent_id: String,
    pub severed_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "tracked_relationships")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub owner_kind: String,
    pub owner_id: String,
    pub dependent_kind: String,
    pub dependent_id: String,
    pub severed_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for TrackedLink {
    type Error = EngineError;

    fn try_from(value: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            owner_kind: EntityKind::try_from(value.owner_kind.as_str())?,
            owner_id: value.owner_id,
            dependent_kind: EntityKind::try_from(value.dependent_kind.as_str())?,
            dependent_id: value.dependent_id,
            severed_at: value.severed_at,
        })
    }
}
