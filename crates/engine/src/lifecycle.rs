//! Lifecycle primitives: entity kinds, the soft-delete capability trait and
//! the declarative cascade-policy table.
//!
//! The policy is data, not code: each soft-deletable kind maps to an ordered
//! list of dependent relations, each tagged single-owner (foreign key) or
//! shared-owner (many-to-many). Deletion walks the list in order; restore
//! walks it in reverse so balance rows are live again before purchase effects
//! re-apply. The graph is acyclic by construction (checked in tests).

use chrono::{DateTime, Utc};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Every entity type participating in soft delete.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Unit,
    Mineral,
    VehicleType,
    Vehicle,
    Company,
    Scale,
    Purchase,
    Weighing,
    Balance,
}

impl EntityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Mineral => "mineral",
            Self::VehicleType => "vehicle_type",
            Self::Vehicle => "vehicle",
            Self::Company => "company",
            Self::Scale => "scale",
            Self::Purchase => "purchase",
            Self::Weighing => "weighing",
            Self::Balance => "balance",
        }
    }

    pub const ALL: [EntityKind; 9] = [
        Self::Unit,
        Self::Mineral,
        Self::VehicleType,
        Self::Vehicle,
        Self::Company,
        Self::Scale,
        Self::Purchase,
        Self::Weighing,
        Self::Balance,
    ];
}

impl TryFrom<&str> for EntityKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "unit" => Ok(Self::Unit),
            "mineral" => Ok(Self::Mineral),
            "vehicle_type" => Ok(Self::VehicleType),
            "vehicle" => Ok(Self::Vehicle),
            "company" => Ok(Self::Company),
            "scale" => Ok(Self::Scale),
            "purchase" => Ok(Self::Purchase),
            "weighing" => Ok(Self::Weighing),
            "balance" => Ok(Self::Balance),
            other => Err(EngineError::InvalidKind(other.to_string())),
        }
    }
}

/// Observable lifecycle state, derived from the deletion timestamp.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Active,
    Deleted,
}

/// How a dependent relates to its owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CascadeLink {
    /// Foreign key: the dependent has exactly one owner of this type.
    SingleOwner,
    /// Many-to-many: the dependent may have several owners; it is only
    /// deleted once its last active owner goes away.
    SharedOwner,
}

/// One dependent relation in an owner's cascade policy.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CascadeRule {
    pub dependent: EntityKind,
    pub link: CascadeLink,
}

const fn single(dependent: EntityKind) -> CascadeRule {
    CascadeRule {
        dependent,
        link: CascadeLink::SingleOwner,
    }
}

const fn shared(dependent: EntityKind) -> CascadeRule {
    CascadeRule {
        dependent,
        link: CascadeLink::SharedOwner,
    }
}

/// The dependents that must follow a lifecycle change of `kind`, in cascade
/// order.
pub fn cascade_policy(kind: EntityKind) -> &'static [CascadeRule] {
    use EntityKind::*;

    match kind {
        Unit => const { &[single(Mineral)] },
        Mineral => const { &[single(Purchase), single(Weighing)] },
        VehicleType => const { &[single(Vehicle)] },
        Vehicle => const { &[single(Weighing)] },
        Scale => const { &[single(Purchase), single(Weighing)] },
        Company => const { &[single(Purchase), single(Balance), shared(Vehicle)] },
        Purchase => const { &[single(Weighing)] },
        Weighing | Balance => &[],
    }
}

/// Capability interface for entities that participate in soft delete.
///
/// Implemented per entity so the cascade machinery can be written once,
/// generically: it only needs the lifecycle columns and a way to read the id
/// and deletion stamp off a model.
pub trait SoftDeletable: EntityTrait {
    const KIND: EntityKind;

    fn id_column() -> Self::Column;
    fn deleted_at_column() -> Self::Column;
    fn deleted_by_kind_column() -> Self::Column;
    fn deleted_by_id_column() -> Self::Column;

    fn model_id(model: &Self::Model) -> &str;
    fn model_deleted_at(model: &Self::Model) -> Option<DateTime<Utc>>;
}

/// Wires a sea-orm entity into the lifecycle machinery.
///
/// Expanded inside the entity module, where `Entity`, `Column` and `Model`
/// are in scope. Every soft-deletable table carries the same four columns, so
/// the impl is mechanical.
macro_rules! impl_soft_deletable {
    ($kind:ident) => {
        impl crate::lifecycle::SoftDeletable for Entity {
            const KIND: crate::lifecycle::EntityKind = crate::lifecycle::EntityKind::$kind;

            fn id_column() -> Self::Column {
                Column::Id
            }

            fn deleted_at_column() -> Self::Column {
                Column::DeletedAt
            }

            fn deleted_by_kind_column() -> Self::Column {
                Column::DeletedByKind
            }

            fn deleted_by_id_column() -> Self::Column {
                Column::DeletedById
            }

            fn model_id(model: &Self::Model) -> &str {
                &model.id
            }

            fn model_deleted_at(model: &Self::Model) -> Option<chrono::DateTime<chrono::Utc>> {
                model.deleted_at
            }
        }
    };
}

pub(crate) use impl_soft_deletable;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trips_through_str() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::try_from(kind.as_str()).unwrap(), kind);
        }
        assert!(matches!(
            EntityKind::try_from("maktoob"),
            Err(EngineError::InvalidKind(_))
        ));
    }

    #[test]
    fn policy_graph_is_acyclic() {
        fn walk(kind: EntityKind, path: &mut Vec<EntityKind>) {
            assert!(
                !path.contains(&kind),
                "cycle through {kind:?} via {path:?}"
            );
            path.push(kind);
            for rule in cascade_policy(kind) {
                walk(rule.dependent, path);
            }
            path.pop();
        }

        for kind in EntityKind::ALL {
            walk(kind, &mut Vec::new());
        }
    }

    #[test]
    fn company_policy_orders_ledger_before_links() {
        let rules = cascade_policy(EntityKind::Company);
        assert_eq!(
            rules,
            &[
                single(EntityKind::Purchase),
                single(EntityKind::Balance),
                shared(EntityKind::Vehicle),
            ]
        );
    }

    #[test]
    fn only_company_vehicle_is_shared() {
        for kind in EntityKind::ALL {
            for rule in cascade_policy(kind) {
                if rule.link == CascadeLink::SharedOwner {
                    assert_eq!(kind, EntityKind::Company);
                    assert_eq!(rule.dependent, EntityKind::Vehicle);
                }
            }
        }
    }
}
