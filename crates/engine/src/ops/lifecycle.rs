//! Soft delete and restore, with policy-driven cascades.
//!
//! Both walks run inside the caller's transaction and recurse through
//! [`cascade_policy`]. Deletion stamps dependents with the owner that caused
//! the cascade; restore only revives rows carrying that attribution, so
//! anything deleted independently stays deleted. Restore walks the policy in
//! reverse so balance rows are active again before purchase and weighing
//! effects are re-posted.

use std::{future::Future, pin::Pin};

use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveValue, DatabaseTransaction, PaginatorTrait, QueryFilter, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use tracing::info;

use crate::{
    EngineError, EntityKind, LifecycleState, ResultEngine, SoftDeletable, balances,
    company_vehicles,
    lifecycle::{CascadeLink, cascade_policy},
    minerals, purchases, tracked_relationships, vehicles, weighings,
};

use super::{Engine, dispatch_kind, with_tx};

type CascadeFuture<'a> = Pin<Box<dyn Future<Output = ResultEngine<()>> + Send + 'a>>;

fn label(kind: EntityKind, id: &str) -> String {
    format!("{} {id}", kind.as_str())
}

impl Engine {
    /// Soft-delete a record and everything the cascade policy says must
    /// follow it.
    ///
    /// Event rows (purchases, weighings) have their ledger effect reversed
    /// before the stamp lands, so a deleted event never leaves its quantity
    /// posted. The whole walk is one transaction.
    pub async fn soft_delete(&self, kind: EntityKind, id: &str) -> ResultEngine<()> {
        let stamp = Utc::now();
        with_tx!(self, |db_tx| {
            dispatch_kind!(kind, E => {
                let model = require_row::<E>(&db_tx, id).await?;
                if E::model_deleted_at(&model).is_some() {
                    return Err(EngineError::AlreadyDeleted(label(kind, id)));
                }
            });

            self.reverse_ledger_effect(&db_tx, kind, id).await?;
            self.cascade_dependents_delete(&db_tx, kind, id, stamp).await?;
            // The root is stamped last and carries no attribution; that is
            // how restore tells it apart from cascaded rows.
            dispatch_kind!(kind, E => stamp_deleted::<E>(&db_tx, id, stamp, None).await?);

            info!(kind = kind.as_str(), id, "soft deleted");
            Ok(())
        })
    }

    /// Restore a soft-deleted record and the dependents its deletion took
    /// down.
    pub async fn restore(&self, kind: EntityKind, id: &str) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            dispatch_kind!(kind, E => {
                let model = require_row::<E>(&db_tx, id).await?;
                if E::model_deleted_at(&model).is_none() {
                    return Err(EngineError::NotDeleted(label(kind, id)));
                }
                clear_deleted::<E>(&db_tx, id).await?;
            });

            self.cascade_dependents_restore(&db_tx, kind, id).await?;
            self.reapply_ledger_effect(&db_tx, kind, id).await?;

            info!(kind = kind.as_str(), id, "restored");
            Ok(())
        })
    }

    /// Current lifecycle state of a record.
    pub async fn lifecycle(&self, kind: EntityKind, id: &str) -> ResultEngine<LifecycleState> {
        with_tx!(self, |db_tx| {
            let deleted = dispatch_kind!(kind, E => {
                let model = require_row::<E>(&db_tx, id).await?;
                E::model_deleted_at(&model).is_some()
            });
            Ok(if deleted {
                LifecycleState::Deleted
            } else {
                LifecycleState::Active
            })
        })
    }

    async fn cascade_dependents_delete(
        &self,
        db: &DatabaseTransaction,
        kind: EntityKind,
        id: &str,
        stamp: DateTime<Utc>,
    ) -> ResultEngine<()> {
        for rule in cascade_policy(kind) {
            match rule.link {
                CascadeLink::SingleOwner => {
                    for dep_id in active_dependent_ids(db, rule.dependent, kind, id).await? {
                        self.cascade_delete_row(db, rule.dependent, &dep_id, stamp, kind, id)
                            .await?;
                    }
                }
                CascadeLink::SharedOwner => {
                    self.sever_shared_links(db, kind, id, rule.dependent, stamp)
                        .await?;
                }
            }
        }
        Ok(())
    }

    fn cascade_delete_row<'a>(
        &'a self,
        db: &'a DatabaseTransaction,
        kind: EntityKind,
        id: &'a str,
        stamp: DateTime<Utc>,
        by_kind: EntityKind,
        by_id: &'a str,
    ) -> CascadeFuture<'a> {
        Box::pin(async move {
            self.reverse_ledger_effect(db, kind, id).await?;
            self.cascade_dependents_delete(db, kind, id, stamp).await?;
            dispatch_kind!(kind, E => {
                stamp_deleted::<E>(db, id, stamp, Some((by_kind, by_id))).await?;
            });
            Ok(())
        })
    }

    async fn cascade_dependents_restore(
        &self,
        db: &DatabaseTransaction,
        kind: EntityKind,
        id: &str,
    ) -> ResultEngine<()> {
        for rule in cascade_policy(kind).iter().rev() {
            match rule.link {
                CascadeLink::SingleOwner => {
                    for dep_id in attributed_dependent_ids(db, rule.dependent, kind, id).await? {
                        self.cascade_restore_row(db, rule.dependent, &dep_id).await?;
                    }
                }
                CascadeLink::SharedOwner => {
                    self.restore_shared_links(db, kind, id, rule.dependent).await?;
                }
            }
        }
        Ok(())
    }

    fn cascade_restore_row<'a>(
        &'a self,
        db: &'a DatabaseTransaction,
        kind: EntityKind,
        id: &'a str,
    ) -> CascadeFuture<'a> {
        Box::pin(async move {
            dispatch_kind!(kind, E => clear_deleted::<E>(db, id).await?);
            self.cascade_dependents_restore(db, kind, id).await?;
            self.reapply_ledger_effect(db, kind, id).await?;
            Ok(())
        })
    }

    /// Sever the owner's many-to-many links, deleting the dependent itself
    /// only when its last active owner is gone.
    async fn sever_shared_links(
        &self,
        db: &DatabaseTransaction,
        owner_kind: EntityKind,
        owner_id: &str,
        dependent: EntityKind,
        stamp: DateTime<Utc>,
    ) -> ResultEngine<()> {
        // The only shared relation today is company -> vehicle.
        if owner_kind != EntityKind::Company || dependent != EntityKind::Vehicle {
            return Ok(());
        }

        let links = company_vehicles::Entity::find()
            .filter(company_vehicles::Column::CompanyId.eq(owner_id))
            .all(db)
            .await?;
        for link in links {
            let vehicle_id = link.vehicle_id.clone();
            self.track_link_tx(db, owner_kind, owner_id, dependent, &vehicle_id, stamp)
                .await?;
            link.delete(db).await?;

            // Link rows of deleted companies were removed by their own
            // cascade, so any remaining row belongs to an active company.
            let remaining = company_vehicles::Entity::find()
                .filter(company_vehicles::Column::VehicleId.eq(vehicle_id.as_str()))
                .count(db)
                .await?;
            if remaining == 0 {
                let vehicle = require_row::<vehicles::Entity>(db, &vehicle_id).await?;
                if vehicle.deleted_at.is_none() {
                    self.cascade_delete_row(
                        db,
                        EntityKind::Vehicle,
                        &vehicle_id,
                        stamp,
                        owner_kind,
                        owner_id,
                    )
                    .await?;
                }
            }
        }
        Ok(())
    }

    /// Rebuild the links severed by this owner's deletion, reviving the
    /// dependent first when this cascade was what took it down.
    async fn restore_shared_links(
        &self,
        db: &DatabaseTransaction,
        owner_kind: EntityKind,
        owner_id: &str,
        dependent: EntityKind,
    ) -> ResultEngine<()> {
        if owner_kind != EntityKind::Company || dependent != EntityKind::Vehicle {
            return Ok(());
        }

        let tracked = tracked_relationships::Entity::find()
            .filter(tracked_relationships::Column::OwnerKind.eq(owner_kind.as_str()))
            .filter(tracked_relationships::Column::OwnerId.eq(owner_id))
            .filter(tracked_relationships::Column::DependentKind.eq(dependent.as_str()))
            .all(db)
            .await?;
        for row in tracked {
            let vehicle_id = row.dependent_id.clone();
            let vehicle = require_row::<vehicles::Entity>(db, &vehicle_id).await?;
            if vehicle.deleted_at.is_some()
                && vehicle.deleted_by_kind.as_deref() == Some(owner_kind.as_str())
                && vehicle.deleted_by_id.as_deref() == Some(owner_id)
            {
                self.cascade_restore_row(db, EntityKind::Vehicle, &vehicle_id)
                    .await?;
            }

            // The link may already be back (hand-planted tracked rows, data
            // surgery); re-creating it is idempotent.
            let linked = company_vehicles::Entity::find()
                .filter(company_vehicles::Column::CompanyId.eq(owner_id))
                .filter(company_vehicles::Column::VehicleId.eq(vehicle_id.as_str()))
                .one(db)
                .await?
                .is_some();
            if !linked {
                company_vehicles::ActiveModel {
                    company_id: ActiveValue::Set(owner_id.to_string()),
                    vehicle_id: ActiveValue::Set(vehicle_id),
                    created_at: ActiveValue::Set(Utc::now()),
                }
                .insert(db)
                .await?;
            }
            row.delete(db).await?;
        }
        Ok(())
    }

    async fn reverse_ledger_effect(
        &self,
        db: &DatabaseTransaction,
        kind: EntityKind,
        id: &str,
    ) -> ResultEngine<()> {
        match kind {
            EntityKind::Purchase => {
                self.reverse_purchase_tx(db, id).await?;
            }
            EntityKind::Weighing => {
                self.reverse_weighing_tx(db, id).await?;
            }
            _ => {}
        }
        Ok(())
    }

    async fn reapply_ledger_effect(
        &self,
        db: &DatabaseTransaction,
        kind: EntityKind,
        id: &str,
    ) -> ResultEngine<()> {
        match kind {
            EntityKind::Purchase => {
                self.apply_purchase_tx(db, id).await?;
            }
            EntityKind::Weighing => {
                // Undoing a reversal is not a new draw-down; checking funds
                // here would make restores order-dependent across purchases.
                self.apply_weighing_tx(db, id, false).await?;
            }
            _ => {}
        }
        Ok(())
    }
}

pub(super) async fn require_row<E: SoftDeletable>(
    db: &DatabaseTransaction,
    id: &str,
) -> ResultEngine<E::Model> {
    E::find()
        .filter(E::id_column().eq(id))
        .one(db)
        .await?
        .ok_or_else(|| EngineError::KeyNotFound(label(E::KIND, id)))
}

pub(super) async fn stamp_deleted<E: SoftDeletable>(
    db: &DatabaseTransaction,
    id: &str,
    stamp: DateTime<Utc>,
    by: Option<(EntityKind, &str)>,
) -> ResultEngine<()> {
    let (by_kind, by_id) = match by {
        Some((kind, owner_id)) => (Some(kind.as_str().to_string()), Some(owner_id.to_string())),
        None => (None, None),
    };
    E::update_many()
        .col_expr(E::deleted_at_column(), Expr::value(Some(stamp)))
        .col_expr(E::deleted_by_kind_column(), Expr::value(by_kind))
        .col_expr(E::deleted_by_id_column(), Expr::value(by_id))
        .filter(E::id_column().eq(id))
        .exec(db)
        .await?;
    Ok(())
}

pub(super) async fn clear_deleted<E: SoftDeletable>(
    db: &DatabaseTransaction,
    id: &str,
) -> ResultEngine<()> {
    E::update_many()
        .col_expr(
            E::deleted_at_column(),
            Expr::value(Option::<DateTime<Utc>>::None),
        )
        .col_expr(E::deleted_by_kind_column(), Expr::value(Option::<String>::None))
        .col_expr(E::deleted_by_id_column(), Expr::value(Option::<String>::None))
        .filter(E::id_column().eq(id))
        .exec(db)
        .await?;
    Ok(())
}

async fn active_ids_by<E: SoftDeletable>(
    db: &DatabaseTransaction,
    fk: E::Column,
    owner_id: &str,
) -> ResultEngine<Vec<String>> {
    let rows = E::find()
        .filter(fk.eq(owner_id))
        .filter(E::deleted_at_column().is_null())
        .all(db)
        .await?;
    Ok(rows.iter().map(|m| E::model_id(m).to_string()).collect())
}

async fn attributed_ids<E: SoftDeletable>(
    db: &DatabaseTransaction,
    owner: EntityKind,
    owner_id: &str,
) -> ResultEngine<Vec<String>> {
    let rows = E::find()
        .filter(E::deleted_at_column().is_not_null())
        .filter(E::deleted_by_kind_column().eq(owner.as_str()))
        .filter(E::deleted_by_id_column().eq(owner_id))
        .all(db)
        .await?;
    Ok(rows.iter().map(|m| E::model_id(m).to_string()).collect())
}

/// Active rows of `dependent` whose foreign key points at the owner.
async fn active_dependent_ids(
    db: &DatabaseTransaction,
    dependent: EntityKind,
    owner: EntityKind,
    owner_id: &str,
) -> ResultEngine<Vec<String>> {
    use EntityKind::*;

    match (dependent, owner) {
        (Mineral, Unit) => {
            active_ids_by::<minerals::Entity>(db, minerals::Column::UnitId, owner_id).await
        }
        (Vehicle, VehicleType) => {
            active_ids_by::<vehicles::Entity>(db, vehicles::Column::VehicleTypeId, owner_id).await
        }
        (Purchase, Mineral) => {
            active_ids_by::<purchases::Entity>(db, purchases::Column::MineralId, owner_id).await
        }
        (Purchase, Scale) => {
            active_ids_by::<purchases::Entity>(db, purchases::Column::ScaleId, owner_id).await
        }
        (Purchase, Company) => {
            active_ids_by::<purchases::Entity>(db, purchases::Column::CompanyId, owner_id).await
        }
        (Weighing, Mineral) => {
            active_ids_by::<weighings::Entity>(db, weighings::Column::MineralId, owner_id).await
        }
        (Weighing, Vehicle) => {
            active_ids_by::<weighings::Entity>(db, weighings::Column::VehicleId, owner_id).await
        }
        (Weighing, Scale) => {
            active_ids_by::<weighings::Entity>(db, weighings::Column::ScaleId, owner_id).await
        }
        (Weighing, Purchase) => {
            active_ids_by::<weighings::Entity>(db, weighings::Column::PurchaseId, owner_id).await
        }
        (Balance, Company) => {
            active_ids_by::<balances::Entity>(db, balances::Column::CompanyId, owner_id).await
        }
        // Pairs not present in the policy table.
        _ => Ok(Vec::new()),
    }
}

/// Deleted rows of `dependent` stamped as taken down by this owner.
async fn attributed_dependent_ids(
    db: &DatabaseTransaction,
    dependent: EntityKind,
    owner: EntityKind,
    owner_id: &str,
) -> ResultEngine<Vec<String>> {
    dispatch_kind!(dependent, E => attributed_ids::<E>(db, owner, owner_id).await)
}
