//! Severed-relationship tracking.
//!
//! Cascades call [`Engine::track_link_tx`] when they cut a many-to-many link;
//! the public surface lets operators inspect and correct the stored links.

use chrono::{DateTime, Utc};
use sea_orm::{ActiveValue, DatabaseTransaction, QueryFilter, QueryOrder, TransactionTrait, prelude::*};
use uuid::Uuid;

use crate::{EntityKind, ResultEngine, TrackedLink, tracked_relationships};

use super::{Engine, with_tx};

impl Engine {
    /// Record a severed link by hand.
    ///
    /// Recording an already-tracked tuple is a no-op, matching how cascades
    /// behave when a link is severed twice.
    pub async fn track_link(
        &self,
        owner_kind: EntityKind,
        owner_id: &str,
        dependent_kind: EntityKind,
        dependent_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            self.track_link_tx(
                &db_tx,
                owner_kind,
                owner_id,
                dependent_kind,
                dependent_id,
                Utc::now(),
            )
            .await?;
            Ok(())
        })
    }

    /// Drop a tracked link without restoring anything. Dropping an absent
    /// tuple is a no-op.
    pub async fn untrack_link(
        &self,
        owner_kind: EntityKind,
        owner_id: &str,
        dependent_kind: EntityKind,
        dependent_id: &str,
    ) -> ResultEngine<()> {
        with_tx!(self, |db_tx| {
            tracked_relationships::Entity::delete_many()
                .filter(tracked_relationships::Column::OwnerKind.eq(owner_kind.as_str()))
                .filter(tracked_relationships::Column::OwnerId.eq(owner_id))
                .filter(tracked_relationships::Column::DependentKind.eq(dependent_kind.as_str()))
                .filter(tracked_relationships::Column::DependentId.eq(dependent_id))
                .exec(&db_tx)
                .await?;
            Ok(())
        })
    }

    /// All links severed by the given owner, oldest first, optionally
    /// narrowed to one dependent kind.
    pub async fn tracked_links(
        &self,
        owner_kind: EntityKind,
        owner_id: &str,
        dependent_kind: Option<EntityKind>,
    ) -> ResultEngine<Vec<TrackedLink>> {
        with_tx!(self, |db_tx| {
            let mut query = tracked_relationships::Entity::find()
                .filter(tracked_relationships::Column::OwnerKind.eq(owner_kind.as_str()))
                .filter(tracked_relationships::Column::OwnerId.eq(owner_id));
            if let Some(kind) = dependent_kind {
                query =
                    query.filter(tracked_relationships::Column::DependentKind.eq(kind.as_str()));
            }
            let rows = query
                .order_by_asc(tracked_relationships::Column::SeveredAt)
                .all(&db_tx)
                .await?;
            rows.into_iter().map(TrackedLink::try_from).collect()
        })
    }

    pub(super) async fn track_link_tx(
        &self,
        db: &DatabaseTransaction,
        owner_kind: EntityKind,
        owner_id: &str,
        dependent_kind: EntityKind,
        dependent_id: &str,
        severed_at: DateTime<Utc>,
    ) -> ResultEngine<()> {
        let exists = tracked_relationships::Entity::find()
            .filter(tracked_relationships::Column::OwnerKind.eq(owner_kind.as_str()))
            .filter(tracked_relationships::Column::OwnerId.eq(owner_id))
            .filter(tracked_relationships::Column::DependentKind.eq(dependent_kind.as_str()))
            .filter(tracked_relationships::Column::DependentId.eq(dependent_id))
            .one(db)
            .await?
            .is_some();
        if exists {
            return Ok(());
        }

        tracked_relationships::ActiveModel {
            id: ActiveValue::Set(Uuid::new_v4().to_string()),
            owner_kind: ActiveValue::Set(owner_kind.as_str().to_string()),
            owner_id: ActiveValue::Set(owner_id.to_string()),
            dependent_kind: ActiveValue::Set(dependent_kind.as_str().to_string()),
            dependent_id: ActiveValue::Set(dependent_id.to_string()),
            severed_at: ActiveValue::Set(severed_at),
        }
        .insert(db)
        .await?;
        Ok(())
    }
}
