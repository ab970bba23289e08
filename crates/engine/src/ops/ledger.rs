//! Balance ledger: posting and reversing purchase credits and weighing
//! debits against the (company, mineral) balance rows.
//!
//! Every event row carries an `applied` flag. Apply is a no-op while the
//! flag is set, reverse is a no-op while it is clear, so each event affects
//! the balance exactly once regardless of how many cascade passes touch it.
//! The flag flips in the same transaction as the amount, never after it.

use chrono::Utc;
use sea_orm::{
    ActiveValue, DatabaseTransaction, QueryFilter, SqlErr, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use uuid::Uuid;

use crate::{EngineError, ResultEngine, balances, companies, purchases, weighings};

use super::{Engine, lifecycle::require_row, with_tx};

impl Engine {
    /// Post a purchase credit. Returns the resulting balance amount.
    pub async fn apply_purchase(&self, purchase_id: &str) -> ResultEngine<i64> {
        with_tx!(self, |db_tx| self.apply_purchase_tx(&db_tx, purchase_id).await)
    }

    /// Take a purchase credit back off the balance.
    pub async fn reverse_purchase(&self, purchase_id: &str) -> ResultEngine<i64> {
        with_tx!(self, |db_tx| self
            .reverse_purchase_tx(&db_tx, purchase_id)
            .await)
    }

    /// Post a weighing debit, refusing to overdraw the balance.
    pub async fn apply_weighing(&self, weighing_id: &str) -> ResultEngine<i64> {
        with_tx!(self, |db_tx| self
            .apply_weighing_tx(&db_tx, weighing_id, true)
            .await)
    }

    /// Put a weighing debit back on the balance.
    pub async fn reverse_weighing(&self, weighing_id: &str) -> ResultEngine<i64> {
        with_tx!(self, |db_tx| self
            .reverse_weighing_tx(&db_tx, weighing_id)
            .await)
    }

    /// Current balance for the pair; zero when no active row exists.
    pub async fn get_balance(&self, company_id: &str, mineral_id: &str) -> ResultEngine<i64> {
        with_tx!(self, |db_tx| {
            self.current_amount(&db_tx, company_id, mineral_id).await
        })
    }

    pub(super) async fn apply_purchase_tx(
        &self,
        db: &DatabaseTransaction,
        purchase_id: &str,
    ) -> ResultEngine<i64> {
        let purchase = require_row::<purchases::Entity>(db, purchase_id).await?;
        if purchase.applied {
            return self
                .current_amount(db, &purchase.company_id, &purchase.mineral_id)
                .await;
        }

        let balance = self
            .balance_for_update(db, &purchase.company_id, &purchase.mineral_id)
            .await?;
        let new_amount = balance.amount + purchase.quantity;
        post_amount(db, &balance.id, new_amount).await?;
        set_purchase_applied(db, purchase_id, true).await?;
        Ok(new_amount)
    }

    pub(super) async fn reverse_purchase_tx(
        &self,
        db: &DatabaseTransaction,
        purchase_id: &str,
    ) -> ResultEngine<i64> {
        let purchase = require_row::<purchases::Entity>(db, purchase_id).await?;
        if !purchase.applied {
            return self
                .current_amount(db, &purchase.company_id, &purchase.mineral_id)
                .await;
        }

        // A missing balance row is recreated at zero so the reversal shows
        // up as a negative amount instead of disappearing.
        let balance = self
            .balance_for_update(db, &purchase.company_id, &purchase.mineral_id)
            .await?;
        let new_amount = balance.amount - purchase.quantity;
        post_amount(db, &balance.id, new_amount).await?;
        set_purchase_applied(db, purchase_id, false).await?;
        Ok(new_amount)
    }

    pub(super) async fn apply_weighing_tx(
        &self,
        db: &DatabaseTransaction,
        weighing_id: &str,
        enforce_funds: bool,
    ) -> ResultEngine<i64> {
        let weighing = require_row::<weighings::Entity>(db, weighing_id).await?;
        let purchase = require_row::<purchases::Entity>(db, &weighing.purchase_id).await?;
        if weighing.applied {
            return self
                .current_amount(db, &purchase.company_id, &weighing.mineral_id)
                .await;
        }

        let balance = self
            .balance_for_update(db, &purchase.company_id, &weighing.mineral_id)
            .await?;
        if enforce_funds && balance.amount < weighing.quantity {
            return Err(EngineError::InsufficientBalance {
                available: balance.amount,
                requested: weighing.quantity,
            });
        }
        let new_amount = balance.amount - weighing.quantity;
        post_amount(db, &balance.id, new_amount).await?;
        set_weighing_applied(db, weighing_id, true).await?;
        Ok(new_amount)
    }

    pub(super) async fn reverse_weighing_tx(
        &self,
        db: &DatabaseTransaction,
        weighing_id: &str,
    ) -> ResultEngine<i64> {
        let weighing = require_row::<weighings::Entity>(db, weighing_id).await?;
        let purchase = require_row::<purchases::Entity>(db, &weighing.purchase_id).await?;
        if !weighing.applied {
            return self
                .current_amount(db, &purchase.company_id, &weighing.mineral_id)
                .await;
        }

        let balance = self
            .balance_for_update(db, &purchase.company_id, &weighing.mineral_id)
            .await?;
        let new_amount = balance.amount + weighing.quantity;
        post_amount(db, &balance.id, new_amount).await?;
        set_weighing_applied(db, weighing_id, false).await?;
        Ok(new_amount)
    }

    async fn current_amount(
        &self,
        db: &DatabaseTransaction,
        company_id: &str,
        mineral_id: &str,
    ) -> ResultEngine<i64> {
        Ok(find_active_balance(db, company_id, mineral_id)
            .await?
            .map(|row| row.amount)
            .unwrap_or(0))
    }

    /// Get or create the active balance row for the pair.
    ///
    /// The partial unique index makes the insert race-proof: a concurrent
    /// creator makes ours fail with a unique violation, and one re-read picks
    /// up the winner's row.
    async fn balance_for_update(
        &self,
        db: &DatabaseTransaction,
        company_id: &str,
        mineral_id: &str,
    ) -> ResultEngine<balances::Model> {
        if let Some(row) = find_active_balance(db, company_id, mineral_id).await? {
            return Ok(row);
        }

        // Deleted companies still need balance rows mid-cascade, so this
        // reads the row without checking its lifecycle.
        let company = require_row::<companies::Entity>(db, company_id).await?;
        let fresh = balances::ActiveModel {
            id: ActiveValue::Set(Uuid::new_v4().to_string()),
            amount: ActiveValue::Set(0),
            company_id: ActiveValue::Set(company_id.to_string()),
            mineral_id: ActiveValue::Set(mineral_id.to_string()),
            company_type: ActiveValue::Set(company.company_type),
            created_at: ActiveValue::Set(Utc::now()),
            deleted_at: ActiveValue::Set(None),
            deleted_by_kind: ActiveValue::Set(None),
            deleted_by_id: ActiveValue::Set(None),
        };
        match fresh.insert(db).await {
            Ok(model) => Ok(model),
            Err(err) => match err.sql_err() {
                Some(SqlErr::UniqueConstraintViolation(_)) => {
                    find_active_balance(db, company_id, mineral_id)
                        .await?
                        .ok_or_else(|| {
                            EngineError::ConstraintViolation(format!(
                                "balance for company {company_id} mineral {mineral_id} \
                                 vanished after unique violation"
                            ))
                        })
                }
                _ => Err(err.into()),
            },
        }
    }
}

async fn find_active_balance(
    db: &DatabaseTransaction,
    company_id: &str,
    mineral_id: &str,
) -> ResultEngine<Option<balances::Model>> {
    Ok(balances::Entity::find()
        .filter(balances::Column::CompanyId.eq(company_id))
        .filter(balances::Column::MineralId.eq(mineral_id))
        .filter(balances::Column::DeletedAt.is_null())
        .one(db)
        .await?)
}

pub(super) async fn post_amount(
    db: &DatabaseTransaction,
    balance_id: &str,
    amount: i64,
) -> ResultEngine<()> {
    balances::Entity::update_many()
        .col_expr(balances::Column::Amount, Expr::value(amount))
        .filter(balances::Column::Id.eq(balance_id))
        .exec(db)
        .await?;
    Ok(())
}

async fn set_purchase_applied(
    db: &DatabaseTransaction,
    purchase_id: &str,
    applied: bool,
) -> ResultEngine<()> {
    purchases::Entity::update_many()
        .col_expr(purchases::Column::Applied, Expr::value(applied))
        .filter(purchases::Column::Id.eq(purchase_id))
        .exec(db)
        .await?;
    Ok(())
}

async fn set_weighing_applied(
    db: &DatabaseTransaction,
    weighing_id: &str,
    applied: bool,
) -> ResultEngine<()> {
    weighings::Entity::update_many()
        .col_expr(weighings::Column::Applied, Expr::value(applied))
        .filter(weighings::Column::Id.eq(weighing_id))
        .exec(db)
        .await?;
    Ok(())
}
